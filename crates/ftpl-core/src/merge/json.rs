/*
 * merge/json.rs
 * Copyright (c) 2025 Posit, PBC
 */

use crate::directive::dynamic_merge_key;
use crate::expression::is_expression_value;
use serde_json::{Map, Value};

/// Merge `overlay` on top of `base`.
///
/// - object over object: deep merge; result keys are the base keys in base
///   order followed by the keys only the overlay has
/// - anything else: the overlay replaces the base (arrays are never merged
///   element-wise)
/// - an overlay member set to `null` removes that member
/// - an overlay member that is a runtime expression, over a base member that
///   is an object, becomes a `$dynamicMerge_<key>` node holding both sides
pub fn merge_trees(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => Value::Object(merge_objects(base, overlay)),
        (_, overlay) => overlay,
    }
}

fn merge_objects(base: Map<String, Value>, mut overlay: Map<String, Value>) -> Map<String, Value> {
    let mut merged = Map::new();

    for (key, base_value) in base {
        match overlay.shift_remove(&key) {
            None => {
                merged.insert(key, base_value);
            }
            Some(Value::Null) => {
                tracing::trace!(key = %key, "Removing member through merge overlay");
            }
            Some(overlay_value) if is_expression_value(&overlay_value) && base_value.is_object() => {
                let mut deferred = Map::new();
                deferred.insert("base".to_string(), base_value);
                deferred.insert("overlay".to_string(), overlay_value);
                merged.insert(dynamic_merge_key(&key), Value::Object(deferred));
            }
            Some(overlay_value) => {
                merged.insert(key, merge_trees(base_value, overlay_value));
            }
        }
    }

    for (key, value) in overlay {
        if !value.is_null() {
            merged.insert(key, value);
        }
    }

    merged
}
