/*
 * parser/json.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Recursive parser for JSON templates.
//!
//! Directive forms:
//! - `{"$include": "x.json"}`: the object is replaced by the included value
//! - `"$include{x.json}"`: the string is replaced by the included value
//! - `"$includeFlat": "x.json"` as a member: the included object's members
//!   are spliced into the enclosing object
//! - `"key": "$includeFlat{x.json}"`: same, the member `key` is dropped
//! - `{"$includeFlat": "x.json"}` / `"$includeFlat{x.json}"` in an array: an
//!   included array's elements are spread into the enclosing array
//! - `"$merge": "base.json"`: the enclosing object is merged over the base

use super::{DEFAULT_MAX_DEPTH, MissingResources, Resolution, WatchedResources};
use crate::directive::{self, Directive};
use crate::error::{TemplateError, TemplateResult};
use crate::merge::merge_trees;
use crate::store::{ResourceId, TemplateStore};
use serde_json::{Map, Value};

/// Parses a JSON template and everything it includes into one document.
pub struct JsonTemplateParser<'a> {
    store: &'a dyn TemplateStore,
    max_depth: usize,
    watched: WatchedResources,
    missing: MissingResources,
}

impl<'a> JsonTemplateParser<'a> {
    pub fn new(store: &'a dyn TemplateStore) -> Self {
        Self {
            store,
            max_depth: DEFAULT_MAX_DEPTH,
            watched: WatchedResources::new(),
            missing: MissingResources::new(),
        }
    }

    /// Override the bound on the inclusion chain length.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Parse `root`, expanding every directive it reaches.
    pub fn parse(&mut self, root: &ResourceId) -> TemplateResult<Value> {
        let mut resolution = Resolution::new(self.store, root, self.max_depth);
        let expanded = resolution.read_root().and_then(|source| {
            let document = parse_source(root, &source)?;
            resolution.expand_value(document)
        });
        self.watched = resolution.watched;
        self.missing = resolution.missing;
        expanded
    }

    /// Resources read by the last [`parse`](Self::parse), up to the failure
    /// if it failed.
    pub fn watched(&self) -> &WatchedResources {
        &self.watched
    }

    /// Resources the last parse referenced but could not find.
    pub fn missing(&self) -> &MissingResources {
        &self.missing
    }

    pub fn into_parts(self) -> (WatchedResources, MissingResources) {
        (self.watched, self.missing)
    }
}

fn parse_source(resource: &ResourceId, source: &str) -> TemplateResult<Value> {
    serde_json::from_str(source).map_err(|e| TemplateError::Parse {
        resource: resource.clone(),
        // serde_json messages already end with the line and column
        line: None,
        message: e.to_string(),
    })
}

impl Resolution<'_> {
    fn include_json(&mut self, reference: &str, directive: Directive) -> TemplateResult<Value> {
        self.load(reference, directive, |resolution, id, source| {
            let document = parse_source(id, &source)?;
            resolution.expand_value(document)
        })
    }

    /// Expand a node in a position where it stands for exactly one value.
    fn expand_value(&mut self, value: Value) -> TemplateResult<Value> {
        match value {
            Value::Object(map) => self.expand_object(map),
            Value::Array(items) => self.expand_array(items).map(Value::Array),
            Value::String(text) => match directive::parse_inline(&text) {
                Some((directive, reference)) => self.include_json(reference, directive),
                None => Ok(Value::String(text)),
            },
            other => Ok(other),
        }
    }

    fn expand_array(&mut self, items: Vec<Value>) -> TemplateResult<Vec<Value>> {
        let mut expanded = Vec::with_capacity(items.len());

        for item in items {
            match self.array_directive(&item)? {
                Some((Directive::IncludeFlat, reference)) => {
                    match self.include_json(&reference, Directive::IncludeFlat)? {
                        Value::Array(included) => expanded.extend(included),
                        other => expanded.push(other),
                    }
                }
                Some((directive, reference)) => {
                    expanded.push(self.include_json(&reference, directive)?);
                }
                None => expanded.push(self.expand_value(item)?),
            }
        }

        Ok(expanded)
    }

    /// Recognize an array element that is an inclusion directive.
    fn array_directive(&self, item: &Value) -> TemplateResult<Option<(Directive, String)>> {
        match item {
            Value::String(text) => Ok(directive::parse_inline(text)
                .map(|(directive, reference)| (directive, reference.to_string()))),
            Value::Object(map) if map.len() == 1 => {
                let Some((key, value)) = map.iter().next() else {
                    return Ok(None);
                };
                match Directive::from_key(key) {
                    Some(directive @ (Directive::Include | Directive::IncludeFlat)) => {
                        Ok(Some((directive, self.reference(directive, value)?)))
                    }
                    _ => Ok(None),
                }
            }
            _ => Ok(None),
        }
    }

    fn expand_object(&mut self, mut map: Map<String, Value>) -> TemplateResult<Value> {
        if let Some(base_reference) = map.shift_remove(directive::MERGE) {
            let reference = self.reference(Directive::Merge, &base_reference)?;
            let base = self.include_json(&reference, Directive::Merge)?;
            let overlay = self.expand_object(map)?;
            return Ok(merge_trees(base, overlay));
        }

        if let Some(include_reference) = map.get(directive::INCLUDE) {
            if map.len() > 1 {
                return Err(self.invalid_directive(
                    "\"$include\" must be the only member of its object; use \"$includeFlat\" to add members",
                ));
            }
            let reference = self.reference(Directive::Include, include_reference)?;
            return self.include_json(&reference, Directive::Include);
        }

        let mut expanded = Map::new();
        for (key, value) in map {
            if key == directive::INCLUDE_FLAT {
                let reference = self.reference(Directive::IncludeFlat, &value)?;
                self.splice_members(&reference, &mut expanded)?;
                continue;
            }

            match &value {
                Value::String(text) => match directive::parse_inline(text) {
                    Some((Directive::IncludeFlat, reference)) => {
                        let reference = reference.to_string();
                        self.splice_members(&reference, &mut expanded)?;
                    }
                    Some((directive, reference)) => {
                        let reference = reference.to_string();
                        expanded.insert(key, self.include_json(&reference, directive)?);
                    }
                    None => {
                        expanded.insert(key, value);
                    }
                },
                _ => {
                    expanded.insert(key, self.expand_value(value)?);
                }
            }
        }

        Ok(Value::Object(expanded))
    }

    /// Include an object and copy its members into `target`.
    fn splice_members(&mut self, reference: &str, target: &mut Map<String, Value>) -> TemplateResult<()> {
        match self.include_json(reference, Directive::IncludeFlat)? {
            Value::Object(members) => {
                target.extend(members);
                Ok(())
            }
            other => Err(self.invalid_directive(format!(
                "\"$includeFlat\" of {} inside an object must include an object, found {}",
                reference,
                json_kind(&other)
            ))),
        }
    }

    fn reference(&self, directive: Directive, value: &Value) -> TemplateResult<String> {
        match value {
            Value::String(reference) => Ok(reference.clone()),
            other => Err(self.invalid_directive(format!(
                "\"{}\" expects a path string, found {}",
                directive.as_str(),
                json_kind(other)
            ))),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
