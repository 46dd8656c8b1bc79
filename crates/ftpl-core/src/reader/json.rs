/*
 * reader/json.rs
 * Copyright (c) 2025 Posit, PBC
 */

use super::{COLLECTION_NAME, FLAT_OUTPUT, Nesting, OutputShape, ReaderConfig, SEPARATOR};
use crate::builder::{
    Builder, ContainerBuilder, DynamicBuilder, DynamicMergeBuilder, EncodingHints, KeySpec,
    RootBuilder, StaticBuilder, TemplateOptions,
};
use crate::directive::DYNAMIC_MERGE_PREFIX;
use crate::error::{TemplateError, TemplateResult};
use crate::expression::{is_expression, is_expression_value};
use serde_json::{Map, Value};

/// Top-level member holding the vendor options of a JSON template.
pub const OPTIONS_KEY: &str = "$options";
const SOURCE_KEY: &str = "$source";
const FILTER_KEY: &str = "$filter";

/// Compiles a resolved JSON template into a builder tree.
///
/// A top-level object produces one builder per member, a top-level array one
/// builder per element. Objects compile to composites, arrays to iterating
/// builders (or to a single static builder when they hold only literals),
/// expression strings to dynamic builders and everything else to static
/// builders. With `flat_output` every container is compiled to its flat
/// variant.
pub struct JsonTemplateReader<'a> {
    config: &'a ReaderConfig,
}

impl<'a> JsonTemplateReader<'a> {
    pub fn new(config: &'a ReaderConfig) -> Self {
        Self { config }
    }

    pub fn read(&self, resolved: Value) -> TemplateResult<RootBuilder> {
        let (children, options) = match resolved {
            Value::Object(mut members) => {
                let options = self.options(members.shift_remove(OPTIONS_KEY))?;
                let shape = shape_of(&options);
                (self.compile_members(members, &shape, Nesting::TopLevel)?, options)
            }
            Value::Array(items) => {
                let options = self.options(None)?;
                let shape = shape_of(&options);
                let children = items
                    .into_iter()
                    .map(|item| self.compile(None, item, &shape, Nesting::TopLevel))
                    .collect::<TemplateResult<Vec<_>>>()?;
                (children, options)
            }
            scalar => {
                let options = self.options(None)?;
                let shape = shape_of(&options);
                (vec![self.compile(None, scalar, &shape, Nesting::TopLevel)?], options)
            }
        };

        tracing::debug!(
            builders = children.len(),
            flat_output = options.flat_output,
            "Compiled JSON template"
        );
        Ok(RootBuilder::new(children, options))
    }

    fn options(&self, value: Option<Value>) -> TemplateResult<TemplateOptions> {
        let members = match value {
            None => Map::new(),
            Some(Value::Object(members)) => members,
            Some(other) => {
                return Err(TemplateError::InvalidOption {
                    name: OPTIONS_KEY.to_string(),
                    message: format!("expected an object, found {}", other),
                });
            }
        };

        for name in members.keys() {
            if ![FLAT_OUTPUT, SEPARATOR, COLLECTION_NAME].contains(&name.as_str()) {
                tracing::warn!(option = %name, "Ignoring unknown template option");
            }
        }

        Ok(TemplateOptions {
            flat_output: self.config.flat_output(members.get(FLAT_OUTPUT))?,
            separator: self.config.separator(members.get(SEPARATOR))?,
            collection_name: self
                .config
                .string_option(COLLECTION_NAME, members.get(COLLECTION_NAME))?,
            ..TemplateOptions::default()
        })
    }

    fn compile_members(
        &self,
        members: Map<String, Value>,
        shape: &OutputShape,
        nesting: Nesting<'_>,
    ) -> TemplateResult<Vec<Builder>> {
        let mut builders = Vec::with_capacity(members.len());
        for (key, value) in members {
            let builder = match dynamic_merge(&key, value) {
                Ok(merge) => merge,
                Err(value) => self.compile(Some(KeySpec::parse(&key)), value, shape, nesting)?,
            };
            builders.push(builder);
        }
        Ok(builders)
    }

    fn compile(
        &self,
        key: Option<KeySpec>,
        value: Value,
        shape: &OutputShape,
        nesting: Nesting<'_>,
    ) -> TemplateResult<Builder> {
        match value {
            Value::String(expression) if is_expression(&expression) => {
                Ok(Builder::Dynamic(DynamicBuilder {
                    key,
                    expression,
                    hints: EncodingHints::default(),
                }))
            }
            Value::Array(items) => self.compile_array(key, items, shape, nesting),
            Value::Object(members) => self.compile_object(key, members, shape, nesting),
            value => Ok(static_builder(key, value)),
        }
    }

    fn compile_array(
        &self,
        key: Option<KeySpec>,
        mut items: Vec<Value>,
        shape: &OutputShape,
        nesting: Nesting<'_>,
    ) -> TemplateResult<Builder> {
        let has_source = matches!(
            items.first(),
            Some(Value::Object(first)) if first.len() == 1 && first.contains_key(SOURCE_KEY)
        );
        let source = if has_source {
            let first = items.remove(0);
            expression_member(SOURCE_KEY, first.get(SOURCE_KEY))?
        } else {
            None
        };

        if source.is_none() && items.iter().all(is_literal) {
            return Ok(static_builder(key, Value::Array(items)));
        }

        let path = nesting.path_of(key.as_ref());
        let mut container = ContainerBuilder::new(key);
        container.source = source;
        for item in items {
            container
                .children
                .push(self.compile(None, item, shape, Nesting::Inside(&path))?);
        }
        Ok(shape.container(container, true, path))
    }

    fn compile_object(
        &self,
        key: Option<KeySpec>,
        mut members: Map<String, Value>,
        shape: &OutputShape,
        nesting: Nesting<'_>,
    ) -> TemplateResult<Builder> {
        let source = expression_member(SOURCE_KEY, members.shift_remove(SOURCE_KEY).as_ref())?;
        let filter = expression_member(FILTER_KEY, members.shift_remove(FILTER_KEY).as_ref())?;

        let path = nesting.path_of(key.as_ref());
        let mut container = ContainerBuilder::new(key);
        container.source = source;
        container.filter = filter;
        container.children = self.compile_members(members, shape, Nesting::Inside(&path))?;
        Ok(shape.container(container, false, path))
    }
}

fn shape_of(options: &TemplateOptions) -> OutputShape {
    OutputShape {
        flat: options.flat_output,
        separator: options.separator.clone(),
    }
}

fn static_builder(key: Option<KeySpec>, value: Value) -> Builder {
    Builder::Static(StaticBuilder {
        key,
        value,
        hints: EncodingHints::default(),
    })
}

/// Scalars and literal-only arrays are written verbatim.
fn is_literal(value: &Value) -> bool {
    match value {
        Value::Object(_) => false,
        Value::Array(items) => items.iter().all(is_literal),
        other => !is_expression_value(other),
    }
}

/// Read a `$source` / `$filter` member, which must hold a string.
fn expression_member(name: &str, value: Option<&Value>) -> TemplateResult<Option<String>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(expression)) => Ok(Some(expression.clone())),
        Some(other) => Err(TemplateError::InvalidOption {
            name: name.to_string(),
            message: format!("expected an expression string, found {}", other),
        }),
    }
}

/// Recognize a deferred merge produced while resolving `$merge`.
///
/// Gives the value back when the member is anything else.
fn dynamic_merge(key: &str, value: Value) -> Result<Builder, Value> {
    let Some(original_key) = key.strip_prefix(DYNAMIC_MERGE_PREFIX) else {
        return Err(value);
    };
    let Value::Object(mut operands) = value else {
        return Err(value);
    };
    let deferred = operands.len() == 2
        && operands.contains_key("base")
        && matches!(operands.get("overlay"), Some(Value::String(_)));
    if !deferred {
        return Err(Value::Object(operands));
    }

    let base = operands.shift_remove("base").unwrap_or(Value::Null);
    let overlay = match operands.shift_remove("overlay") {
        Some(Value::String(overlay)) => overlay,
        _ => String::new(),
    };
    Ok(Builder::DynamicMerge(DynamicMergeBuilder {
        key: Some(KeySpec::parse(original_key)),
        base,
        overlay,
    }))
}
