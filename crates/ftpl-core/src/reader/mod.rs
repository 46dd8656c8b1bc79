/*
 * reader/mod.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Compilation of resolved templates into builder trees.

mod json;
mod xml;

pub use json::JsonTemplateReader;
pub use xml::XmlTemplateReader;

use crate::builder::{Builder, ContainerBuilder, DEFAULT_SEPARATOR, FlatBuilder, KeySpec};
use crate::error::{TemplateError, TemplateResult};
use crate::expression::{EnvironmentParams, evaluate_option, option_as_bool, option_parameter};
use crate::namespace::NamespaceSupport;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::BTreeSet;

/// Inputs of a compilation that do not come from the template itself.
#[derive(Debug, Clone, Default)]
pub struct ReaderConfig {
    /// Parameters visible to `env(...)` in option values.
    pub environment: EnvironmentParams,
    /// `flat_output` when the template does not set it.
    pub flat_output: bool,
    /// Namespaces known to the output format, for XML templates.
    pub namespaces: NamespaceSupport,
    /// Environment parameters option values looked up so far.
    pub(crate) parameters_read: RefCell<BTreeSet<String>>,
}

impl ReaderConfig {
    pub fn new(environment: EnvironmentParams) -> Self {
        Self {
            environment,
            ..Self::default()
        }
    }

    /// Evaluate the `flat_output` option, falling back to the configured default.
    pub(crate) fn flat_output(&self, value: Option<&Value>) -> TemplateResult<bool> {
        let Some(value) = value else {
            return Ok(self.flat_output);
        };
        let evaluated = self.evaluate(FLAT_OUTPUT, value)?;
        Ok(option_as_bool(FLAT_OUTPUT, &evaluated)?.unwrap_or(self.flat_output))
    }

    /// Evaluate a string option; `None` when unset or evaluating to null.
    pub(crate) fn string_option(&self, name: &str, value: Option<&Value>) -> TemplateResult<Option<String>> {
        let Some(value) = value else {
            return Ok(None);
        };
        match self.evaluate(name, value)? {
            Value::Null => Ok(None),
            Value::String(text) => Ok(Some(text)),
            other => Err(TemplateError::InvalidOption {
                name: name.to_string(),
                message: format!("expected a string, found {}", other),
            }),
        }
    }

    /// Environment parameters the options evaluated so far depend on, sorted.
    ///
    /// Two environments that agree on these compile to the same tree.
    pub fn parameters_read(&self) -> Vec<String> {
        self.parameters_read.borrow().iter().cloned().collect()
    }

    fn evaluate(&self, name: &str, value: &Value) -> TemplateResult<Value> {
        if let Some(parameter) = option_parameter(value) {
            self.parameters_read.borrow_mut().insert(parameter);
        }
        evaluate_option(name, value, &self.environment)
    }

    /// Evaluate the `separator` option.
    pub(crate) fn separator(&self, value: Option<&Value>) -> TemplateResult<String> {
        match self.string_option(SEPARATOR, value)? {
            Some(separator) if separator.is_empty() => Err(TemplateError::InvalidOption {
                name: SEPARATOR.to_string(),
                message: "the separator cannot be empty".to_string(),
            }),
            Some(separator) => Ok(separator),
            None => Ok(DEFAULT_SEPARATOR.to_string()),
        }
    }
}

pub(crate) const FLAT_OUTPUT: &str = "flat_output";
pub(crate) const SEPARATOR: &str = "separator";
pub(crate) const COLLECTION_NAME: &str = "collection_name";

/// How containers are emitted, fixed for a whole compilation.
#[derive(Debug, Clone)]
pub(crate) struct OutputShape {
    pub flat: bool,
    pub separator: String,
}

/// Position of a container in the tree, for flattened key paths.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Nesting<'p> {
    /// Directly under the root: keeps its key as a nested object.
    TopLevel,
    /// Below a container whose flattened path is given.
    Inside(&'p [KeySpec]),
}

impl Nesting<'_> {
    /// Flattened path of a container with `key` at this position.
    pub fn path_of(self, key: Option<&KeySpec>) -> Vec<KeySpec> {
        match self {
            Nesting::TopLevel => Vec::new(),
            Nesting::Inside(parent) => {
                let mut path = parent.to_vec();
                path.extend(key.cloned());
                path
            }
        }
    }
}

impl OutputShape {
    /// Wrap a container in the variant matching this shape.
    pub fn container(&self, container: ContainerBuilder, iterating: bool, path: Vec<KeySpec>) -> Builder {
        match (self.flat, iterating) {
            (false, false) => Builder::Composite(container),
            (false, true) => Builder::Iterating(container),
            (true, iterating) => {
                let flat = FlatBuilder {
                    container,
                    path,
                    separator: self.separator.clone(),
                };
                if iterating {
                    Builder::FlatIterating(flat)
                } else {
                    Builder::FlatComposite(flat)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(params: &[(&str, &str)]) -> ReaderConfig {
        ReaderConfig::new(params.iter().copied().collect())
    }

    #[test]
    fn test_flat_output_from_environment() {
        let value = json!("${env('flat_output', false)}");
        assert!(!config(&[]).flat_output(Some(&value)).unwrap());
        assert!(config(&[("FLAT_OUTPUT", "true")]).flat_output(Some(&value)).unwrap());
    }

    #[test]
    fn test_flat_output_default() {
        let mut reader = config(&[]);
        assert!(!reader.flat_output(None).unwrap());
        reader.flat_output = true;
        assert!(reader.flat_output(None).unwrap());
        // An env() lookup with no value and no default keeps the default
        assert!(reader.flat_output(Some(&json!("${env('missing')}"))).unwrap());
    }

    #[test]
    fn test_separator() {
        let reader = config(&[("sep", ".")]);
        assert_eq!(reader.separator(None).unwrap(), "_");
        assert_eq!(reader.separator(Some(&json!("${env('sep')}"))).unwrap(), ".");
        assert!(reader.separator(Some(&json!(""))).is_err());
        assert!(reader.separator(Some(&json!(3))).is_err());
    }

    #[test]
    fn test_parameters_read() {
        let reader = config(&[("sep", ".")]);
        reader.separator(Some(&json!("${env('SEP')}"))).unwrap();
        reader.flat_output(Some(&json!(true))).unwrap();
        reader
            .flat_output(Some(&json!("${env('flat_output', false)}")))
            .unwrap();
        assert_eq!(reader.parameters_read(), vec!["flat_output", "sep"]);
    }

    #[test]
    fn test_nesting_paths() {
        let key = KeySpec::parse("b");
        assert!(Nesting::TopLevel.path_of(Some(&key)).is_empty());

        let parent = vec![KeySpec::parse("a")];
        assert_eq!(
            Nesting::Inside(&parent).path_of(Some(&key)),
            vec![KeySpec::parse("a"), KeySpec::parse("b")]
        );
        assert_eq!(Nesting::Inside(&parent).path_of(None), parent);
    }
}
