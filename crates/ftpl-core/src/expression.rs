/*
 * expression.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Runtime expressions and the compile-time environment.
//!
//! Template values written as `${...}` (property interpolation) or `$${...}`
//! (CQL expression) are evaluated per feature by the renderer. The only
//! expressions evaluated at compile time are vendor option values, and those
//! may only read request/environment parameters through `env(...)`.

use crate::error::{TemplateError, TemplateResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;

static ENV_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\$\$?\{\s*env\(\s*'([^']*)'\s*(?:,\s*(.+?)\s*)?\)\s*\}$"#)
        .expect("env() pattern is a valid regex")
});

/// Whether a template string is evaluated at render time rather than literal.
pub fn is_expression(value: &str) -> bool {
    value.contains("${")
}

/// Whether a document node is a runtime expression.
pub fn is_expression_value(value: &Value) -> bool {
    matches!(value, Value::String(s) if is_expression(s))
}

/// Parameters visible to `env(...)` at compile time.
///
/// The web layer fills these per request (vendor parameters such as
/// `flat_output`) before asking for a compiled template.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvironmentParams {
    values: HashMap<String, String>,
}

impl EnvironmentParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter. Names are case-insensitive.
    pub fn set(&mut self, name: impl AsRef<str>, value: impl Into<String>) -> &mut Self {
        self.values
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// All parameters sorted by name, with names lowercased.
    pub fn entries(&self) -> Vec<(String, String)> {
        let mut entries: Vec<(String, String)> = self
            .values
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        entries.sort();
        entries
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for EnvironmentParams {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut params = Self::new();
        for (name, value) in iter {
            params.set(name, value);
        }
        params
    }
}

/// Evaluate a vendor option value against the environment.
///
/// Literals pass through unchanged. `${env('name')}` and
/// `${env('name', default)}` read the environment; a missing parameter
/// without default evaluates to `null`. Any other expression is rejected,
/// since no feature is available at compile time.
pub fn evaluate_option(name: &str, value: &Value, env: &EnvironmentParams) -> TemplateResult<Value> {
    let Value::String(text) = value else {
        return Ok(value.clone());
    };
    if !is_expression(text) {
        return Ok(value.clone());
    }

    let captures = ENV_CALL
        .captures(text.trim())
        .ok_or_else(|| TemplateError::InvalidOption {
            name: name.to_string(),
            message: format!("'{}' cannot be evaluated at compile time", text),
        })?;

    let parameter = captures.get(1).map_or("", |m| m.as_str());
    if let Some(found) = env.get(parameter) {
        return Ok(Value::String(found.to_string()));
    }

    match captures.get(2) {
        Some(default) => parse_literal(name, default.as_str()),
        None => Ok(Value::Null),
    }
}

/// Name of the environment parameter an option value reads, if it is an
/// `env(...)` call. Names are lowercased like [`EnvironmentParams`] keys.
pub fn option_parameter(value: &Value) -> Option<String> {
    let Value::String(text) = value else {
        return None;
    };
    ENV_CALL
        .captures(text.trim())
        .and_then(|captures| captures.get(1))
        .map(|name| name.as_str().to_ascii_lowercase())
}

/// Interpret an option value as a boolean.
pub fn option_as_bool(name: &str, value: &Value) -> TemplateResult<Option<bool>> {
    match value {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(*b)),
        Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(Some(true)),
        Value::String(s) if s.eq_ignore_ascii_case("false") || s.is_empty() => Ok(Some(false)),
        other => Err(TemplateError::InvalidOption {
            name: name.to_string(),
            message: format!("expected a boolean, found {}", other),
        }),
    }
}

/// Parse the default argument of `env(...)`.
fn parse_literal(name: &str, literal: &str) -> TemplateResult<Value> {
    if let Some(quoted) = literal
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
    {
        return Ok(Value::String(quoted.to_string()));
    }
    serde_json::from_str(literal).map_err(|_| TemplateError::InvalidOption {
        name: name.to_string(),
        message: format!("unsupported default value {}", literal),
    })
}
