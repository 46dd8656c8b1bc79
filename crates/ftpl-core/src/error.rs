/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Error types for template resolution and compilation.
//!
//! Every variant aborts the whole compile: there is no partially built
//! builder tree on failure.

use crate::store::ResourceId;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur while resolving or compiling a template.
#[derive(Debug, Clone, Error)]
pub enum TemplateError {
    /// An `$include` / `$includeFlat` target does not exist.
    #[error("{directive} path {reference} does not exist")]
    ResourceNotFound {
        directive: &'static str,
        reference: String,
    },

    /// A `$merge` base does not exist.
    #[error("$merge resource {reference} could not be found")]
    MergeTargetMissing { reference: String },

    /// A reference uses `..` outside the root-anchored form, or escapes the store.
    #[error("Invalid template path {reference}: parent traversal ('..') is not allowed")]
    InvalidPath { reference: String },

    /// A resource reappeared in the active inclusion chain.
    #[error("Went in a loop while including templates: {}", format_chain(.chain))]
    CyclicInclusion { chain: Vec<ResourceId> },

    /// The inclusion chain grew past the maximum expansion depth.
    #[error(
        "Went beyond the maximum expansion depth ({max_depth}) while including templates: {}",
        format_chain(.chain)
    )]
    ExpansionDepthExceeded {
        max_depth: usize,
        chain: Vec<ResourceId>,
    },

    /// A directive was used in a position where it has no meaning.
    #[error("Invalid directive in {resource}{}: {message}", format_line(.line))]
    InvalidDirective {
        resource: ResourceId,
        /// 1-based line of the offending node, when known.
        line: Option<usize>,
        message: String,
    },

    /// The template source could not be parsed.
    #[error("Failed to parse template {resource}{}: {message}", format_line(.line))]
    Parse {
        resource: ResourceId,
        line: Option<usize>,
        message: String,
    },

    /// An XML name uses a prefix with no namespace bound to it.
    #[error("Namespace prefix '{prefix}' is not bound to any namespace URI")]
    UnboundPrefix { prefix: String },

    /// A vendor option has a value that cannot be used.
    #[error("Invalid value for template option '{name}': {message}")]
    InvalidOption { name: String, message: String },

    /// Reading a template resource failed.
    #[error("I/O error on template {resource}: {source}")]
    Io {
        resource: ResourceId,
        #[source]
        source: Arc<std::io::Error>,
    },
}

impl TemplateError {
    /// Stable identifier for this kind of error, for logs and tooling.
    pub fn code(&self) -> &'static str {
        match self {
            TemplateError::ResourceNotFound { .. } => "FT-1-1",
            TemplateError::MergeTargetMissing { .. } => "FT-1-2",
            TemplateError::InvalidPath { .. } => "FT-1-3",
            TemplateError::CyclicInclusion { .. } => "FT-2-1",
            TemplateError::ExpansionDepthExceeded { .. } => "FT-2-2",
            TemplateError::InvalidDirective { .. } => "FT-2-3",
            TemplateError::Parse { .. } => "FT-3-1",
            TemplateError::UnboundPrefix { .. } => "FT-3-2",
            TemplateError::InvalidOption { .. } => "FT-3-3",
            TemplateError::Io { .. } => "FT-4-1",
        }
    }
}

fn format_line(line: &Option<usize>) -> String {
    line.map(|line| format!(" (line {line})")).unwrap_or_default()
}

fn format_chain(chain: &[ResourceId]) -> String {
    chain
        .iter()
        .map(|id| id.as_str())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Result type for template operations.
pub type TemplateResult<T> = Result<T, TemplateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message_lists_chain() {
        let err = TemplateError::CyclicInclusion {
            chain: vec![
                ResourceId::new("a.json"),
                ResourceId::new("b.json"),
                ResourceId::new("a.json"),
            ],
        };
        assert_eq!(
            err.to_string(),
            "Went in a loop while including templates: a.json -> b.json -> a.json"
        );
        assert_eq!(err.code(), "FT-2-1");
    }

    #[test]
    fn test_not_found_messages() {
        let err = TemplateError::ResourceNotFound {
            directive: "$include",
            reference: "missing.json".to_string(),
        };
        assert_eq!(err.to_string(), "$include path missing.json does not exist");

        let err = TemplateError::MergeTargetMissing {
            reference: "base.json".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "$merge resource base.json could not be found"
        );
    }

    #[test]
    fn test_line_is_shown_when_known() {
        let err = TemplateError::InvalidDirective {
            resource: ResourceId::new("gml/root.xml"),
            line: Some(4),
            message: "gft:merge cannot be the root element of a template".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid directive in gml/root.xml (line 4): gft:merge cannot be the root element of a template"
        );

        let err = TemplateError::Parse {
            resource: ResourceId::new("a.json"),
            line: None,
            message: "EOF while parsing a value at line 1 column 0".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to parse template a.json: EOF while parsing a value at line 1 column 0"
        );
    }
}
