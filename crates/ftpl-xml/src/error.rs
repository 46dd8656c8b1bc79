//! Error types for XML parsing and writing.

use thiserror::Error;

/// Result type alias for ftpl-xml operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while parsing or writing XML.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// XML syntax error reported by quick-xml.
    #[error("XML syntax error: {message}{}", .position.map(|p| format!(" at byte {p}")).unwrap_or_default())]
    XmlSyntax {
        message: String,
        /// Byte offset where the error occurred.
        position: Option<u64>,
    },

    /// Input ended while an element was still open.
    #[error("Unexpected end of input, expected {expected}")]
    UnexpectedEof { expected: String, offset: usize },

    /// End tag does not match the open element.
    #[error("Mismatched end tag: expected </{expected}>, found </{found}>")]
    MismatchedEndTag {
        expected: String,
        found: String,
        offset: usize,
    },

    /// Structural problem that quick-xml does not catch itself.
    #[error("Invalid XML structure: {message}")]
    InvalidStructure { message: String },

    /// No root element.
    #[error("Empty XML document: no root element found")]
    EmptyDocument,

    /// More than one root element.
    #[error("Invalid XML: multiple root elements")]
    MultipleRoots { offset: usize },

    /// Serializing a tree back to text failed.
    #[error("Failed to write XML: {0}")]
    Write(String),
}

impl Error {
    /// Byte offset in the source the error refers to, when known.
    pub fn offset(&self) -> Option<usize> {
        match self {
            Error::XmlSyntax { position, .. } => position.map(|p| p as usize),
            Error::UnexpectedEof { offset, .. }
            | Error::MismatchedEndTag { offset, .. }
            | Error::MultipleRoots { offset } => Some(*offset),
            Error::InvalidStructure { .. } | Error::EmptyDocument | Error::Write(_) => None,
        }
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::XmlSyntax {
            message: err.to_string(),
            position: None,
        }
    }
}

impl From<quick_xml::events::attributes::AttrError> for Error {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Error::XmlSyntax {
            message: format!("Attribute error: {}", err),
            position: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_error_display_includes_position() {
        let err = Error::XmlSyntax {
            message: "bad".to_string(),
            position: Some(12),
        };
        assert_eq!(err.to_string(), "XML syntax error: bad at byte 12");
        assert_eq!(err.offset(), Some(12));
    }

    #[test]
    fn test_empty_document_has_no_offset() {
        assert_eq!(Error::EmptyDocument.offset(), None);
    }
}
