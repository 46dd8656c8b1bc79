//! Span-tracked XML parsing for feature templates.
//!
//! This crate wraps [`quick-xml`] to provide an owned tree of [`XmlElement`]s
//! that can be inspected, spliced and merged before being compiled into
//! builders. Every element remembers the byte range it came from so errors
//! can point back into the template file.
//!
//! # Overview
//!
//! - [`XmlDocument`]: the parsed document (root element plus its span)
//! - [`XmlElement`]: an element with local name, prefix, attributes and children
//! - [`XmlAttribute`]: an attribute with local name, prefix and unescaped value
//! - [`XmlChildren`]: element content (elements, text, mixed, or empty)
//!
//! # Example
//!
//! ```rust
//! use ftpl_xml::parse;
//!
//! let xml = parse(r#"<gft:Template xmlns:gft="http://www.geoserver.org/features-templating">
//!   <topp:name xmlns:topp="http://www.openplans.org/topp">${name}</topp:name>
//! </gft:Template>"#).unwrap();
//!
//! assert_eq!(xml.root.name, "Template");
//! assert_eq!(xml.root.prefix.as_deref(), Some("gft"));
//!
//! let names = xml.root.get_children("name");
//! assert_eq!(names[0].text(), Some("${name}"));
//! ```

pub mod error;
pub mod parser;
pub mod types;
pub mod writer;

pub use error::{Error, Result};
pub use parser::parse;
pub use types::{Span, XmlAttribute, XmlChild, XmlChildren, XmlDocument, XmlElement};
pub use writer::to_xml_string;
