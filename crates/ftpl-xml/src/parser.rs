//! XML parser that builds owned element trees.

use crate::{Error, Result, Span, XmlAttribute, XmlChild, XmlChildren, XmlDocument, XmlElement};
use quick_xml::Reader;
use quick_xml::events::{BytesCData, BytesEnd, BytesStart, BytesText, Event};

/// Parse XML from a string.
///
/// Comments, processing instructions, the XML declaration and DOCTYPE are
/// skipped. Namespace prefixes are kept as written; resolving them to URIs is
/// left to the caller, which knows the namespace context of the template.
///
/// # Example
///
/// ```rust
/// use ftpl_xml::parse;
///
/// let xml = parse("<root><child/></root>").unwrap();
/// assert_eq!(xml.root.name, "root");
/// ```
///
/// # Errors
///
/// Returns an error if the XML is malformed or has no single root element.
pub fn parse(content: &str) -> Result<XmlDocument> {
    XmlParser::new(content).parse()
}

/// Internal parser state.
struct XmlParser<'a> {
    source: &'a str,
    reader: Reader<&'a [u8]>,
    /// Stack of elements being built.
    stack: Vec<BuildNode>,
}

/// A node being constructed during parsing.
struct BuildNode {
    name: String,
    prefix: Option<String>,
    attributes: Vec<XmlAttribute>,
    /// Byte offset where this element started (the `<` character).
    start_offset: usize,
    children: Vec<XmlChild>,
}

impl<'a> XmlParser<'a> {
    fn new(source: &'a str) -> Self {
        let mut reader = Reader::from_str(source);
        reader.config_mut().trim_text_start = false;
        reader.config_mut().trim_text_end = false;

        Self {
            source,
            reader,
            stack: Vec::new(),
        }
    }

    fn parse(&mut self) -> Result<XmlDocument> {
        let mut root: Option<XmlElement> = None;

        loop {
            let event_start = self.reader.buffer_position() as usize;

            match self.reader.read_event() {
                Ok(Event::Start(e)) => {
                    self.handle_start(&e, event_start)?;
                }
                Ok(Event::End(e)) => {
                    let element = self.handle_end(&e)?;
                    self.attach(element, &mut root)?;
                }
                Ok(Event::Empty(e)) => {
                    let element = self.handle_empty(&e, event_start)?;
                    self.attach(element, &mut root)?;
                }
                Ok(Event::Text(e)) => {
                    self.handle_text(&e, event_start)?;
                }
                Ok(Event::CData(e)) => {
                    self.handle_cdata(&e, event_start);
                }
                Ok(Event::Comment(_) | Event::PI(_) | Event::Decl(_) | Event::DocType(_)) => {}
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::XmlSyntax {
                        message: e.to_string(),
                        position: Some(self.reader.error_position()),
                    });
                }
            }
        }

        if let Some(node) = self.stack.last() {
            return Err(Error::UnexpectedEof {
                expected: format!("closing tag </{}>", qualified(&node.prefix, &node.name)),
                offset: node.start_offset,
            });
        }

        let root = root.ok_or(Error::EmptyDocument)?;
        Ok(XmlDocument::new(root, Span::new(0, self.source.len())))
    }

    /// Hand a finished element to its parent, or make it the root.
    fn attach(&mut self, element: XmlElement, root: &mut Option<XmlElement>) -> Result<()> {
        match self.stack.last_mut() {
            Some(parent) => parent.children.push(XmlChild::Element(element)),
            None => {
                if root.is_some() {
                    return Err(Error::MultipleRoots {
                        offset: element.span.start,
                    });
                }
                *root = Some(element);
            }
        }
        Ok(())
    }

    fn handle_start(&mut self, e: &BytesStart<'_>, event_start: usize) -> Result<()> {
        let (name, prefix) = split_name(e.name().as_ref());
        let attributes = self.parse_attributes(e, event_start)?;

        self.stack.push(BuildNode {
            name,
            prefix,
            attributes,
            start_offset: event_start,
            children: Vec::new(),
        });

        Ok(())
    }

    fn handle_end(&mut self, e: &BytesEnd<'_>) -> Result<XmlElement> {
        let (end_name, end_prefix) = split_name(e.name().as_ref());

        let node = self.stack.pop().ok_or_else(|| Error::InvalidStructure {
            message: format!("Unexpected closing tag </{}>", qualified(&end_prefix, &end_name)),
        })?;

        if node.name != end_name || node.prefix != end_prefix {
            return Err(Error::MismatchedEndTag {
                expected: qualified(&node.prefix, &node.name),
                found: qualified(&end_prefix, &end_name),
                offset: node.start_offset,
            });
        }

        let end_offset = self.reader.buffer_position() as usize;

        Ok(XmlElement {
            name: node.name,
            prefix: node.prefix,
            attributes: node.attributes,
            children: XmlChildren::from_nodes(node.children),
            span: Span::new(node.start_offset, end_offset),
        })
    }

    fn handle_empty(&mut self, e: &BytesStart<'_>, event_start: usize) -> Result<XmlElement> {
        let (name, prefix) = split_name(e.name().as_ref());
        let attributes = self.parse_attributes(e, event_start)?;
        let end_offset = self.reader.buffer_position() as usize;

        Ok(XmlElement {
            name,
            prefix,
            attributes,
            children: XmlChildren::Empty,
            span: Span::new(event_start, end_offset),
        })
    }

    fn handle_text(&mut self, e: &BytesText<'_>, event_start: usize) -> Result<()> {
        let text = e.unescape().map_err(|err| Error::XmlSyntax {
            message: format!("Invalid text content: {}", err),
            position: Some(event_start as u64),
        })?;
        let end_offset = self.reader.buffer_position() as usize;
        self.push_text(text.into_owned(), Span::new(event_start, end_offset));
        Ok(())
    }

    fn handle_cdata(&mut self, e: &BytesCData<'_>, event_start: usize) {
        let text = String::from_utf8_lossy(e.as_ref()).into_owned();
        let end_offset = self.reader.buffer_position() as usize;
        self.push_text(text, Span::new(event_start, end_offset));
    }

    /// Append text to the open element, joining it with adjacent text.
    fn push_text(&mut self, text: String, span: Span) {
        // Text outside the root element is insignificant
        let Some(node) = self.stack.last_mut() else {
            return;
        };

        if let Some(XmlChild::Text {
            content,
            span: previous,
        }) = node.children.last_mut()
        {
            content.push_str(&text);
            previous.end = span.end;
            return;
        }

        node.children.push(XmlChild::Text {
            content: text,
            span,
        });
    }

    fn parse_attributes(&self, e: &BytesStart<'_>, tag_start: usize) -> Result<Vec<XmlAttribute>> {
        let mut attributes = Vec::new();

        for attr_result in e.attributes() {
            let attr = attr_result?;
            let (name, prefix) = split_name(attr.key.as_ref());

            let value = attr.unescape_value().map_err(|err| Error::XmlSyntax {
                message: format!("Invalid attribute value: {}", err),
                position: Some(tag_start as u64),
            })?;

            attributes.push(XmlAttribute {
                name,
                prefix,
                value: value.into_owned(),
            });
        }

        Ok(attributes)
    }
}

/// Split a raw `prefix:local` name.
fn split_name(raw: &[u8]) -> (String, Option<String>) {
    let full_name = String::from_utf8_lossy(raw);

    match full_name.split_once(':') {
        Some((prefix, local)) => (local.to_string(), Some(prefix.to_string())),
        None => (full_name.into_owned(), None),
    }
}

fn qualified(prefix: &Option<String>, name: &str) -> String {
    match prefix {
        Some(prefix) => format!("{}:{}", prefix, name),
        None => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_element() {
        let xml = parse("<root/>").unwrap();
        assert_eq!(xml.root.name, "root");
        assert!(xml.root.is_empty());
    }

    #[test]
    fn test_parse_nested_elements() {
        let xml = parse("<root>\n  <child/>\n</root>").unwrap();
        assert!(xml.root.has_elements());

        let children = xml.root.child_elements();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].name, "child");
    }

    #[test]
    fn test_parse_text_content() {
        let xml = parse("<root>Hello, world!</root>").unwrap();
        assert!(xml.root.has_text());
        assert_eq!(xml.root.text(), Some("Hello, world!"));
    }

    #[test]
    fn test_parse_text_and_cdata_are_joined() {
        let xml = parse("<root>a &amp; <![CDATA[<b>]]></root>").unwrap();
        assert_eq!(xml.root.text(), Some("a & <b>"));
    }

    #[test]
    fn test_parse_namespace_prefix() {
        let xml =
            parse(r#"<gml:Point xmlns:gml="http://www.opengis.net/gml/3.2" gml:id="p1"/>"#).unwrap();
        assert_eq!(xml.root.name, "Point");
        assert_eq!(xml.root.prefix, Some("gml".to_string()));
        assert_eq!(xml.root.get_prefixed_attribute("gml", "id"), Some("p1"));
        assert_eq!(
            xml.root.namespace_declarations(),
            vec![(Some("gml"), "http://www.opengis.net/gml/3.2")]
        );
    }

    #[test]
    fn test_span_tracking() {
        let content = "<root><child/></root>";
        let xml = parse(content).unwrap();

        assert_eq!(xml.root.span, Span::new(0, content.len()));
        assert_eq!(xml.root.child_elements()[0].span, Span::new(6, 14));
    }

    #[test]
    fn test_comments_and_declaration_are_skipped() {
        let xml = parse("<?xml version=\"1.0\"?>\n<!-- header -->\n<root><!-- c -->x</root>").unwrap();
        assert_eq!(xml.root.text(), Some("x"));
    }

    #[test]
    fn test_empty_document_error() {
        assert!(matches!(parse(""), Err(Error::EmptyDocument)));
    }

    #[test]
    fn test_multiple_roots_error() {
        assert!(matches!(parse("<a/><b/>"), Err(Error::MultipleRoots { offset: 4 })));
    }

    #[test]
    fn test_unclosed_element_error() {
        let result = parse("<root><child>");
        assert!(
            matches!(
                result,
                Err(Error::UnexpectedEof { .. } | Error::XmlSyntax { .. })
            ),
            "Expected UnexpectedEof or XmlSyntax error, got: {:?}",
            result
        );
    }

    #[test]
    fn test_mismatched_tags_error() {
        let result = parse("<root></wrong>");
        // quick-xml checks end names itself and reports IllFormed, which maps to XmlSyntax
        assert!(
            matches!(
                result,
                Err(Error::MismatchedEndTag { .. } | Error::XmlSyntax { .. })
            ),
            "Expected MismatchedEndTag or XmlSyntax error, got: {:?}",
            result
        );
    }
}
