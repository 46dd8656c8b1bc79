//! Serialization of element trees back to XML text.
//!
//! Used to show fully resolved templates; the output is indented and does
//! not reproduce the original formatting.

use crate::{Error, Result, XmlChild, XmlChildren, XmlElement};
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use std::io::Cursor;

/// Serialize an element (and its subtree) as indented XML.
pub fn to_xml_string(element: &XmlElement) -> Result<String> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    write_element(&mut writer, element)?;
    let bytes = writer.into_inner().into_inner();
    String::from_utf8(bytes).map_err(|e| Error::Write(e.to_string()))
}

fn write_element(writer: &mut Writer<Cursor<Vec<u8>>>, element: &XmlElement) -> Result<()> {
    let name = element.qualified_name();
    let mut start = BytesStart::new(name.as_str());
    for attribute in &element.attributes {
        let key = attribute.qualified_name();
        start.push_attribute((key.as_str(), attribute.value.as_str()));
    }

    if element.is_empty() {
        return write_event(writer, Event::Empty(start));
    }

    write_event(writer, Event::Start(start))?;
    match &element.children {
        XmlChildren::Elements(elements) => {
            for child in elements {
                write_element(writer, child)?;
            }
        }
        XmlChildren::Text { content, .. } => {
            write_event(writer, Event::Text(BytesText::new(content)))?;
        }
        XmlChildren::Mixed(children) => {
            for child in children {
                match child {
                    XmlChild::Element(e) => write_element(writer, e)?,
                    XmlChild::Text { content, .. } => {
                        write_event(writer, Event::Text(BytesText::new(content)))?
                    }
                }
            }
        }
        XmlChildren::Empty => {}
    }
    write_event(writer, Event::End(BytesEnd::new(name.as_str())))
}

fn write_event(writer: &mut Writer<Cursor<Vec<u8>>>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| Error::Write(e.to_string()))
}
