/*
 * merge/xml.rs
 * Copyright (c) 2025 Posit, PBC
 */

use ftpl_xml::{XmlAttribute, XmlChild, XmlChildren, XmlElement};

/// Merge the `overlay` element on top of the `base` element.
///
/// The result keeps the overlay's name, since the overlay is the element
/// that sits in the including document. Attributes are merged by qualified
/// name with the overlay winning. Child elements are paired by qualified
/// name in document order: pairs that both hold child elements merge
/// recursively, other pairs take the overlay child, an overlay child marked
/// `xsi:nil="true"` removes its partner, unpaired overlay children are
/// appended. Overlay text content replaces the base content.
pub fn merge_elements(base: XmlElement, overlay: XmlElement) -> XmlElement {
    let XmlElement {
        name,
        prefix,
        attributes: overlay_attributes,
        children: overlay_children,
        span,
    } = overlay;

    let attributes = merge_attributes(base.attributes, overlay_attributes);
    let children = match (base.children, overlay_children) {
        (base_children, XmlChildren::Empty) => base_children,
        (_, text @ XmlChildren::Text { .. }) => text,
        (base_children, overlay_children) => XmlChildren::from_nodes(merge_children(
            base_children.into_nodes(),
            overlay_children.into_nodes(),
        )),
    };

    XmlElement {
        name,
        prefix,
        attributes,
        children,
        span,
    }
}

fn merge_attributes(mut base: Vec<XmlAttribute>, overlay: Vec<XmlAttribute>) -> Vec<XmlAttribute> {
    for attribute in overlay {
        match base
            .iter_mut()
            .find(|a| a.name == attribute.name && a.prefix == attribute.prefix)
        {
            Some(existing) => existing.value = attribute.value,
            None => base.push(attribute),
        }
    }
    base
}

fn merge_children(base: Vec<XmlChild>, overlay: Vec<XmlChild>) -> Vec<XmlChild> {
    // A base text-only body has nothing to pair with overlay elements
    if !base.iter().any(|c| matches!(c, XmlChild::Element(_))) {
        return overlay;
    }

    let mut slots: Vec<Option<XmlChild>> = base.into_iter().map(Some).collect();
    let mut paired = vec![false; slots.len()];
    let mut appended = Vec::new();

    for child in overlay {
        let element = match child {
            XmlChild::Element(element) => element,
            text @ XmlChild::Text { .. } => {
                appended.push(text);
                continue;
            }
        };

        let partner = slots.iter().enumerate().position(|(index, slot)| {
            !paired[index]
                && matches!(slot, Some(XmlChild::Element(e))
                    if e.name == element.name && e.prefix == element.prefix)
        });

        match partner {
            Some(index) => {
                paired[index] = true;
                if is_nil(&element) {
                    slots[index] = None;
                    continue;
                }
                let merged = match slots[index].take() {
                    Some(XmlChild::Element(existing))
                        if existing.has_elements() && element.has_elements() =>
                    {
                        merge_elements(existing, element)
                    }
                    _ => element,
                };
                slots[index] = Some(XmlChild::Element(merged));
            }
            None if is_nil(&element) => {}
            None => appended.push(XmlChild::Element(element)),
        }
    }

    slots.into_iter().flatten().chain(appended).collect()
}

fn is_nil(element: &XmlElement) -> bool {
    element
        .get_prefixed_attribute("xsi", "nil")
        .is_some_and(|v| v.trim() == "true")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ftpl_xml::parse;

    fn merge(base: &str, overlay: &str) -> XmlElement {
        merge_elements(parse(base).unwrap().root, parse(overlay).unwrap().root)
    }

    fn child_names(element: &XmlElement) -> Vec<String> {
        element
            .child_elements()
            .iter()
            .map(|e| e.qualified_name())
            .collect()
    }

    #[test]
    fn test_attributes_override_and_extend() {
        let merged = merge(r#"<a x="1" y="2"/>"#, r#"<a y="20" z="30"/>"#);
        assert_eq!(merged.get_attribute("x"), Some("1"));
        assert_eq!(merged.get_attribute("y"), Some("20"));
        assert_eq!(merged.get_attribute("z"), Some("30"));
    }

    #[test]
    fn test_empty_overlay_keeps_base_children() {
        let merged = merge("<a><b>1</b></a>", "<root/>");
        assert_eq!(merged.name, "root");
        assert_eq!(child_names(&merged), vec!["b"]);
    }

    #[test]
    fn test_children_paired_by_name() {
        let merged = merge(
            "<f><gml:name>base</gml:name><kind>river</kind></f>",
            "<f><gml:name>${name}</gml:name><extra>1</extra></f>",
        );
        assert_eq!(child_names(&merged), vec!["gml:name", "kind", "extra"]);
        assert_eq!(merged.child_elements()[0].text(), Some("${name}"));
    }

    #[test]
    fn test_nested_elements_merge_recursively() {
        let merged = merge(
            "<f><props><a>1</a><b>2</b></props></f>",
            "<f><props><b>20</b><c>30</c></props></f>",
        );
        let props = merged.child_elements()[0];
        assert_eq!(child_names(props), vec!["a", "b", "c"]);
        assert_eq!(props.child_elements()[1].text(), Some("20"));
    }

    #[test]
    fn test_nil_removes_child() {
        let merged = merge(
            "<f><a>1</a><b>2</b></f>",
            r#"<f xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"><a xsi:nil="true"/></f>"#,
        );
        assert_eq!(child_names(&merged), vec!["b"]);
    }

    #[test]
    fn test_text_overlay_replaces_content() {
        let merged = merge("<f><a>1</a></f>", "<f>flat text</f>");
        assert_eq!(merged.text(), Some("flat text"));
    }
}
