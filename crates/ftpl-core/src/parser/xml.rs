/*
 * parser/xml.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Recursive parser for XML/GML templates.
//!
//! Directives are elements in the template namespace:
//! - `<gft:include>x.xml</gft:include>` is replaced by the root element of
//!   the included document
//! - `<gft:includeFlat>x.xml</gft:includeFlat>` is replaced by the children
//!   of that root element
//! - `<gft:merge>base.xml</gft:merge>` as a child of an element merges that
//!   element over the root element of the included document

use super::{DEFAULT_MAX_DEPTH, LineIndex, MissingResources, Resolution, WatchedResources};
use crate::directive::Directive;
use crate::error::{TemplateError, TemplateResult};
use crate::merge::merge_elements;
use crate::namespace::NamespaceSupport;
use crate::store::{ResourceId, TemplateStore};
use ftpl_xml::{XmlAttribute, XmlChild, XmlElement};

/// Parses an XML template and everything it includes into one element tree.
pub struct XmlTemplateParser<'a> {
    store: &'a dyn TemplateStore,
    max_depth: usize,
    watched: WatchedResources,
    missing: MissingResources,
}

impl<'a> XmlTemplateParser<'a> {
    pub fn new(store: &'a dyn TemplateStore) -> Self {
        Self {
            store,
            max_depth: DEFAULT_MAX_DEPTH,
            watched: WatchedResources::new(),
            missing: MissingResources::new(),
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Parse `root`, expanding every directive element it reaches.
    pub fn parse(&mut self, root: &ResourceId) -> TemplateResult<XmlElement> {
        let mut resolution = Resolution::new(self.store, root, self.max_depth);
        let expanded = resolution.read_root().and_then(|source| {
            let document = parse_source(root, &source)?;
            resolution.expand_document_root(document.root)
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

fn parse_source(resource: &ResourceId, source: &str) -> TemplateResult<ftpl_xml::XmlDocument> {
    ftpl_xml::parse(source).map_err(|e| TemplateError::Parse {
        resource: resource.clone(),
        line: e.offset().map(|offset| LineIndex::new(source).line(offset)),
        message: e.to_string(),
    })
}

impl Resolution<'_> {
    /// Load a referenced document and expand it to its root element.
    fn include_xml(&mut self, reference: &str, directive: Directive) -> TemplateResult<XmlElement> {
        self.load(reference, directive, |resolution, id, source| {
            let document = parse_source(id, &source)?;
            resolution.expand_document_root(document.root)
        })
    }

    /// Expand the root of a document, which must stay a single element.
    fn expand_document_root(&mut self, root: XmlElement) -> TemplateResult<XmlElement> {
        // Every document starts its own scope: prefixes never leak across files
        let mut namespaces = NamespaceSupport::with_template_prefix();
        if is_directive(&namespaces, &root, Directive::Merge) {
            return Err(self.invalid_directive_at(
                root.span.start,
                "gft:merge cannot be the root element of a template",
            ));
        }
        let root_start = root.span.start;

        let mut nodes = self.expand_element(root, &mut namespaces)?.into_iter().filter(|node| match node {
            XmlChild::Text { content, .. } => !content.trim().is_empty(),
            XmlChild::Element(_) => true,
        });

        match (nodes.next(), nodes.next()) {
            (Some(XmlChild::Element(element)), None) => Ok(element),
            _ => Err(self.invalid_directive_at(
                root_start,
                "the template root must expand to exactly one element",
            )),
        }
    }

    /// Expand one element into the nodes that replace it.
    fn expand_element(
        &mut self,
        element: XmlElement,
        namespaces: &mut NamespaceSupport,
    ) -> TemplateResult<Vec<XmlChild>> {
        namespaces.enter_element(&element);
        let expanded = self.expand_in_scope(element, namespaces);
        namespaces.pop_context();
        expanded
    }

    fn expand_in_scope(
        &mut self,
        mut element: XmlElement,
        namespaces: &mut NamespaceSupport,
    ) -> TemplateResult<Vec<XmlChild>> {
        if is_directive(namespaces, &element, Directive::Include) {
            let reference = self.directive_reference(&element)?;
            let included = self.include_xml(&reference, Directive::Include)?;
            return Ok(vec![XmlChild::Element(included)]);
        }
        if is_directive(namespaces, &element, Directive::IncludeFlat) {
            let reference = self.directive_reference(&element)?;
            let included = self.include_xml(&reference, Directive::IncludeFlat)?;
            return Ok(spread_children(included));
        }
        if is_directive(namespaces, &element, Directive::Merge) {
            return Err(self.invalid_directive_at(
                element.span.start,
                format!(
                    "{} must be a direct child of the element it merges into",
                    element.qualified_name()
                ),
            ));
        }

        let mut base_reference = None;
        let mut children = Vec::new();
        for child in element.take_children() {
            match child {
                XmlChild::Element(child) if is_directive(namespaces, &child, Directive::Merge) => {
                    if base_reference.is_some() {
                        return Err(self.invalid_directive_at(
                            child.span.start,
                            format!("{} holds more than one merge directive", element.qualified_name()),
                        ));
                    }
                    base_reference = Some(self.directive_reference(&child)?);
                }
                XmlChild::Element(child) => children.extend(self.expand_element(child, namespaces)?),
                text @ XmlChild::Text { .. } => children.push(text),
            }
        }
        element.set_children(children);

        match base_reference {
            Some(reference) => {
                let base = self.include_xml(&reference, Directive::Merge)?;
                Ok(vec![XmlChild::Element(merge_elements(base, element))])
            }
            None => Ok(vec![XmlChild::Element(element)]),
        }
    }

    fn directive_reference(&self, element: &XmlElement) -> TemplateResult<String> {
        match element.text().map(str::trim) {
            Some(reference) if !reference.is_empty() => Ok(reference.to_string()),
            _ => Err(self.invalid_directive_at(
                element.span.start,
                format!("{} must contain a path and nothing else", element.qualified_name()),
            )),
        }
    }
}

fn is_directive(namespaces: &NamespaceSupport, element: &XmlElement, directive: Directive) -> bool {
    Directive::from_element_name(&element.name) == Some(directive)
        && namespaces.is_template_prefix(element.prefix.as_deref())
}

/// Children of an included root, carrying the root's namespace declarations.
fn spread_children(root: XmlElement) -> Vec<XmlChild> {
    let declarations: Vec<XmlAttribute> = root
        .attributes
        .iter()
        .filter(|a| a.is_namespace_declaration())
        .cloned()
        .collect();

    root.children
        .into_nodes()
        .into_iter()
        .map(|child| match child {
            XmlChild::Element(mut element) => {
                for declaration in &declarations {
                    let declared = element
                        .attributes
                        .iter()
                        .any(|a| a.name == declaration.name && a.prefix == declaration.prefix);
                    if !declared {
                        element.attributes.push(declaration.clone());
                    }
                }
                XmlChild::Element(element)
            }
            text => text,
        })
        .collect()
}
