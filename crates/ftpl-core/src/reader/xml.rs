/*
 * reader/xml.rs
 * Copyright (c) 2025 Posit, PBC
 */

use super::ReaderConfig;
use crate::builder::{
    AttributeBuilder, AttributeValue, Builder, ContainerBuilder, DynamicBuilder, EncodingHints,
    KeySpec, NamespaceBinding, RootBuilder, StaticBuilder, TemplateOptions,
};
use crate::error::{TemplateError, TemplateResult};
use crate::expression::is_expression;
use crate::namespace::{NamespaceSupport, TEMPLATE_NAMESPACE, TEMPLATE_PREFIX};
use ftpl_xml::{XmlAttribute, XmlChild, XmlElement};
use serde_json::Value;

const OPTIONS: &str = "Options";
const NAMESPACES: &str = "Namespaces";
const SCHEMA_LOCATION: &str = "SchemaLocation";
const SOURCE_ATTRIBUTE: &str = "source";
const FILTER_ATTRIBUTE: &str = "filter";

/// Compiles a resolved XML/GML template into a builder tree.
///
/// The root element is the template wrapper: each of its child elements
/// compiles to one top-level builder, except `gft:Options`, which carries the
/// output namespaces and schema location. Element and attribute names are
/// resolved against the caller's [`NamespaceSupport`] extended with the
/// template's own declarations.
pub struct XmlTemplateReader<'a> {
    config: &'a ReaderConfig,
}

impl<'a> XmlTemplateReader<'a> {
    pub fn new(config: &'a ReaderConfig) -> Self {
        Self { config }
    }

    pub fn read(&self, mut resolved: XmlElement) -> TemplateResult<RootBuilder> {
        let mut namespaces = self.config.namespaces.clone();
        namespaces.enter_element(&resolved);

        let mut options = TemplateOptions::default();
        let (option_elements, content): (Vec<XmlChild>, Vec<XmlChild>) = resolved
            .take_children()
            .into_iter()
            .partition(|child| {
                matches!(child, XmlChild::Element(e) if namespaces.is_template_element(e, OPTIONS))
            });

        // Options first: the namespaces they declare apply to the whole template
        for child in option_elements {
            if let XmlChild::Element(element) = child {
                self.read_options(&element, &mut namespaces, &mut options)?;
            }
        }

        let mut children = Vec::new();
        for child in content {
            match child {
                XmlChild::Element(element) => children.push(self.compile_element(element, &mut namespaces)?),
                XmlChild::Text { content, .. } if !content.trim().is_empty() => {
                    children.push(text_builder(None, content.trim(), EncodingHints::default()));
                }
                XmlChild::Text { .. } => {}
            }
        }

        tracing::debug!(
            builders = children.len(),
            namespaces = options.namespaces.len(),
            "Compiled XML template"
        );
        Ok(RootBuilder::new(children, options))
    }

    fn read_options(
        &self,
        element: &XmlElement,
        namespaces: &mut NamespaceSupport,
        options: &mut TemplateOptions,
    ) -> TemplateResult<()> {
        for option in element.child_elements() {
            if namespaces.is_template_element(option, NAMESPACES) {
                for (prefix, uri) in option.namespace_declarations() {
                    namespaces.declare(prefix, uri);
                    options.namespaces.push(NamespaceBinding {
                        prefix: prefix.map(str::to_string),
                        uri: uri.to_string(),
                    });
                }
            } else if namespaces.is_template_element(option, SCHEMA_LOCATION) {
                let location = option.text().map(|t| Value::String(t.trim().to_string()));
                options.schema_location = self
                    .config
                    .string_option("schema_location", location.as_ref())?;
            } else {
                tracing::warn!(option = %option.qualified_name(), "Ignoring unknown template option");
            }
        }
        Ok(())
    }

    fn compile_element(&self, element: XmlElement, namespaces: &mut NamespaceSupport) -> TemplateResult<Builder> {
        namespaces.enter_element(&element);
        let builder = self.compile_in_scope(element, namespaces);
        namespaces.pop_context();
        builder
    }

    fn compile_in_scope(&self, element: XmlElement, namespaces: &mut NamespaceSupport) -> TemplateResult<Builder> {
        let key = KeySpec::parse(&element.qualified_name());
        let namespace_uri = match element.prefix.as_deref() {
            Some(prefix) => Some(resolve_prefix(namespaces, prefix)?),
            None => namespaces.uri(None).map(str::to_string),
        };

        let mut source = None;
        let mut filter = None;
        let mut attributes = Vec::new();
        for attribute in &element.attributes {
            if attribute.is_namespace_declaration() {
                continue;
            }
            if attribute.prefix.is_some() && namespaces.is_template_prefix(attribute.prefix.as_deref()) {
                match attribute.name.as_str() {
                    SOURCE_ATTRIBUTE => source = Some(attribute.value.clone()),
                    FILTER_ATTRIBUTE => filter = Some(attribute.value.clone()),
                    other => tracing::debug!(attribute = other, "Ignoring template attribute"),
                }
                continue;
            }
            attributes.push(attribute_builder(attribute, namespaces)?);
        }
        let hints = EncodingHints {
            namespace_uri,
            attributes,
        };

        let nodes = element.children.into_nodes();
        let has_elements = nodes.iter().any(|n| matches!(n, XmlChild::Element(_)));

        if !has_elements && source.is_none() && filter.is_none() {
            return Ok(leaf(Some(key), &nodes, hints));
        }

        let mut container = ContainerBuilder::new(Some(key));
        container.source = source;
        container.filter = filter;
        container.hints = hints;
        if has_elements {
            for node in nodes {
                match node {
                    XmlChild::Element(child) => container.children.push(self.compile_element(child, namespaces)?),
                    XmlChild::Text { content, .. } if !content.trim().is_empty() => {
                        container
                            .children
                            .push(text_builder(None, content.trim(), EncodingHints::default()));
                    }
                    XmlChild::Text { .. } => {}
                }
            }
        } else {
            container.children.push(leaf(None, &nodes, EncodingHints::default()));
        }

        Ok(if container.source.is_some() {
            Builder::Iterating(container)
        } else {
            Builder::Composite(container)
        })
    }
}

fn resolve_prefix(namespaces: &NamespaceSupport, prefix: &str) -> TemplateResult<String> {
    namespaces
        .uri(Some(prefix))
        .or_else(|| (prefix == TEMPLATE_PREFIX).then_some(TEMPLATE_NAMESPACE))
        .map(str::to_string)
        .ok_or_else(|| TemplateError::UnboundPrefix {
            prefix: prefix.to_string(),
        })
}

fn attribute_builder(attribute: &XmlAttribute, namespaces: &NamespaceSupport) -> TemplateResult<AttributeBuilder> {
    let namespace_uri = match attribute.prefix.as_deref() {
        Some(prefix) => Some(resolve_prefix(namespaces, prefix)?),
        None => None,
    };
    let value = if is_expression(&attribute.value) {
        AttributeValue::Expression(attribute.value.clone())
    } else {
        AttributeValue::Literal(attribute.value.clone())
    };
    Ok(AttributeBuilder {
        name: attribute.qualified_name(),
        namespace_uri,
        value,
    })
}

/// Builder for an element without child elements.
fn leaf(key: Option<KeySpec>, nodes: &[XmlChild], hints: EncodingHints) -> Builder {
    let text: String = nodes
        .iter()
        .filter_map(|n| match n {
            XmlChild::Text { content, .. } => Some(content.as_str()),
            XmlChild::Element(_) => None,
        })
        .collect();
    let text = text.trim();

    if text.is_empty() {
        Builder::Static(StaticBuilder {
            key,
            value: Value::Null,
            hints,
        })
    } else {
        text_builder(key, text, hints)
    }
}

fn text_builder(key: Option<KeySpec>, text: &str, hints: EncodingHints) -> Builder {
    if is_expression(text) {
        Builder::Dynamic(DynamicBuilder {
            key,
            expression: text.to_string(),
            hints,
        })
    } else {
        Builder::Static(StaticBuilder {
            key,
            value: Value::String(text.to_string()),
            hints,
        })
    }
}
