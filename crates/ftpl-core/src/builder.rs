/*
 * builder.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The compiled builder tree.
//!
//! A resolved template compiles into a [`RootBuilder`] owning a tree of
//! [`Builder`]s. The tree is immutable once built and is shared between
//! requests through an `Arc`; when any file it was compiled from changes, a
//! new tree is compiled and replaces it wholesale.

use crate::store::ResourceId;
use crate::watcher::ReloadWatcher;
use serde::Serialize;
use serde_json::Value;

/// The key a builder writes its output under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeySpec {
    /// A literal key.
    Static(String),
    /// A key computed per feature from an expression.
    Dynamic(String),
}

impl KeySpec {
    /// Classify a key as written in the template.
    pub fn parse(key: &str) -> Self {
        if crate::expression::is_expression(key) {
            KeySpec::Dynamic(key.to_string())
        } else {
            KeySpec::Static(key.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            KeySpec::Static(key) | KeySpec::Dynamic(key) => key,
        }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, KeySpec::Dynamic(_))
    }
}

/// Value of an XML attribute builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeValue {
    Literal(String),
    Expression(String),
}

/// An attribute written on the XML element produced by a builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeBuilder {
    /// Qualified name as written in the template.
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace_uri: Option<String>,
    pub value: AttributeValue,
}

/// Output details only XML encoders use.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EncodingHints {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace_uri: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<AttributeBuilder>,
}

impl EncodingHints {
    pub fn is_empty(&self) -> bool {
        self.namespace_uri.is_none() && self.attributes.is_empty()
    }
}

/// Writes a literal value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaticBuilder {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<KeySpec>,
    pub value: Value,
    #[serde(skip_serializing_if = "EncodingHints::is_empty")]
    pub hints: EncodingHints,
}

/// Writes the result of evaluating an expression against each feature.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DynamicBuilder {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<KeySpec>,
    pub expression: String,
    #[serde(skip_serializing_if = "EncodingHints::is_empty")]
    pub hints: EncodingHints,
}

/// Writes an object (composite) or an array (iterating) of child outputs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContainerBuilder {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<KeySpec>,
    /// Expression selecting the data the children are evaluated against.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Expression deciding whether the container is written at all.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    pub children: Vec<Builder>,
    #[serde(skip_serializing_if = "EncodingHints::is_empty")]
    pub hints: EncodingHints,
}

impl ContainerBuilder {
    pub fn new(key: Option<KeySpec>) -> Self {
        Self {
            key,
            source: None,
            filter: None,
            children: Vec::new(),
            hints: EncodingHints::default(),
        }
    }
}

/// A container whose descendants are written as flat, path-joined keys.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlatBuilder {
    #[serde(flatten)]
    pub container: ContainerBuilder,
    /// Keys of the enclosing flattened containers below the top level,
    /// outermost first, followed by this container's own key. Empty for a
    /// top-level container, which keeps its key as a nested object.
    pub path: Vec<KeySpec>,
    pub separator: String,
}

impl FlatBuilder {
    /// The flattened output key of a child written under `key`.
    ///
    /// `None` when part of the path is only known per feature.
    pub fn child_key(&self, key: &str) -> Option<String> {
        if self.path.iter().any(KeySpec::is_dynamic) {
            return None;
        }
        let mut parts: Vec<&str> = self.path.iter().map(KeySpec::as_str).collect();
        parts.push(key);
        Some(parts.join(&self.separator))
    }
}

/// A merge that can only be performed once the overlay expression is known.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DynamicMergeBuilder {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<KeySpec>,
    pub base: Value,
    pub overlay: String,
}

/// A node of the compiled tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Builder {
    Static(StaticBuilder),
    Dynamic(DynamicBuilder),
    Composite(ContainerBuilder),
    FlatComposite(FlatBuilder),
    Iterating(ContainerBuilder),
    FlatIterating(FlatBuilder),
    DynamicMerge(DynamicMergeBuilder),
}

impl Builder {
    pub fn key(&self) -> Option<&KeySpec> {
        match self {
            Builder::Static(b) => b.key.as_ref(),
            Builder::Dynamic(b) => b.key.as_ref(),
            Builder::Composite(b) | Builder::Iterating(b) => b.key.as_ref(),
            Builder::FlatComposite(b) | Builder::FlatIterating(b) => b.container.key.as_ref(),
            Builder::DynamicMerge(b) => b.key.as_ref(),
        }
    }

    /// Child builders; empty for leaves.
    pub fn children(&self) -> &[Builder] {
        match self.container() {
            Some(container) => &container.children,
            None => &[],
        }
    }

    pub fn container(&self) -> Option<&ContainerBuilder> {
        match self {
            Builder::Composite(b) | Builder::Iterating(b) => Some(b),
            Builder::FlatComposite(b) | Builder::FlatIterating(b) => Some(&b.container),
            _ => None,
        }
    }

    pub fn is_flat(&self) -> bool {
        matches!(self, Builder::FlatComposite(_) | Builder::FlatIterating(_))
    }

    pub fn hints(&self) -> Option<&EncodingHints> {
        match self {
            Builder::Static(b) => Some(&b.hints),
            Builder::Dynamic(b) => Some(&b.hints),
            Builder::DynamicMerge(_) => None,
            _ => self.container().map(|c| &c.hints),
        }
    }

    /// Find the first direct child written under the static key `key`.
    pub fn child(&self, key: &str) -> Option<&Builder> {
        self.children()
            .iter()
            .find(|child| matches!(child.key(), Some(KeySpec::Static(k)) if k == key))
    }
}

/// A namespace declared for the output document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamespaceBinding {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    pub uri: String,
}

/// Vendor options, resolved once at compile time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateOptions {
    pub flat_output: bool,
    pub separator: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub namespaces: Vec<NamespaceBinding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_location: Option<String>,
}

/// Separator joining flattened keys unless a template picks its own.
pub const DEFAULT_SEPARATOR: &str = "_";

impl Default for TemplateOptions {
    fn default() -> Self {
        Self {
            flat_output: false,
            separator: DEFAULT_SEPARATOR.to_string(),
            collection_name: None,
            namespaces: Vec::new(),
            schema_location: None,
        }
    }
}

/// Root of a compiled template.
#[derive(Debug, Serialize)]
pub struct RootBuilder {
    #[serde(skip_serializing_if = "Option::is_none")]
    template: Option<ResourceId>,
    options: TemplateOptions,
    children: Vec<Builder>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    parameters: Vec<String>,
    #[serde(skip)]
    watcher: Option<ReloadWatcher>,
}

impl RootBuilder {
    pub fn new(children: Vec<Builder>, options: TemplateOptions) -> Self {
        Self {
            template: None,
            options,
            children,
            parameters: Vec::new(),
            watcher: None,
        }
    }

    /// Record the environment parameters the options of this tree read.
    pub fn with_parameters(mut self, parameters: Vec<String>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Attach the watcher over the resources this tree was compiled from.
    pub fn with_watcher(mut self, template: ResourceId, watcher: ReloadWatcher) -> Self {
        self.template = Some(template);
        self.watcher = Some(watcher);
        self
    }

    pub fn children(&self) -> &[Builder] {
        &self.children
    }

    /// First top-level builder written under the static key `key`.
    pub fn child(&self, key: &str) -> Option<&Builder> {
        self.children
            .iter()
            .find(|child| matches!(child.key(), Some(KeySpec::Static(k)) if k == key))
    }

    pub fn options(&self) -> &TemplateOptions {
        &self.options
    }

    /// The root template this tree was compiled from, once attached.
    pub fn template(&self) -> Option<&ResourceId> {
        self.template.as_ref()
    }

    /// Environment parameters this tree depends on, sorted and lowercased.
    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    pub fn watcher(&self) -> Option<&ReloadWatcher> {
        self.watcher.as_ref()
    }

    /// Whether any file this tree was compiled from changed since.
    ///
    /// A tree without a watcher never goes stale.
    pub fn needs_reload(&self) -> bool {
        self.watcher.as_ref().is_some_and(ReloadWatcher::needs_reload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::WatchedResources;
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::sync::Arc;

    fn leaf(key: &str, value: Value) -> Builder {
        Builder::Static(StaticBuilder {
            key: Some(KeySpec::parse(key)),
            value,
            hints: EncodingHints::default(),
        })
    }

    #[test]
    fn test_key_spec_parse() {
        assert_eq!(KeySpec::parse("name"), KeySpec::Static("name".to_string()));
        assert!(KeySpec::parse("${type}_name").is_dynamic());
    }

    #[test]
    fn test_flat_child_key() {
        let flat = FlatBuilder {
            container: ContainerBuilder::new(Some(KeySpec::parse("b"))),
            path: vec![KeySpec::parse("a"), KeySpec::parse("b")],
            separator: ".".to_string(),
        };
        assert_eq!(flat.child_key("c"), Some("a.b.c".to_string()));

        let top = FlatBuilder {
            container: ContainerBuilder::new(Some(KeySpec::parse("properties"))),
            path: vec![],
            separator: "_".to_string(),
        };
        assert_eq!(top.child_key("name"), Some("name".to_string()));

        let dynamic = FlatBuilder {
            container: ContainerBuilder::new(Some(KeySpec::parse("${kind}"))),
            path: vec![KeySpec::parse("${kind}")],
            separator: "_".to_string(),
        };
        assert_eq!(dynamic.child_key("name"), None);
    }

    #[test]
    fn test_children_and_lookup() {
        let mut container = ContainerBuilder::new(Some(KeySpec::parse("properties")));
        container.children.push(leaf("kind", json!("river")));
        let builder = Builder::Composite(container);

        assert_eq!(builder.children().len(), 1);
        assert!(builder.child("kind").is_some());
        assert!(builder.child("missing").is_none());
        assert!(leaf("x", json!(1)).children().is_empty());
    }

    #[test]
    fn test_serialized_shape() {
        let root = RootBuilder::new(vec![leaf("type", json!("Feature"))], TemplateOptions::default());
        let value = serde_json::to_value(&root).unwrap();
        assert_eq!(
            value,
            json!({
                "options": {"flat_output": false, "separator": "_"},
                "children": [{"kind": "static", "key": {"static": "type"}, "value": "Feature"}]
            })
        );

        // The template id of a compiled tree is written as a plain path
        let store = Arc::new(MemoryStore::with_resources([("feature.json", "{}")]));
        let watcher = ReloadWatcher::new(store, WatchedResources::new());
        let root = RootBuilder::new(Vec::new(), TemplateOptions::default())
            .with_watcher(ResourceId::new("features/feature.json"), watcher);
        let value = serde_json::to_value(&root).unwrap();
        assert_eq!(value["template"], json!("features/feature.json"));
        assert!(value.get("watcher").is_none());
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_compiled_trees_can_be_shared_across_threads() {
        assert_send_sync::<RootBuilder>();
        assert_send_sync::<Builder>();
        assert_send_sync::<ReloadWatcher>();
    }

    #[test]
    fn test_root_without_watcher_never_reloads() {
        let root = RootBuilder::new(Vec::new(), TemplateOptions::default());
        assert!(!root.needs_reload());
        assert!(root.template().is_none());
    }
}
