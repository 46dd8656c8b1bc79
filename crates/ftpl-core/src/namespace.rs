/*
 * namespace.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Scoped namespace prefix bindings for XML templates.

use ftpl_xml::XmlElement;

/// Namespace of the template directives and options (`gft:*`).
pub const TEMPLATE_NAMESPACE: &str = "http://www.geoserver.org/features-templating";

/// Conventional prefix of [`TEMPLATE_NAMESPACE`].
pub const TEMPLATE_PREFIX: &str = "gft";

/// Namespace permanently bound to the `xml` prefix.
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Prefix → namespace URI bindings, organized in nested scopes.
///
/// Callers seed the outermost scope with the namespaces the output format
/// knows about (feature type namespaces, GML, ...); each element of a
/// template pushes a scope for its own `xmlns` declarations.
#[derive(Debug, Clone, PartialEq)]
pub struct NamespaceSupport {
    scopes: Vec<Vec<(Option<String>, String)>>,
}

impl Default for NamespaceSupport {
    fn default() -> Self {
        Self::new()
    }
}

impl NamespaceSupport {
    /// A context where only the `xml` prefix is bound.
    pub fn new() -> Self {
        Self {
            scopes: vec![vec![(Some("xml".to_string()), XML_NAMESPACE.to_string())]],
        }
    }

    /// A context that additionally binds `gft` to the template namespace.
    pub fn with_template_prefix() -> Self {
        let mut support = Self::new();
        support.declare(Some(TEMPLATE_PREFIX), TEMPLATE_NAMESPACE);
        support
    }

    /// Bind a prefix (`None` for the default namespace) in the current scope.
    pub fn declare(&mut self, prefix: Option<&str>, uri: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.retain(|(p, _)| p.as_deref() != prefix);
            scope.push((prefix.map(str::to_string), uri.to_string()));
        }
    }

    /// Open a nested scope.
    pub fn push_context(&mut self) {
        self.scopes.push(Vec::new());
    }

    /// Close the innermost scope. The root scope is never removed.
    pub fn pop_context(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Open a scope holding the `xmlns` declarations of `element`.
    pub fn enter_element(&mut self, element: &XmlElement) {
        self.push_context();
        for (prefix, uri) in element.namespace_declarations() {
            self.declare(prefix, uri);
        }
    }

    /// Resolve a prefix (`None` for the default namespace).
    pub fn uri(&self, prefix: Option<&str>) -> Option<&str> {
        self.scopes
            .iter()
            .rev()
            .flat_map(|scope| scope.iter().rev())
            .find(|(p, _)| p.as_deref() == prefix)
            .map(|(_, uri)| uri.as_str())
    }

    /// Whether `element` is the template directive/option element `local_name`.
    ///
    /// An undeclared `gft` prefix is taken to mean the template namespace, so
    /// fragments meant for inclusion need not repeat the declaration.
    pub fn is_template_element(&self, element: &XmlElement, local_name: &str) -> bool {
        element.name == local_name && self.is_template_prefix(element.prefix.as_deref())
    }

    /// Whether a prefix denotes the template namespace in this scope.
    pub fn is_template_prefix(&self, prefix: Option<&str>) -> bool {
        match self.uri(prefix) {
            Some(uri) => uri == TEMPLATE_NAMESPACE,
            None => prefix == Some(TEMPLATE_PREFIX),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoped_resolution() {
        let mut ns = NamespaceSupport::new();
        ns.declare(Some("gml"), "http://www.opengis.net/gml/3.2");
        assert_eq!(ns.uri(Some("xml")), Some(XML_NAMESPACE));

        ns.push_context();
        ns.declare(Some("gml"), "http://www.opengis.net/gml");
        ns.declare(None, "http://example.com/default");
        assert_eq!(ns.uri(Some("gml")), Some("http://www.opengis.net/gml"));
        assert_eq!(ns.uri(None), Some("http://example.com/default"));

        ns.pop_context();
        assert_eq!(ns.uri(Some("gml")), Some("http://www.opengis.net/gml/3.2"));
        assert_eq!(ns.uri(None), None);

        ns.pop_context();
        assert_eq!(ns.uri(Some("xml")), Some(XML_NAMESPACE));
    }

    #[test]
    fn test_template_prefix_detection() {
        let mut ns = NamespaceSupport::new();
        let element = XmlElement::new("include", Some("gft".to_string()));
        assert!(ns.is_template_element(&element, "include"));

        // A document may bind gft to something else entirely
        ns.declare(Some("gft"), "urn:not-templates");
        assert!(!ns.is_template_element(&element, "include"));

        ns.declare(Some("t"), TEMPLATE_NAMESPACE);
        let element = XmlElement::new("include", Some("t".to_string()));
        assert!(ns.is_template_element(&element, "include"));
    }
}
