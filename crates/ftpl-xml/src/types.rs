//! Core types for span-tracked XML trees.

/// Byte range in the source a node was parsed from.
///
/// Nodes synthesized or spliced in from another document keep the span of
/// the file they were parsed from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// A parsed XML document.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    /// The root element of the document.
    pub root: XmlElement,

    /// Span of the entire document.
    pub span: Span,
}

/// An XML element.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlElement {
    /// The local name of the element (without namespace prefix).
    pub name: String,

    /// Namespace prefix, if any (e.g., "gml" in `<gml:name>`).
    pub prefix: Option<String>,

    /// Attributes of this element, in document order.
    pub attributes: Vec<XmlAttribute>,

    /// Child content of this element.
    pub children: XmlChildren,

    /// Span of the entire element, from the start tag to the end tag.
    pub span: Span,
}

/// An XML attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlAttribute {
    /// The local name of the attribute (without namespace prefix).
    pub name: String,

    /// Namespace prefix, if any.
    pub prefix: Option<String>,

    /// The attribute value (after unescaping XML entities).
    pub value: String,
}

/// Children of an XML element.
#[derive(Debug, Clone, PartialEq)]
pub enum XmlChildren {
    /// Element contains only child elements.
    Elements(Vec<XmlElement>),

    /// Element contains only text content.
    Text { content: String, span: Span },

    /// Element contains mixed content (text and elements).
    Mixed(Vec<XmlChild>),

    /// Element is empty (no content).
    Empty,
}

/// A single child in mixed content.
#[derive(Debug, Clone, PartialEq)]
pub enum XmlChild {
    Element(XmlElement),
    Text { content: String, span: Span },
}

impl XmlDocument {
    pub fn new(root: XmlElement, span: Span) -> Self {
        Self { root, span }
    }
}

impl XmlChildren {
    /// Build the most specific content representation for a list of children.
    ///
    /// Whitespace-only text is dropped as soon as the list holds at least one
    /// element, so indentation never turns element content into mixed content.
    pub fn from_nodes(children: Vec<XmlChild>) -> Self {
        let has_elements = children.iter().any(|c| matches!(c, XmlChild::Element(_)));
        let children: Vec<XmlChild> = if has_elements {
            children
                .into_iter()
                .filter(|c| match c {
                    XmlChild::Text { content, .. } => !content.trim().is_empty(),
                    XmlChild::Element(_) => true,
                })
                .collect()
        } else {
            children
        };

        if children.is_empty() {
            return XmlChildren::Empty;
        }

        if children.iter().all(|c| matches!(c, XmlChild::Element(_))) {
            let elements = children
                .into_iter()
                .filter_map(|c| match c {
                    XmlChild::Element(e) => Some(e),
                    XmlChild::Text { .. } => None,
                })
                .collect();
            return XmlChildren::Elements(elements);
        }

        if children.len() == 1 {
            if let Some(XmlChild::Text { content, span }) = children.into_iter().next() {
                return XmlChildren::Text { content, span };
            }
            unreachable!("single non-element child must be text");
        }

        XmlChildren::Mixed(children)
    }

    /// Flatten this content back into a list of children.
    pub fn into_nodes(self) -> Vec<XmlChild> {
        match self {
            XmlChildren::Elements(elements) => elements.into_iter().map(XmlChild::Element).collect(),
            XmlChildren::Text { content, span } => vec![XmlChild::Text { content, span }],
            XmlChildren::Mixed(children) => children,
            XmlChildren::Empty => Vec::new(),
        }
    }
}

impl XmlElement {
    /// Create a new empty element.
    pub fn new(name: impl Into<String>, prefix: Option<String>) -> Self {
        Self {
            name: name.into(),
            prefix,
            attributes: Vec::new(),
            children: XmlChildren::Empty,
            span: Span::default(),
        }
    }

    /// The name as written in the source, `prefix:local` or `local`.
    pub fn qualified_name(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, self.name),
            None => self.name.clone(),
        }
    }

    /// Get an attribute value by local name.
    pub fn get_attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Get an attribute value by prefix and local name.
    pub fn get_prefixed_attribute(&self, prefix: &str, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name && a.prefix.as_deref() == Some(prefix))
            .map(|a| a.value.as_str())
    }

    /// Namespace declarations made on this element.
    ///
    /// The default namespace (`xmlns="..."`) is reported with a `None` prefix.
    pub fn namespace_declarations(&self) -> Vec<(Option<&str>, &str)> {
        self.attributes
            .iter()
            .filter_map(|a| match a.prefix.as_deref() {
                Some("xmlns") => Some((Some(a.name.as_str()), a.value.as_str())),
                None if a.name == "xmlns" => Some((None, a.value.as_str())),
                _ => None,
            })
            .collect()
    }

    /// Check if this element has child elements.
    pub fn has_elements(&self) -> bool {
        match &self.children {
            XmlChildren::Elements(e) => !e.is_empty(),
            XmlChildren::Mixed(children) => {
                children.iter().any(|c| matches!(c, XmlChild::Element(_)))
            }
            _ => false,
        }
    }

    /// Check if this element has text content only.
    pub fn has_text(&self) -> bool {
        matches!(&self.children, XmlChildren::Text { .. })
    }

    /// Check if this element is empty.
    pub fn is_empty(&self) -> bool {
        matches!(&self.children, XmlChildren::Empty)
    }

    /// Get text content, if this element contains only text.
    pub fn text(&self) -> Option<&str> {
        match &self.children {
            XmlChildren::Text { content, .. } => Some(content),
            _ => None,
        }
    }

    /// Get child elements by local name.
    pub fn get_children(&self, name: &str) -> Vec<&XmlElement> {
        self.child_elements()
            .into_iter()
            .filter(|e| e.name == name)
            .collect()
    }

    /// Get all child elements (ignoring text in mixed content).
    pub fn child_elements(&self) -> Vec<&XmlElement> {
        match &self.children {
            XmlChildren::Elements(elements) => elements.iter().collect(),
            XmlChildren::Mixed(children) => children
                .iter()
                .filter_map(|c| match c {
                    XmlChild::Element(e) => Some(e),
                    XmlChild::Text { .. } => None,
                })
                .collect(),
            _ => vec![],
        }
    }

    /// Replace this element's content with the given children.
    pub fn set_children(&mut self, children: Vec<XmlChild>) {
        self.children = XmlChildren::from_nodes(children);
    }

    /// Take this element's content out as a list, leaving it empty.
    pub fn take_children(&mut self) -> Vec<XmlChild> {
        std::mem::replace(&mut self.children, XmlChildren::Empty).into_nodes()
    }
}

impl XmlAttribute {
    pub fn new(name: impl Into<String>, prefix: Option<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix,
            value: value.into(),
        }
    }

    /// The name as written in the source, `prefix:local` or `local`.
    pub fn qualified_name(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, self.name),
            None => self.name.clone(),
        }
    }

    /// Whether this attribute declares a namespace rather than carrying data.
    pub fn is_namespace_declaration(&self) -> bool {
        self.prefix.as_deref() == Some("xmlns") || (self.prefix.is_none() && self.name == "xmlns")
    }
}
