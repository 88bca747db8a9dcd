//! Opaque XML content kept when no field mapping covers it.

use std::sync::Arc;

use crate::value::ObjectRef;

/// An element captured verbatim in passthrough mode.
///
/// Nested elements that do map to a class are decoded and kept as
/// [`NodeContent::Object`], so a captured subtree can still carry typed
/// objects.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlNode {
    /// Qualified name as read (`prefix:local` or `local`).
    pub name: String,
    pub namespace: Option<String>,
    /// Attributes in document order, including namespace declarations.
    pub attributes: Vec<(String, String)>,
    pub children: Vec<NodeContent>,
}

#[derive(Debug, Clone)]
pub enum NodeContent {
    Text(String),
    Node(XmlNode),
    Object(ObjectRef),
}

impl PartialEq for NodeContent {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (NodeContent::Text(a), NodeContent::Text(b)) => a == b,
            (NodeContent::Node(a), NodeContent::Node(b)) => a == b,
            (NodeContent::Object(a), NodeContent::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl XmlNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(NodeContent::Text(text.into()));
        self
    }

    pub fn with_child(mut self, child: XmlNode) -> Self {
        self.children.push(NodeContent::Node(child));
        self
    }

    pub fn push(&mut self, content: NodeContent) {
        self.children.push(content);
    }

    /// Name without its prefix.
    pub fn local_name(&self) -> &str {
        self.name
            .rsplit_once(':')
            .map(|(_, local)| local)
            .unwrap_or(&self.name)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Concatenated direct text children.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|c| match c {
                NodeContent::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Direct element children.
    pub fn elements(&self) -> impl Iterator<Item = &XmlNode> {
        self.children.iter().filter_map(|c| match c {
            NodeContent::Node(n) => Some(n),
            _ => None,
        })
    }

    /// Direct typed object children.
    pub fn objects(&self) -> impl Iterator<Item = &ObjectRef> {
        self.children.iter().filter_map(|c| match c {
            NodeContent::Object(o) => Some(o),
            _ => None,
        })
    }
}
