use serde::{Deserialize, Serialize};

use crate::xml::utils::xmlize;

/// Name matching any element not claimed by another field.
pub const WILDCARD: &str = "*";

/// How a field is bound to XML.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// `<owner name="...">`
    Attribute,
    /// A child element holding a mapped object (or a scalar).
    #[default]
    Element,
    /// A child element holding scalar text: `<name>text</name>`.
    Text,
    /// The text content of the owning element itself.
    Value,
}

/// Binding of one class property to an attribute, element or text node.
///
/// Built with consuming setters and never changed once the owning class
/// metadata is loaded:
///
/// ```
/// use oxm::mapping::{FieldMapping, NodeKind};
///
/// let sections = FieldMapping::new("sections", "Documents\\Section")
///     .xml_name("section")
///     .collection()
///     .wrapper("sections");
/// assert_eq!(sections.node, NodeKind::Element);
/// assert_eq!(sections.wrapper.as_deref(), Some("sections"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub field_name: String,
    pub xml_name: String,
    pub node: NodeKind,
    /// Scalar type id or mapped class name.
    pub type_name: String,
    pub collection: bool,
    pub wrapper: Option<String>,
    pub required: bool,
    pub nullable: bool,
    pub prefix: Option<String>,
    /// Class that originally declared the field.
    pub declared_in: Option<String>,
    /// Concrete parent the field was copied from, `None` for own fields and
    /// fields coming from a mapped superclass.
    pub inherited_from: Option<String>,
    /// Name the element after the field rather than the value's class.
    pub force_name: bool,
    pub identifier: bool,
}

impl FieldMapping {
    /// Element binding named after the inflected field name.
    pub fn new(field_name: impl Into<String>, type_name: impl Into<String>) -> Self {
        let field_name = field_name.into();
        Self {
            xml_name: xmlize(&field_name),
            field_name,
            node: NodeKind::Element,
            type_name: type_name.into(),
            collection: false,
            wrapper: None,
            required: false,
            nullable: false,
            prefix: None,
            declared_in: None,
            inherited_from: None,
            force_name: false,
            identifier: false,
        }
    }

    pub fn xml_name(mut self, xml_name: impl Into<String>) -> Self {
        self.xml_name = xml_name.into();
        self
    }

    pub fn node(mut self, node: NodeKind) -> Self {
        self.node = node;
        self
    }

    pub fn attribute(self) -> Self {
        self.node(NodeKind::Attribute)
    }

    pub fn text(self) -> Self {
        self.node(NodeKind::Text)
    }

    pub fn value(self) -> Self {
        self.node(NodeKind::Value)
    }

    pub fn collection(mut self) -> Self {
        self.collection = true;
        self
    }

    pub fn wrapper(mut self, wrapper: impl Into<String>) -> Self {
        self.wrapper = Some(wrapper.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn force_name(mut self) -> Self {
        self.force_name = true;
        self
    }

    /// Marks the field as the class identifier.
    pub fn identifier(mut self) -> Self {
        self.identifier = true;
        self
    }

    pub fn is_wildcard(&self) -> bool {
        self.xml_name == WILDCARD
    }

    /// Name written to the document, with the field prefix if any.
    pub fn qualified_name(&self) -> String {
        match &self.prefix {
            Some(prefix) if !prefix.is_empty() => format!("{}:{}", prefix, self.xml_name),
            _ => self.xml_name.clone(),
        }
    }

    /// Field bound to a child element, either scalar text or an object.
    pub fn is_child(&self) -> bool {
        matches!(self.node, NodeKind::Element | NodeKind::Text)
    }
}
