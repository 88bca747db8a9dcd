//! Attribute signatures used to pick a subclass for an element.
//!
//! A subclass declares a [`Discriminator`]; when several classes could decode
//! an element, the first candidate whose rules all hold for the element's
//! attributes wins.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

/// Key under which the element local name is added to an [`AttributeSet`].
pub const ELEMENT_NAME_KEY: &str = "-name";

/// Attributes of the element being dispatched, plus [`ELEMENT_NAME_KEY`].
pub type AttributeSet = IndexMap<String, String>;

pub type DiscriminatorFn = Arc<dyn Fn(&AttributeSet, &str) -> bool + Send + Sync>;

#[derive(Clone)]
pub enum DiscriminatorRule {
    AttributeEquals { name: String, value: String },
    AttributePresent(String),
    ElementName(String),
    Namespace(String),
    /// Arbitrary predicate over the attributes and the element namespace.
    Custom(DiscriminatorFn),
}

impl DiscriminatorRule {
    fn matches(&self, attributes: &AttributeSet, namespace: &str) -> bool {
        match self {
            DiscriminatorRule::AttributeEquals { name, value } => {
                attributes.get(name).is_some_and(|v| v == value)
            }
            DiscriminatorRule::AttributePresent(name) => attributes.contains_key(name),
            DiscriminatorRule::ElementName(name) => attributes
                .get(ELEMENT_NAME_KEY)
                .is_some_and(|v| v == name),
            DiscriminatorRule::Namespace(ns) => ns == namespace,
            DiscriminatorRule::Custom(f) => f(attributes, namespace),
        }
    }
}

impl fmt::Debug for DiscriminatorRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscriminatorRule::AttributeEquals { name, value } => f
                .debug_struct("AttributeEquals")
                .field("name", name)
                .field("value", value)
                .finish(),
            DiscriminatorRule::AttributePresent(name) => {
                f.debug_tuple("AttributePresent").field(name).finish()
            }
            DiscriminatorRule::ElementName(name) => {
                f.debug_tuple("ElementName").field(name).finish()
            }
            DiscriminatorRule::Namespace(ns) => f.debug_tuple("Namespace").field(ns).finish(),
            DiscriminatorRule::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Conjunction of rules; an empty discriminator never matches.
#[derive(Debug, Clone, Default)]
pub struct Discriminator {
    rules: Vec<DiscriminatorRule>,
}

impl Discriminator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attribute_equals(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.rules.push(DiscriminatorRule::AttributeEquals {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn attribute_present(mut self, name: impl Into<String>) -> Self {
        self.rules
            .push(DiscriminatorRule::AttributePresent(name.into()));
        self
    }

    pub fn element_name(mut self, name: impl Into<String>) -> Self {
        self.rules.push(DiscriminatorRule::ElementName(name.into()));
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.rules.push(DiscriminatorRule::Namespace(namespace.into()));
        self
    }

    pub fn custom<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&AttributeSet, &str) -> bool + Send + Sync + 'static,
    {
        self.rules.push(DiscriminatorRule::Custom(Arc::new(predicate)));
        self
    }

    pub fn rules(&self) -> &[DiscriminatorRule] {
        &self.rules
    }

    pub fn matches(&self, attributes: &AttributeSet, namespace: &str) -> bool {
        !self.rules.is_empty() && self.rules.iter().all(|r| r.matches(attributes, namespace))
    }
}
