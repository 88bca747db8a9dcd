//! Dynamic values flowing between mapped objects and the XML codecs.
//!
//! Mapped types implement [`XmlObject`] (usually through [`xml_object!`]) and
//! are shared as [`ObjectRef`]s. Field accessors read and write [`Value`]s;
//! leaves are [`Scalar`]s converted by the type codecs, and content captured
//! without a mapping is kept as an opaque [`XmlNode`].

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use oxm_types::Scalar;
use parking_lot::RwLock;

use crate::error::ValueError;
use crate::node::XmlNode;

/// A mapped object instance.
///
/// `class_name` must match the type name the class is registered under in the
/// mapping driver; it is how the encoder finds the metadata for an object.
pub trait XmlObject: Any + Send + Sync + fmt::Debug {
    fn class_name(&self) -> &str;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Bag for content no field mapping covers (passthrough mode).
    fn dynamic_properties(&self) -> Option<&DynamicProperties> {
        None
    }

    fn dynamic_properties_mut(&mut self) -> Option<&mut DynamicProperties> {
        None
    }
}

/// Shared handle to a mapped object. Identity is the allocation.
pub type ObjectRef = Arc<RwLock<dyn XmlObject>>;

/// Wraps an object into a fresh [`ObjectRef`].
pub fn object_ref<T: XmlObject>(object: T) -> ObjectRef {
    Arc::new(RwLock::new(object))
}

/// Stable identity of a shared object for the lifetime of the allocation.
pub fn object_id(object: &ObjectRef) -> usize {
    Arc::as_ptr(object) as *const () as usize
}

/// Implements [`XmlObject`] for a type.
///
/// ```
/// use oxm::xml_object;
///
/// #[derive(Debug, Default, Clone)]
/// struct Section {
///     heading: Option<String>,
/// }
///
/// xml_object!(Section, "Documents\\Section");
/// ```
///
/// Types that keep a [`DynamicProperties`] bag for passthrough content name
/// the field with `dynamic = field`.
#[macro_export]
macro_rules! xml_object {
    ($ty:ty, $class:expr) => {
        impl $crate::XmlObject for $ty {
            fn class_name(&self) -> &str {
                $class
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }

            fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
                self
            }
        }
    };
    ($ty:ty, $class:expr, dynamic = $field:ident) => {
        impl $crate::XmlObject for $ty {
            fn class_name(&self) -> &str {
                $class
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }

            fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
                self
            }

            fn dynamic_properties(&self) -> Option<&$crate::DynamicProperties> {
                Some(&self.$field)
            }

            fn dynamic_properties_mut(&mut self) -> Option<&mut $crate::DynamicProperties> {
                Some(&mut self.$field)
            }
        }
    };
}

/// Ordered name → values bag for properties no field mapping declares.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DynamicProperties {
    entries: IndexMap<String, Vec<Value>>,
}

impl DynamicProperties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a value under `name`, keeping first-seen name order.
    pub fn push(&mut self, name: impl Into<String>, value: Value) {
        self.entries.entry(name.into()).or_default().push(value);
    }

    pub fn get(&self, name: &str) -> Option<&[Value]> {
        self.entries.get(name).map(Vec::as_slice)
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<Value>> {
        self.entries.shift_remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Value])> {
        self.entries
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A field value as seen by the codecs.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Scalar(Scalar),
    Object(ObjectRef),
    List(Vec<Value>),
    Node(XmlNode),
}

impl Value {
    /// Wraps a mapped object.
    pub fn object<T: XmlObject>(object: T) -> Self {
        Value::Object(object_ref(object))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Scalar(s) => s.kind(),
            Value::Object(_) => "object",
            Value::List(_) => "list",
            Value::Node(_) => "node",
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Value::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_scalar().and_then(Scalar::as_str)
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&XmlNode> {
        match self {
            Value::Node(n) => Some(n),
            _ => None,
        }
    }

    /// Items of a list, a single non-null value as one item, nothing for null.
    pub fn into_items(self) -> Vec<Value> {
        match self {
            Value::Null => Vec::new(),
            Value::List(items) => items,
            other => vec![other],
        }
    }

    /// Converts into a concrete Rust type.
    pub fn extract<T: FromValue>(self) -> Result<T, ValueError> {
        T::from_value(self)
    }

    /// Runs `f` against the object if this value holds a `T`.
    pub fn with_object<T: XmlObject, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let object = self.as_object()?;
        let guard = object.read();
        guard.as_any().downcast_ref::<T>().map(f)
    }

    /// Clones the `T` held by an object value out of its lock.
    pub fn downcast_clone<T: XmlObject + Clone>(&self) -> Result<T, ValueError> {
        self.with_object(|object: &T| object.clone())
            .ok_or(ValueError {
                expected: std::any::type_name::<T>(),
                found: self.kind(),
            })
    }

    /// Clones every `T` out of a list of object values.
    pub fn into_cloned_list<T: XmlObject + Clone>(self) -> Result<Vec<T>, ValueError> {
        self.into_items()
            .iter()
            .map(Value::downcast_clone::<T>)
            .collect()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Scalar(a), Value::Scalar(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Node(a), Value::Node(b)) => a == b,
            _ => false,
        }
    }
}

impl From<Scalar> for Value {
    fn from(s: Scalar) -> Self {
        Value::Scalar(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Scalar(Scalar::String(s))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Scalar(Scalar::String(s.to_string()))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Scalar(Scalar::Integer(i))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Scalar(Scalar::Float(v))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Scalar(Scalar::Boolean(b))
    }
}

impl From<ObjectRef> for Value {
    fn from(o: ObjectRef) -> Self {
        Value::Object(o)
    }
}

impl From<XmlNode> for Value {
    fn from(n: XmlNode) -> Self {
        Value::Node(n)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

/// Extraction of Rust values from a [`Value`], used by field setters.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, ValueError>;
}

fn mismatch(expected: &'static str, value: &Value) -> ValueError {
    ValueError {
        expected,
        found: value.kind(),
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        Ok(value)
    }
}

impl FromValue for Scalar {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Scalar(s) => Ok(s),
            other => Err(mismatch("scalar", &other)),
        }
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Scalar(Scalar::String(s)) => Ok(s),
            Value::Scalar(other) => Ok(other.to_string()),
            other => Err(mismatch("string", &other)),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Scalar(Scalar::Integer(i)) => Ok(i),
            other => Err(mismatch("integer", &other)),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Scalar(Scalar::Float(v)) => Ok(v),
            Value::Scalar(Scalar::Integer(i)) => Ok(i as f64),
            other => Err(mismatch("float", &other)),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Scalar(Scalar::Boolean(b)) => Ok(b),
            other => Err(mismatch("boolean", &other)),
        }
    }
}

impl FromValue for ObjectRef {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Object(o) => Ok(o),
            other => Err(mismatch("object", &other)),
        }
    }
}

impl FromValue for XmlNode {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Node(n) => Ok(n),
            other => Err(mismatch("node", &other)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        value.into_items().into_iter().map(T::from_value).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Note {
        body: String,
        extra: DynamicProperties,
    }

    crate::xml_object!(Note, "Note", dynamic = extra);

    #[test]
    fn test_extract_scalars_and_options() {
        let v: Option<String> = Value::from("hello").extract().unwrap();
        assert_eq!(v.as_deref(), Some("hello"));

        let none: Option<i64> = Value::Null.extract().unwrap();
        assert_eq!(none, None);

        let err = Value::from(true).extract::<i64>().unwrap_err();
        assert_eq!(err.expected, "integer");
        assert_eq!(err.found, "boolean");
    }

    #[test]
    fn test_vec_extraction_accepts_single_value() {
        let items: Vec<String> = Value::from("one").extract().unwrap();
        assert_eq!(items, vec!["one".to_string()]);

        let items: Vec<i64> = Value::from(vec![1i64, 2, 3]).extract().unwrap();
        assert_eq!(items, vec![1, 2, 3]);
    }

    #[test]
    fn test_object_identity_and_downcast() {
        let note = object_ref(Note {
            body: "hi".to_string(),
            ..Default::default()
        });
        let a = Value::Object(note.clone());
        let b = Value::Object(note.clone());
        assert_eq!(a, b);
        assert_eq!(object_id(&note), object_id(&note.clone()));

        let other = Value::object(Note::default());
        assert_ne!(a, other);

        let cloned: Note = a.downcast_clone().unwrap();
        assert_eq!(cloned.body, "hi");
        assert_eq!(a.with_object(|n: &Note| n.body.len()), Some(2));
    }

    #[test]
    fn test_dynamic_properties_keep_order() {
        let mut note = Note::default();
        let bag = note.dynamic_properties_mut().unwrap();
        bag.push("b", Value::from("1"));
        bag.push("a", Value::from("2"));
        bag.push("b", Value::from("3"));

        let names: Vec<&str> = note.extra.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(note.extra.get("b").unwrap().len(), 2);
    }
}
