//! # OXM scalar type codecs
//!
//! Leaf values of a mapped object graph (strings, numbers, dates, ...) are
//! converted to and from their XML text form by a [`TypeCodec`] looked up by
//! type id in a [`TypeRegistry`]. Field mappings name the type id; everything
//! that is not a registered codec is treated as a mapped class by the OXM
//! metadata registry.
//!
//! | Type id    | Scalar                | Wire form                   |
//! |------------|-----------------------|-----------------------------|
//! | `string`   | `Scalar::String`      | verbatim                    |
//! | `integer`  | `Scalar::Integer`     | `42`                        |
//! | `float`    | `Scalar::Float`       | `1.5`                       |
//! | `boolean`  | `Scalar::Boolean`     | `true` / `false` (`1`/`0` accepted) |
//! | `decimal`  | `Scalar::Decimal`     | `123.45` (precision kept)   |
//! | `date`     | `Scalar::Date`        | `2024-01-31`                |
//! | `datetime` | `Scalar::DateTime`    | RFC 3339                    |
//!
//! ```
//! use oxm_types::{Scalar, TypeRegistry};
//!
//! let types = TypeRegistry::with_defaults();
//! let codec = types.get("integer").unwrap();
//! assert_eq!(codec.convert_to_stored_value(" 42 ").unwrap(), Scalar::Integer(42));
//! assert_eq!(codec.convert_to_wire_value(&Scalar::Integer(7)).unwrap(), "7");
//! ```

pub mod codecs;
pub mod error;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate};
use rust_decimal::Decimal;

pub use error::ConversionError;

/// A converted leaf value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Decimal(Decimal),
    Date(NaiveDate),
    DateTime(DateTime<FixedOffset>),
}

impl Scalar {
    /// Short name of the scalar kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Scalar::String(_) => "string",
            Scalar::Integer(_) => "integer",
            Scalar::Float(_) => "float",
            Scalar::Boolean(_) => "boolean",
            Scalar::Decimal(_) => "decimal",
            Scalar::Date(_) => "date",
            Scalar::DateTime(_) => "datetime",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::String(s) => f.write_str(s),
            Scalar::Integer(i) => write!(f, "{}", i),
            Scalar::Float(v) => write!(f, "{}", v),
            Scalar::Boolean(b) => f.write_str(if *b { "true" } else { "false" }),
            Scalar::Decimal(d) => write!(f, "{}", d),
            Scalar::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Scalar::DateTime(dt) => f.write_str(&dt.to_rfc3339()),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::String(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::String(s)
    }
}

impl From<i64> for Scalar {
    fn from(i: i64) -> Self {
        Scalar::Integer(i)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Float(v)
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Boolean(b)
    }
}

impl From<Decimal> for Scalar {
    fn from(d: Decimal) -> Self {
        Scalar::Decimal(d)
    }
}

impl From<NaiveDate> for Scalar {
    fn from(d: NaiveDate) -> Self {
        Scalar::Date(d)
    }
}

impl From<DateTime<FixedOffset>> for Scalar {
    fn from(dt: DateTime<FixedOffset>) -> Self {
        Scalar::DateTime(dt)
    }
}

/// Converts one scalar type between its stored and wire representations.
pub trait TypeCodec: Send + Sync {
    /// Type id the codec is registered under.
    fn name(&self) -> &str;

    /// Parses wire text into a stored scalar.
    fn convert_to_stored_value(&self, raw: &str) -> Result<Scalar, ConversionError>;

    /// Renders a stored scalar as wire text.
    fn convert_to_wire_value(&self, value: &Scalar) -> Result<String, ConversionError>;
}

/// Registry of scalar codecs keyed by type id.
#[derive(Clone, Default)]
pub struct TypeRegistry {
    codecs: HashMap<String, Arc<dyn TypeCodec>>,
}

impl TypeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in codecs and their aliases.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(codecs::StringCodec);
        registry.register(codecs::IntegerCodec);
        registry.register(codecs::FloatCodec);
        registry.register(codecs::BooleanCodec);
        registry.register(codecs::DecimalCodec);
        registry.register(codecs::DateCodec);
        registry.register(codecs::DateTimeCodec);
        registry.alias("int", "integer");
        registry.alias("bool", "boolean");
        registry.alias("double", "float");
        registry
    }

    /// Registers a codec under its own name, replacing any previous entry.
    pub fn register<C: TypeCodec + 'static>(&mut self, codec: C) {
        self.codecs
            .insert(codec.name().to_string(), Arc::new(codec));
    }

    /// Makes `alias` resolve to the codec registered as `target`.
    ///
    /// Does nothing when `target` is unknown.
    pub fn alias(&mut self, alias: &str, target: &str) {
        if let Some(codec) = self.codecs.get(target).cloned() {
            self.codecs.insert(alias.to_string(), codec);
        }
    }

    pub fn has_type(&self, type_name: &str) -> bool {
        self.codecs.contains_key(type_name)
    }

    /// Looks up the codec for a type id.
    pub fn get(&self, type_name: &str) -> Result<Arc<dyn TypeCodec>, ConversionError> {
        self.codecs
            .get(type_name)
            .cloned()
            .ok_or_else(|| ConversionError::UnknownType {
                type_name: type_name.to_string(),
            })
    }

    /// Registered type ids, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.codecs.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_has_builtin_types() {
        let types = TypeRegistry::with_defaults();
        for name in ["string", "integer", "float", "boolean", "decimal", "date", "datetime"] {
            assert!(types.has_type(name), "missing {}", name);
        }
        assert!(types.has_type("int"));
        assert!(!types.has_type("Documents\\Article"));
    }

    #[test]
    fn test_unknown_type_lookup_fails() {
        let types = TypeRegistry::with_defaults();
        let err = types.get("geometry").err().unwrap();
        assert_eq!(
            err,
            ConversionError::UnknownType {
                type_name: "geometry".to_string()
            }
        );
    }

    #[test]
    fn test_alias_resolves_to_same_codec() {
        let types = TypeRegistry::with_defaults();
        let codec = types.get("bool").unwrap();
        assert_eq!(codec.name(), "boolean");
    }

    #[test]
    fn test_scalar_display() {
        assert_eq!(Scalar::Boolean(true).to_string(), "true");
        assert_eq!(Scalar::Integer(-3).to_string(), "-3");
        assert_eq!(Scalar::from("x").to_string(), "x");
    }
}
