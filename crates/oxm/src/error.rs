//! Error types for metadata loading, decoding and encoding.
//!
//! Errors are grouped by concern and aggregated into [`OxmError`]. Ambiguous
//! polymorphic dispatch is deliberately absent: it is reported as a
//! [`Diagnostic`](crate::xml::Diagnostic) and never fails a call.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

pub use oxm_types::ConversionError;

/// The primary error type for all OXM operations.
#[derive(Error, Debug)]
pub enum OxmError {
    /// Unmapped types or elements, invalid field declarations, driver failures
    #[error(transparent)]
    Mapping(#[from] MappingError),

    /// Missing values for required fields
    #[error(transparent)]
    Field(#[from] FieldError),

    /// Cursor positioned on an unexpected token
    #[error(transparent)]
    Structural(#[from] StructuralError),

    /// Scalar conversion failures, passed through from the codec
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// Invalid marshaller or id generator configuration
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// XML reader or writer error
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// IO error on the underlying stream
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Cache entry could not be (de)serialized
    #[error("cache error: {0}")]
    Cache(#[from] serde_json::Error),
}

/// Errors in the class mapping or in resolving a class for XML content.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MappingError {
    #[error("no mapped class for element <{element}>")]
    NotMapped { element: String },

    #[error("no mapping found for class {class}")]
    MappingNotFoundForClass { class: String },

    #[error("class {class} is not known to the mapping driver")]
    UnknownClass { class: String },

    #[error("field {class}::{field} has type {type_name}, which is neither a scalar type nor a mapped class")]
    FieldTypeNotFound {
        class: String,
        field: String,
        type_name: String,
    },

    #[error("field {class}::{field} maps a class type and must be bound as an element")]
    CustomTypeWithoutElementNode { class: String, field: String },

    #[error("field {class}::{field} is mapped more than once")]
    DuplicateFieldMapping { class: String, field: String },

    #[error("field {class}::{field} is not mapped")]
    UnknownField { class: String, field: String },

    #[error("class {class} cannot be instantiated")]
    NotInstantiable { class: String },

    #[error("invalid value for {class}::{field}: {message}")]
    InvalidFieldValue {
        class: String,
        field: String,
        message: String,
    },

    #[error("reflection failure for class {class}: {message}")]
    ReflectionFailure { class: String, message: String },
}

/// Field-level constraint violations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FieldError {
    #[error("field {class}::{field} is required")]
    Required { class: String, field: String },
}

/// The token cursor is not where the codec expects it to be.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StructuralError {
    #[error("invalid marshaller state: expected {expected}, found {found}")]
    InvalidState {
        expected: &'static str,
        found: String,
    },

    #[error("unexpected end of document {context}")]
    UnexpectedEof { context: String },

    #[error("malformed XML: {message}")]
    Malformed { message: String },
}

impl StructuralError {
    pub(crate) fn malformed(err: impl std::fmt::Display) -> Self {
        StructuralError::Malformed {
            message: err.to_string(),
        }
    }
}

/// Invalid configuration, fatal at setup time.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("{kind} id generator is not supported")]
    UnsupportedIdGenerator { kind: String },

    #[error("unsupported output encoding {encoding}; only UTF-8 is written")]
    UnsupportedEncoding { encoding: String },

    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

/// A [`Value`](crate::Value) did not hold the shape a field accessor expected.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("expected {expected}, found {found}")]
pub struct ValueError {
    pub expected: &'static str,
    pub found: &'static str,
}

/// Result type alias for OXM operations
pub type Result<T> = std::result::Result<T, OxmError>;
