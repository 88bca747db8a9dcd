//! Conversion errors raised by scalar type codecs.

use thiserror::Error;

/// Errors produced while converting between wire text and stored scalars.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
    /// No codec is registered under the requested type id.
    #[error("unknown type codec: {type_name}")]
    UnknownType { type_name: String },

    /// The wire text could not be parsed by the codec.
    #[error("cannot convert '{raw}' to {type_name}: {message}")]
    InvalidWireValue {
        type_name: String,
        raw: String,
        message: String,
    },

    /// The codec was handed a scalar of a kind it does not write.
    #[error("{type_name} codec cannot write a {found} value")]
    UnexpectedScalar {
        type_name: String,
        found: &'static str,
    },
}

impl ConversionError {
    pub(crate) fn invalid(type_name: &str, raw: &str, message: impl ToString) -> Self {
        ConversionError::InvalidWireValue {
            type_name: type_name.to_string(),
            raw: raw.to_string(),
            message: message.to_string(),
        }
    }

    pub(crate) fn unexpected(type_name: &str, found: &'static str) -> Self {
        ConversionError::UnexpectedScalar {
            type_name: type_name.to_string(),
            found,
        }
    }
}
