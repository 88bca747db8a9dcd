//! Built-in scalar codecs.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate};
use rust_decimal::Decimal;

use crate::{ConversionError, Scalar, TypeCodec};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Verbatim text. Any scalar is accepted on the way out.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringCodec;

impl TypeCodec for StringCodec {
    fn name(&self) -> &str {
        "string"
    }

    fn convert_to_stored_value(&self, raw: &str) -> Result<Scalar, ConversionError> {
        Ok(Scalar::String(raw.to_string()))
    }

    fn convert_to_wire_value(&self, value: &Scalar) -> Result<String, ConversionError> {
        Ok(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IntegerCodec;

impl TypeCodec for IntegerCodec {
    fn name(&self) -> &str {
        "integer"
    }

    fn convert_to_stored_value(&self, raw: &str) -> Result<Scalar, ConversionError> {
        raw.trim()
            .parse::<i64>()
            .map(Scalar::Integer)
            .map_err(|e| ConversionError::invalid(self.name(), raw, e))
    }

    fn convert_to_wire_value(&self, value: &Scalar) -> Result<String, ConversionError> {
        match value {
            Scalar::Integer(i) => Ok(i.to_string()),
            other => Err(ConversionError::unexpected(self.name(), other.kind())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FloatCodec;

impl TypeCodec for FloatCodec {
    fn name(&self) -> &str {
        "float"
    }

    fn convert_to_stored_value(&self, raw: &str) -> Result<Scalar, ConversionError> {
        raw.trim()
            .parse::<f64>()
            .map(Scalar::Float)
            .map_err(|e| ConversionError::invalid(self.name(), raw, e))
    }

    fn convert_to_wire_value(&self, value: &Scalar) -> Result<String, ConversionError> {
        match value {
            Scalar::Float(v) => Ok(v.to_string()),
            Scalar::Integer(i) => Ok(i.to_string()),
            other => Err(ConversionError::unexpected(self.name(), other.kind())),
        }
    }
}

/// `true`/`false`, also reading `1`/`0` as XML Schema allows.
#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanCodec;

impl TypeCodec for BooleanCodec {
    fn name(&self) -> &str {
        "boolean"
    }

    fn convert_to_stored_value(&self, raw: &str) -> Result<Scalar, ConversionError> {
        match raw.trim() {
            "true" | "1" => Ok(Scalar::Boolean(true)),
            "false" | "0" => Ok(Scalar::Boolean(false)),
            _ => Err(ConversionError::invalid(
                self.name(),
                raw,
                "expected true, false, 1 or 0",
            )),
        }
    }

    fn convert_to_wire_value(&self, value: &Scalar) -> Result<String, ConversionError> {
        match value {
            Scalar::Boolean(b) => Ok(if *b { "true" } else { "false" }.to_string()),
            other => Err(ConversionError::unexpected(self.name(), other.kind())),
        }
    }
}

/// Arbitrary precision decimal; trailing zeros survive a round trip.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecimalCodec;

impl TypeCodec for DecimalCodec {
    fn name(&self) -> &str {
        "decimal"
    }

    fn convert_to_stored_value(&self, raw: &str) -> Result<Scalar, ConversionError> {
        Decimal::from_str(raw.trim())
            .map(Scalar::Decimal)
            .map_err(|e| ConversionError::invalid(self.name(), raw, e))
    }

    fn convert_to_wire_value(&self, value: &Scalar) -> Result<String, ConversionError> {
        match value {
            Scalar::Decimal(d) => Ok(d.to_string()),
            Scalar::Integer(i) => Ok(i.to_string()),
            other => Err(ConversionError::unexpected(self.name(), other.kind())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DateCodec;

impl TypeCodec for DateCodec {
    fn name(&self) -> &str {
        "date"
    }

    fn convert_to_stored_value(&self, raw: &str) -> Result<Scalar, ConversionError> {
        NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
            .map(Scalar::Date)
            .map_err(|e| ConversionError::invalid(self.name(), raw, e))
    }

    fn convert_to_wire_value(&self, value: &Scalar) -> Result<String, ConversionError> {
        match value {
            Scalar::Date(d) => Ok(d.format(DATE_FORMAT).to_string()),
            Scalar::DateTime(dt) => Ok(dt.date_naive().format(DATE_FORMAT).to_string()),
            other => Err(ConversionError::unexpected(self.name(), other.kind())),
        }
    }
}

/// RFC 3339 timestamps with offset.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateTimeCodec;

impl TypeCodec for DateTimeCodec {
    fn name(&self) -> &str {
        "datetime"
    }

    fn convert_to_stored_value(&self, raw: &str) -> Result<Scalar, ConversionError> {
        DateTime::parse_from_rfc3339(raw.trim())
            .map(Scalar::DateTime)
            .map_err(|e| ConversionError::invalid(self.name(), raw, e))
    }

    fn convert_to_wire_value(&self, value: &Scalar) -> Result<String, ConversionError> {
        match value {
            Scalar::DateTime(dt) => Ok(dt.to_rfc3339()),
            other => Err(ConversionError::unexpected(self.name(), other.kind())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_integer_codec() {
        let codec = IntegerCodec;
        assert_eq!(
            codec.convert_to_stored_value("-12").unwrap(),
            Scalar::Integer(-12)
        );
        assert!(codec.convert_to_stored_value("twelve").is_err());
        assert!(matches!(
            codec.convert_to_wire_value(&Scalar::Boolean(true)),
            Err(ConversionError::UnexpectedScalar { found: "boolean", .. })
        ));
    }

    #[test]
    fn test_boolean_codec_accepts_numeric_forms() {
        let codec = BooleanCodec;
        assert_eq!(
            codec.convert_to_stored_value("1").unwrap(),
            Scalar::Boolean(true)
        );
        assert_eq!(
            codec.convert_to_stored_value("false").unwrap(),
            Scalar::Boolean(false)
        );
        assert!(codec.convert_to_stored_value("yes").is_err());
    }

    #[test]
    fn test_decimal_codec_keeps_precision() {
        let codec = DecimalCodec;
        let stored = codec.convert_to_stored_value("123.450").unwrap();
        assert_eq!(stored, Scalar::Decimal(dec!(123.450)));
        assert_eq!(codec.convert_to_wire_value(&stored).unwrap(), "123.450");
    }

    #[test]
    fn test_date_codecs() {
        let date = DateCodec.convert_to_stored_value("1974-12-25").unwrap();
        assert_eq!(DateCodec.convert_to_wire_value(&date).unwrap(), "1974-12-25");

        let ts = DateTimeCodec
            .convert_to_stored_value("2015-02-07T13:28:17+02:00")
            .unwrap();
        assert_eq!(
            DateTimeCodec.convert_to_wire_value(&ts).unwrap(),
            "2015-02-07T13:28:17+02:00"
        );
        assert!(DateCodec.convert_to_stored_value("25/12/1974").is_err());
    }

    #[test]
    fn test_string_codec_writes_any_scalar() {
        assert_eq!(
            StringCodec
                .convert_to_wire_value(&Scalar::Integer(5))
                .unwrap(),
            "5"
        );
    }
}
