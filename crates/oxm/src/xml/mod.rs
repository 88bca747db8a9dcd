//! XML marshalling.
//!
//! [`XmlMarshaller`] is the entry point: it pairs a shared
//! [`MetadataRegistry`] with a [`MarshallerConfig`] and runs one
//! [`Decoder`](de::Decoder) or [`Encoder`](ser::Encoder) per call. All
//! per-call state (cursor, visited set, diagnostics) lives in that call, so a
//! marshaller can be shared between threads.
//!
//! ## Mapping
//!
//! | Field kind | XML |
//! |------------|-----|
//! | `Attribute` | `<article id="A1">` |
//! | `Value` | `<article>Foo</article>` |
//! | `Text` | `<article><title>Foo</title></article>` |
//! | `Element` (mapped class) | `<article><section>...</section></article>` |
//! | with wrapper | `<article><sections><section>...</section></sections></article>` |
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use oxm::{
//!     ClassDeclaration, DeclarativeDriver, FieldAccessor, FieldMapping, MarshallerConfig,
//!     MetadataRegistry, Value, XmlMarshaller, xml_object,
//! };
//!
//! #[derive(Debug, Default, Clone)]
//! struct Tag {
//!     name: Option<String>,
//! }
//! xml_object!(Tag, "Tag");
//!
//! let driver = DeclarativeDriver::new().with_class(
//!     ClassDeclaration::of::<Tag>("Tag").field(
//!         FieldMapping::new("name", "string").attribute(),
//!         FieldAccessor::new(
//!             |t: &Tag| t.name.clone().into(),
//!             |t: &mut Tag, v| {
//!                 t.name = v.extract()?;
//!                 Ok(())
//!             },
//!         ),
//!     ),
//! );
//! let registry = Arc::new(MetadataRegistry::new(Arc::new(driver)));
//! let config = MarshallerConfig {
//!     indent: 0,
//!     xml_declaration: false,
//!     ..Default::default()
//! };
//! let marshaller = XmlMarshaller::with_config(registry, config);
//!
//! let xml = marshaller
//!     .marshal_to_string(&Value::object(Tag { name: Some("rust".into()) }))
//!     .unwrap();
//! assert_eq!(xml, r#"<tag name="rust"></tag>"#);
//!
//! let tag: Tag = marshaller.unmarshal_from_str(&xml).unwrap().downcast_clone().unwrap();
//! assert_eq!(tag.name.as_deref(), Some("rust"));
//! ```

pub mod cursor;
pub mod de;
pub mod ser;
pub mod utils;

use std::io::{BufRead, Write};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::MarshallerConfig;
use crate::error::{Result, StructuralError};
use crate::registry::MetadataRegistry;
use crate::value::Value;

pub use de::{Decoder, from_xml_reader, from_xml_slice, from_xml_str};
pub use ser::{Encoder, to_xml_string, to_xml_vec, to_xml_writer};

/// Non-fatal findings collected while decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// Several classes are registered for an element and nothing told them
    /// apart; the first registered one was used.
    AmbiguousDispatch {
        element: String,
        namespace: Option<String>,
        candidates: Vec<String>,
        chosen: String,
    },
}

/// Converts between XML documents and object graphs.
#[derive(Debug, Clone)]
pub struct XmlMarshaller {
    registry: Arc<MetadataRegistry>,
    config: MarshallerConfig,
}

impl XmlMarshaller {
    /// Marshaller with default settings.
    pub fn new(registry: Arc<MetadataRegistry>) -> Self {
        Self::with_config(registry, MarshallerConfig::default())
    }

    pub fn with_config(registry: Arc<MetadataRegistry>, config: MarshallerConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &Arc<MetadataRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &MarshallerConfig {
        &self.config
    }

    pub fn unmarshal_from_str(&self, xml: &str) -> Result<Value> {
        self.unmarshal_from_reader(xml.as_bytes())
    }

    pub fn unmarshal_from_slice(&self, bytes: &[u8]) -> Result<Value> {
        self.unmarshal_from_reader(bytes)
    }

    /// Decodes the first element of the document.
    pub fn unmarshal_from_reader<R: BufRead>(&self, reader: R) -> Result<Value> {
        self.unmarshal_with_diagnostics(reader)
            .map(|(value, _)| value)
    }

    /// Decodes the first element and returns the diagnostics collected on
    /// the way.
    pub fn unmarshal_with_diagnostics<R: BufRead>(
        &self,
        reader: R,
    ) -> Result<(Value, Vec<Diagnostic>)> {
        let mut decoder =
            Decoder::new(&self.registry, reader)?.with_passthrough(self.config.passthrough);
        let value = decoder.decode_document()?;
        Ok((value, decoder.into_diagnostics()))
    }

    pub fn marshal_to_string(&self, value: &Value) -> Result<String> {
        let buffer = self.marshal_to_vec(value)?;
        String::from_utf8(buffer).map_err(|e| StructuralError::malformed(e).into())
    }

    pub fn marshal_to_vec(&self, value: &Value) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.marshal_to_writer(value, &mut buffer)?;
        Ok(buffer)
    }

    pub fn marshal_to_writer<W: Write>(&self, value: &Value, writer: W) -> Result<()> {
        self.config.validate()?;
        let mut encoder = Encoder::new(&self.registry, writer, self.config.indent)
            .with_passthrough(self.config.passthrough);
        if self.config.xml_declaration {
            encoder.write_declaration(&self.config.schema_version, &self.config.encoding)?;
        }
        encoder.encode(value)
    }
}
