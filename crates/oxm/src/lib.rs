//! # OXM
//!
//! Metadata-driven object/XML mapping.
//!
//! Classes are described once, through a [`MappingDriver`], as
//! [`ClassMetadata`]: which fields become attributes, body text, text
//! elements or nested objects, how they are wrapped, and which namespaces the
//! class binds. The [`MetadataRegistry`] loads that metadata lazily, flattens
//! inheritance, and keeps the tables used to map element names back to
//! classes. [`XmlMarshaller`] streams documents to and from object graphs with
//! quick-xml.
//!
//! ## Features
//!
//! - **Streaming decode**: a forward-only cursor, no DOM
//! - **Polymorphism**: subclasses chosen by namespace, element name or
//!   attribute discriminators
//! - **Passthrough**: unmapped content kept as [`XmlNode`]s and written back
//! - **Scalar codecs**: pluggable through [`TypeRegistry`]
//!
//! ## Modules
//!
//! - [`mapping`]: field and class metadata, drivers, discriminators
//! - [`registry`]: metadata loading and lookup tables
//! - [`xml`]: cursor, decoder, encoder and the marshaller facade
//! - [`value`]: the dynamic value model seen by the codecs
//! - [`cache`]: metadata cache stores
//! - [`config`]: marshaller settings

pub mod cache;
pub mod config;
pub mod error;
pub mod mapping;
pub mod node;
pub mod registry;
pub mod value;
pub mod xml;

pub use cache::{ArrayCache, CacheStore};
pub use config::MarshallerConfig;
pub use error::{
    ConfigurationError, FieldError, MappingError, OxmError, Result, StructuralError, ValueError,
};
pub use mapping::{
    AttributeSet, ClassDeclaration, ClassMetadata, DeclarativeDriver, Discriminator,
    FieldAccessor, FieldMapping, GeneratorType, IdGenerator, Instantiator, LifecycleEvent,
    MappingDriver, MetadataEvent, NodeKind, XmlNamespace,
};
pub use node::{NodeContent, XmlNode};
pub use registry::{MetadataRegistry, RegistryMaps};
pub use value::{DynamicProperties, FromValue, ObjectRef, Value, XmlObject, object_ref};
pub use xml::{Diagnostic, XmlMarshaller};

pub use oxm_types::{ConversionError, Scalar, TypeCodec, TypeRegistry};
