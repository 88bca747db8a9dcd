//! Class and field mapping metadata.

pub mod discriminator;
pub mod driver;
pub mod events;
pub mod field;
pub mod id;
pub mod metadata;

pub use discriminator::{AttributeSet, Discriminator, DiscriminatorRule, ELEMENT_NAME_KEY};
pub use driver::{ClassDeclaration, DeclarativeDriver, MappingDriver};
pub use events::{LifecycleEvent, LifecycleHook, MetadataEvent};
pub use field::{FieldMapping, NodeKind, WILDCARD};
pub use id::{GeneratorType, IdGenerator};
pub use metadata::{
    ClassMetadata, ClassMetadataRecord, FieldAccessor, Instantiator, XmlNamespace,
};
