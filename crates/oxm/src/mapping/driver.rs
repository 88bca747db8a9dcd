//! Source of raw class declarations.
//!
//! The registry asks a [`MappingDriver`] for the declarative metadata of a
//! class and for the runtime bindings (accessors, instantiator, hooks) that
//! cannot be cached. [`DeclarativeDriver`] serves both from in-memory
//! [`ClassDeclaration`]s.

use std::sync::Arc;

use indexmap::IndexMap;

use super::discriminator::Discriminator;
use super::events::{LifecycleEvent, LifecycleHook};
use super::field::FieldMapping;
use super::id::GeneratorType;
use super::metadata::{ClassMetadata, FieldAccessor, Instantiator, XmlNamespace};
use crate::error::MappingError;
use crate::value::XmlObject;

pub trait MappingDriver: Send + Sync {
    /// Fills the declarative part of `metadata` and binds its runtime parts.
    ///
    /// `metadata` already carries everything inherited from the parent.
    fn load_metadata_for_class(
        &self,
        class_name: &str,
        metadata: &mut ClassMetadata,
    ) -> Result<(), MappingError>;

    /// Binds accessors, instantiator, hooks and discriminator on metadata
    /// restored from the cache.
    fn wakeup_reflection(
        &self,
        class_name: &str,
        metadata: &mut ClassMetadata,
    ) -> Result<(), MappingError>;

    fn parent_class(&self, class_name: &str) -> Option<String>;

    fn all_class_names(&self) -> Vec<String>;

    /// True for types the driver does not map.
    fn is_transient(&self, class_name: &str) -> bool;
}

/// Declaration of one mapped class for the [`DeclarativeDriver`].
#[derive(Clone)]
pub struct ClassDeclaration {
    name: String,
    parent: Option<String>,
    xml_name: Option<String>,
    namespaces: Vec<XmlNamespace>,
    mapped_superclass: bool,
    root: bool,
    generator_type: Option<GeneratorType>,
    fields: Vec<FieldMapping>,
    accessors: Vec<(String, FieldAccessor)>,
    instantiator: Option<Instantiator>,
    hooks: Vec<(LifecycleEvent, LifecycleHook)>,
    discriminator: Option<Discriminator>,
}

impl ClassDeclaration {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            xml_name: None,
            namespaces: Vec::new(),
            mapped_superclass: false,
            root: false,
            generator_type: None,
            fields: Vec::new(),
            accessors: Vec::new(),
            instantiator: None,
            hooks: Vec::new(),
            discriminator: None,
        }
    }

    /// Declaration instantiated through `T::default()`.
    pub fn of<T: XmlObject + Default>(name: impl Into<String>) -> Self {
        Self::new(name).instantiator(Instantiator::of::<T>())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn xml_name(mut self, xml_name: impl Into<String>) -> Self {
        self.xml_name = Some(xml_name.into());
        self
    }

    pub fn namespace(mut self, url: impl Into<String>, prefix: Option<&str>) -> Self {
        self.namespaces.push(XmlNamespace::new(url, prefix));
        self
    }

    pub fn mapped_superclass(mut self) -> Self {
        self.mapped_superclass = true;
        self
    }

    pub fn root(mut self) -> Self {
        self.root = true;
        self
    }

    pub fn id_generator(mut self, kind: GeneratorType) -> Self {
        self.generator_type = Some(kind);
        self
    }

    /// Maps a field without binding an accessor (for inherited accessors).
    pub fn mapping(mut self, mapping: FieldMapping) -> Self {
        self.fields.push(mapping);
        self
    }

    /// Maps a field and binds its accessor.
    pub fn field(mut self, mapping: FieldMapping, accessor: FieldAccessor) -> Self {
        self.accessors
            .push((mapping.field_name.clone(), accessor));
        self.fields.push(mapping);
        self
    }

    /// Binds an accessor for a field declared by an ancestor.
    pub fn accessor(mut self, field_name: impl Into<String>, accessor: FieldAccessor) -> Self {
        self.accessors.push((field_name.into(), accessor));
        self
    }

    pub fn instantiator(mut self, instantiator: Instantiator) -> Self {
        self.instantiator = Some(instantiator);
        self
    }

    pub fn on<F>(mut self, event: LifecycleEvent, hook: F) -> Self
    where
        F: Fn(&mut dyn XmlObject) + Send + Sync + 'static,
    {
        self.hooks.push((event, Arc::new(hook)));
        self
    }

    pub fn discriminator(mut self, discriminator: Discriminator) -> Self {
        self.discriminator = Some(discriminator);
        self
    }
}

/// Driver serving metadata from in-memory declarations, in declaration order.
#[derive(Clone, Default)]
pub struct DeclarativeDriver {
    classes: IndexMap<String, ClassDeclaration>,
}

impl DeclarativeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_class(mut self, declaration: ClassDeclaration) -> Self {
        self.add_class(declaration);
        self
    }

    pub fn add_class(&mut self, declaration: ClassDeclaration) {
        self.classes
            .insert(declaration.name.clone(), declaration);
    }

    fn declaration(&self, class_name: &str) -> Result<&ClassDeclaration, MappingError> {
        self.classes
            .get(class_name)
            .ok_or_else(|| MappingError::UnknownClass {
                class: class_name.to_string(),
            })
    }
}

impl MappingDriver for DeclarativeDriver {
    fn load_metadata_for_class(
        &self,
        class_name: &str,
        metadata: &mut ClassMetadata,
    ) -> Result<(), MappingError> {
        let declaration = self.declaration(class_name)?;

        if let Some(xml_name) = &declaration.xml_name {
            metadata.xml_name = xml_name.clone();
        }
        for namespace in &declaration.namespaces {
            metadata.add_namespace(namespace.clone());
        }
        metadata.is_mapped_superclass = declaration.mapped_superclass;
        metadata.is_root = declaration.root;
        if let Some(kind) = declaration.generator_type {
            metadata.generator_type = kind;
        }
        for field in &declaration.fields {
            metadata.map_field(field.clone())?;
        }

        self.wakeup_reflection(class_name, metadata)
    }

    fn wakeup_reflection(
        &self,
        class_name: &str,
        metadata: &mut ClassMetadata,
    ) -> Result<(), MappingError> {
        let declaration = self.declaration(class_name)?;

        for (field, accessor) in &declaration.accessors {
            if !metadata.has_field(field) {
                return Err(MappingError::UnknownField {
                    class: class_name.to_string(),
                    field: field.clone(),
                });
            }
            metadata.set_accessor(field.clone(), accessor.clone());
        }
        if let Some(instantiator) = &declaration.instantiator {
            metadata.set_instantiator(instantiator.clone());
        }
        for (event, hook) in &declaration.hooks {
            metadata.add_lifecycle_callback(*event, hook.clone());
        }
        metadata.discriminator = declaration.discriminator.clone();
        Ok(())
    }

    fn parent_class(&self, class_name: &str) -> Option<String> {
        self.classes
            .get(class_name)
            .and_then(|d| d.parent.clone())
    }

    fn all_class_names(&self) -> Vec<String> {
        self.classes.keys().cloned().collect()
    }

    fn is_transient(&self, class_name: &str) -> bool {
        !self.classes.contains_key(class_name)
    }
}
