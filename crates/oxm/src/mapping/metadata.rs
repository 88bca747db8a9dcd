use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::discriminator::Discriminator;
use super::events::{LifecycleEvent, LifecycleHook};
use super::field::{FieldMapping, NodeKind};
use super::id::{GeneratorType, IdGenerator};
use crate::error::{MappingError, ValueError};
use crate::value::{ObjectRef, Value, XmlObject, object_ref};
use crate::xml::utils::{default_namespace, short_name, xmlize};

/// Namespace declared on a class; `prefix: None` binds the default namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XmlNamespace {
    pub url: String,
    pub prefix: Option<String>,
}

impl XmlNamespace {
    pub fn new(url: impl Into<String>, prefix: Option<&str>) -> Self {
        Self {
            url: url.into(),
            prefix: prefix.map(str::to_string),
        }
    }

    /// `xmlns` or `xmlns:prefix`.
    pub fn attribute_name(&self) -> String {
        match &self.prefix {
            Some(prefix) if !prefix.is_empty() => format!("xmlns:{}", prefix),
            _ => "xmlns".to_string(),
        }
    }
}

type GetFn = dyn Fn(&dyn XmlObject) -> Result<Value, ValueError> + Send + Sync;
type SetFn = dyn Fn(&mut dyn XmlObject, Value) -> Result<(), ValueError> + Send + Sync;

fn foreign<T>() -> ValueError {
    ValueError {
        expected: std::any::type_name::<T>(),
        found: "object of another type",
    }
}

/// Reads and writes one field of a concrete mapped type.
///
/// ```
/// use oxm::{FieldAccessor, Value, xml_object};
///
/// #[derive(Debug, Default)]
/// struct Tag {
///     label: Option<String>,
/// }
/// xml_object!(Tag, "Tag");
///
/// let label = FieldAccessor::new(
///     |t: &Tag| t.label.clone().into(),
///     |t: &mut Tag, v: Value| {
///         t.label = v.extract()?;
///         Ok(())
///     },
/// );
/// let mut tag = Tag::default();
/// label.set(&mut tag, Value::from("news")).unwrap();
/// assert_eq!(label.get(&tag).unwrap(), Value::from("news"));
/// ```
#[derive(Clone)]
pub struct FieldAccessor {
    get: Arc<GetFn>,
    set: Arc<SetFn>,
}

impl FieldAccessor {
    pub fn new<T, G, S>(get: G, set: S) -> Self
    where
        T: XmlObject,
        G: Fn(&T) -> Value + Send + Sync + 'static,
        S: Fn(&mut T, Value) -> Result<(), ValueError> + Send + Sync + 'static,
    {
        Self {
            get: Arc::new(move |object: &dyn XmlObject| {
                object
                    .as_any()
                    .downcast_ref::<T>()
                    .map(&get)
                    .ok_or_else(foreign::<T>)
            }),
            set: Arc::new(move |object: &mut dyn XmlObject, value: Value| {
                let target = object
                    .as_any_mut()
                    .downcast_mut::<T>()
                    .ok_or_else(foreign::<T>)?;
                set(target, value)
            }),
        }
    }

    pub fn get(&self, object: &dyn XmlObject) -> Result<Value, ValueError> {
        (self.get)(object)
    }

    pub fn set(&self, object: &mut dyn XmlObject, value: Value) -> Result<(), ValueError> {
        (self.set)(object, value)
    }
}

impl fmt::Debug for FieldAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FieldAccessor")
    }
}

/// Creates empty instances of a mapped class.
#[derive(Clone)]
pub struct Instantiator(Arc<dyn Fn() -> ObjectRef + Send + Sync>);

impl Instantiator {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn() -> ObjectRef + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn of<T: XmlObject + Default>() -> Self {
        Self::new(|| object_ref(T::default()))
    }

    pub fn instantiate(&self) -> ObjectRef {
        (self.0)()
    }
}

impl fmt::Debug for Instantiator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Instantiator")
    }
}

/// Declarative part of [`ClassMetadata`], as stored in the metadata cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetadataRecord {
    pub name: String,
    pub xml_name: String,
    pub namespaces: Vec<XmlNamespace>,
    pub field_mappings: Vec<FieldMapping>,
    pub identifier: Option<String>,
    pub is_mapped_superclass: bool,
    pub is_root: bool,
    pub generator_type: GeneratorType,
}

/// Everything the codecs need to know about one mapped class.
#[derive(Clone)]
pub struct ClassMetadata {
    pub name: String,
    pub xml_name: String,
    pub namespaces: Vec<XmlNamespace>,
    pub identifier: Option<String>,
    pub is_mapped_superclass: bool,
    pub is_root: bool,
    pub parent: Option<String>,
    /// Ancestors including mapped superclasses, root first.
    pub parent_classes: Vec<String>,
    pub generator_type: GeneratorType,
    pub id_generator: IdGenerator,
    pub discriminator: Option<Discriminator>,
    field_mappings: IndexMap<String, FieldMapping>,
    lifecycle_callbacks: HashMap<LifecycleEvent, Vec<LifecycleHook>>,
    accessors: HashMap<String, FieldAccessor>,
    instantiator: Option<Instantiator>,
}

impl ClassMetadata {
    /// Empty metadata named after the unqualified, inflected type name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            xml_name: xmlize(short_name(&name)),
            name,
            namespaces: Vec::new(),
            identifier: None,
            is_mapped_superclass: false,
            is_root: false,
            parent: None,
            parent_classes: Vec::new(),
            generator_type: GeneratorType::None,
            id_generator: IdGenerator::Assigned,
            discriminator: None,
            field_mappings: IndexMap::new(),
            lifecycle_callbacks: HashMap::new(),
            accessors: HashMap::new(),
            instantiator: None,
        }
    }

    /// Copies everything a subclass inherits from its loaded parent.
    pub fn inherit_from(&mut self, parent: &ClassMetadata) {
        self.parent = Some(parent.name.clone());
        self.namespaces = parent.namespaces.clone();
        self.identifier = parent.identifier.clone();
        self.generator_type = parent.generator_type;
        self.lifecycle_callbacks = parent.lifecycle_callbacks.clone();
        self.accessors = parent.accessors.clone();
        for mapping in parent.field_mappings.values() {
            self.add_inherited_field(mapping.clone(), parent);
        }
    }

    fn add_inherited_field(&mut self, mut mapping: FieldMapping, parent: &ClassMetadata) {
        if mapping.inherited_from.is_none() && !parent.is_mapped_superclass {
            mapping.inherited_from = Some(parent.name.clone());
        }
        if mapping.declared_in.is_none() {
            mapping.declared_in = Some(parent.name.clone());
        }
        self.field_mappings
            .insert(mapping.field_name.clone(), mapping);
    }

    /// Adds a field declared by this class.
    ///
    /// An inherited field of the same name is shadowed in place, keeping its
    /// position in the encode order.
    pub fn map_field(&mut self, mut mapping: FieldMapping) -> Result<(), MappingError> {
        if let Some(existing) = self.field_mappings.get(&mapping.field_name)
            && existing.declared_in.as_deref() == Some(self.name.as_str())
        {
            return Err(MappingError::DuplicateFieldMapping {
                class: self.name.clone(),
                field: mapping.field_name,
            });
        }
        mapping.declared_in = Some(self.name.clone());
        mapping.inherited_from = None;
        if mapping.identifier {
            self.identifier = Some(mapping.field_name.clone());
        }
        self.field_mappings
            .insert(mapping.field_name.clone(), mapping);
        Ok(())
    }

    pub fn add_namespace(&mut self, namespace: XmlNamespace) {
        if !self.namespaces.contains(&namespace) {
            self.namespaces.push(namespace);
        }
    }

    /// URL of the last prefix-less namespace, else the first declared, else `""`.
    pub fn default_namespace(&self) -> String {
        default_namespace(&self.namespaces)
    }

    pub fn field_mapping(&self, field_name: &str) -> Option<&FieldMapping> {
        self.field_mappings.get(field_name)
    }

    pub fn has_field(&self, field_name: &str) -> bool {
        self.field_mappings.contains_key(field_name)
    }

    /// All field mappings in declaration order, inherited fields first.
    pub fn field_mappings(&self) -> impl Iterator<Item = &FieldMapping> {
        self.field_mappings.values()
    }

    pub fn attribute_fields(&self) -> impl Iterator<Item = &FieldMapping> {
        self.field_mappings
            .values()
            .filter(|f| f.node == NodeKind::Attribute)
    }

    pub fn value_fields(&self) -> impl Iterator<Item = &FieldMapping> {
        self.field_mappings
            .values()
            .filter(|f| f.node == NodeKind::Value)
    }

    /// Child field for an element local name inside `wrapper` (or directly
    /// under the owner when `None`), falling back to the wildcard field.
    pub fn child_field(&self, local_name: &str, wrapper: Option<&str>) -> Option<&FieldMapping> {
        let candidates = || {
            self.field_mappings
                .values()
                .filter(move |f| f.is_child() && f.wrapper.as_deref() == wrapper)
        };
        candidates()
            .find(|f| f.xml_name == local_name)
            .or_else(|| candidates().find(|f| f.is_wildcard()))
    }

    /// Fields collected inside the named wrapper element.
    pub fn wrapped_fields(&self, wrapper: &str) -> impl Iterator<Item = &FieldMapping> {
        self.field_mappings
            .values()
            .filter(move |f| f.is_child() && f.wrapper.as_deref() == Some(wrapper))
    }

    pub fn is_wrapper(&self, name: &str) -> bool {
        self.wrapped_fields(name).next().is_some()
    }

    /// True when `class` is this class or one of its mapped ancestors.
    pub fn is_a(&self, class: &str) -> bool {
        self.name == class || self.parent_classes.iter().any(|p| p == class)
    }

    pub fn add_lifecycle_callback(&mut self, event: LifecycleEvent, hook: LifecycleHook) {
        self.lifecycle_callbacks
            .entry(event)
            .or_default()
            .push(hook);
    }

    pub fn has_lifecycle_callbacks(&self, event: LifecycleEvent) -> bool {
        self.lifecycle_callbacks
            .get(&event)
            .is_some_and(|hooks| !hooks.is_empty())
    }

    pub fn invoke_lifecycle_callbacks(&self, event: LifecycleEvent, object: &mut dyn XmlObject) {
        if let Some(hooks) = self.lifecycle_callbacks.get(&event) {
            for hook in hooks {
                hook(object);
            }
        }
    }

    pub fn set_accessor(&mut self, field_name: impl Into<String>, accessor: FieldAccessor) {
        self.accessors.insert(field_name.into(), accessor);
    }

    pub fn set_instantiator(&mut self, instantiator: Instantiator) {
        self.instantiator = Some(instantiator);
    }

    fn accessor(&self, field_name: &str) -> Result<&FieldAccessor, MappingError> {
        self.accessors
            .get(field_name)
            .ok_or_else(|| MappingError::ReflectionFailure {
                class: self.name.clone(),
                message: format!("no accessor bound for field {}", field_name),
            })
    }

    pub fn get_field_value(
        &self,
        object: &dyn XmlObject,
        field_name: &str,
    ) -> Result<Value, MappingError> {
        self.accessor(field_name)?
            .get(object)
            .map_err(|e| self.invalid_value(field_name, e))
    }

    pub fn set_field_value(
        &self,
        object: &mut dyn XmlObject,
        field_name: &str,
        value: Value,
    ) -> Result<(), MappingError> {
        self.accessor(field_name)?
            .set(object, value)
            .map_err(|e| self.invalid_value(field_name, e))
    }

    fn invalid_value(&self, field_name: &str, err: ValueError) -> MappingError {
        MappingError::InvalidFieldValue {
            class: self.name.clone(),
            field: field_name.to_string(),
            message: err.to_string(),
        }
    }

    pub fn is_instantiable(&self) -> bool {
        !self.is_mapped_superclass && self.instantiator.is_some()
    }

    pub fn instantiate(&self) -> Result<ObjectRef, MappingError> {
        if self.is_mapped_superclass {
            return Err(MappingError::NotInstantiable {
                class: self.name.clone(),
            });
        }
        self.instantiator
            .as_ref()
            .map(Instantiator::instantiate)
            .ok_or_else(|| MappingError::NotInstantiable {
                class: self.name.clone(),
            })
    }

    pub fn identifier_value(&self, object: &dyn XmlObject) -> Result<Value, MappingError> {
        match &self.identifier {
            Some(field) => self.get_field_value(object, field),
            None => Ok(Value::Null),
        }
    }

    /// Generates an identifier for an object that has none yet.
    pub fn ensure_identifier(&self, object: &mut dyn XmlObject) -> Result<(), MappingError> {
        let Some(field) = &self.identifier else {
            return Ok(());
        };
        if !self.get_field_value(object, field)?.is_null() {
            return Ok(());
        }
        match self.id_generator.generate() {
            Some(id) => self.set_field_value(object, field, id),
            None => Ok(()),
        }
    }

    pub fn to_record(&self) -> ClassMetadataRecord {
        ClassMetadataRecord {
            name: self.name.clone(),
            xml_name: self.xml_name.clone(),
            namespaces: self.namespaces.clone(),
            field_mappings: self.field_mappings.values().cloned().collect(),
            identifier: self.identifier.clone(),
            is_mapped_superclass: self.is_mapped_superclass,
            is_root: self.is_root,
            generator_type: self.generator_type,
        }
    }

    /// Restores the declarative part saved by [`ClassMetadata::to_record`].
    pub fn apply_record(&mut self, record: ClassMetadataRecord) {
        self.xml_name = record.xml_name;
        self.namespaces = record.namespaces;
        self.field_mappings = record
            .field_mappings
            .into_iter()
            .map(|f| (f.field_name.clone(), f))
            .collect();
        self.identifier = record.identifier;
        self.is_mapped_superclass = record.is_mapped_superclass;
        self.is_root = record.is_root;
        self.generator_type = record.generator_type;
    }
}

impl fmt::Debug for ClassMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassMetadata")
            .field("name", &self.name)
            .field("xml_name", &self.xml_name)
            .field("namespaces", &self.namespaces)
            .field("parent_classes", &self.parent_classes)
            .field("is_mapped_superclass", &self.is_mapped_superclass)
            .field(
                "fields",
                &self.field_mappings.keys().collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Page {
        id: Option<String>,
        title: Option<String>,
    }

    crate::xml_object!(Page, "Site\\Page");

    fn page_metadata() -> ClassMetadata {
        let mut meta = ClassMetadata::new("Site\\Page");
        meta.map_field(FieldMapping::new("id", "string").attribute().identifier())
            .unwrap();
        meta.map_field(FieldMapping::new("title", "string").text())
            .unwrap();
        meta.set_accessor(
            "id",
            FieldAccessor::new(
                |p: &Page| p.id.clone().into(),
                |p: &mut Page, v: Value| {
                    p.id = v.extract()?;
                    Ok(())
                },
            ),
        );
        meta.set_accessor(
            "title",
            FieldAccessor::new(
                |p: &Page| p.title.clone().into(),
                |p: &mut Page, v: Value| {
                    p.title = v.extract()?;
                    Ok(())
                },
            ),
        );
        meta.set_instantiator(Instantiator::of::<Page>());
        meta
    }

    #[test]
    fn test_new_metadata_uses_inflected_short_name() {
        let meta = ClassMetadata::new("Site\\BlogPost");
        assert_eq!(meta.xml_name, "blog-post");
        assert_eq!(meta.default_namespace(), "");
    }

    #[test]
    fn test_duplicate_own_field_is_rejected() {
        let mut meta = page_metadata();
        let err = meta
            .map_field(FieldMapping::new("title", "string"))
            .unwrap_err();
        assert!(matches!(err, MappingError::DuplicateFieldMapping { .. }));
    }

    #[test]
    fn test_inherited_fields_are_marked_and_shadowed_in_place() {
        let parent = page_metadata();
        let mut child = ClassMetadata::new("Site\\NewsPage");
        child.inherit_from(&parent);

        let id = child.field_mapping("id").unwrap();
        assert_eq!(id.inherited_from.as_deref(), Some("Site\\Page"));
        assert_eq!(id.declared_in.as_deref(), Some("Site\\Page"));
        assert_eq!(child.identifier.as_deref(), Some("id"));

        child
            .map_field(FieldMapping::new("id", "integer").attribute())
            .unwrap();
        let names: Vec<&str> = child
            .field_mappings()
            .map(|f| f.field_name.as_str())
            .collect();
        assert_eq!(names, vec!["id", "title"]);
        let id = child.field_mapping("id").unwrap();
        assert_eq!(id.inherited_from, None);
        assert_eq!(id.type_name, "integer");
    }

    #[test]
    fn test_mapped_superclass_fields_are_not_marked_inherited() {
        let mut base = page_metadata();
        base.is_mapped_superclass = true;
        let mut child = ClassMetadata::new("Site\\Landing");
        child.inherit_from(&base);
        let title = child.field_mapping("title").unwrap();
        assert_eq!(title.inherited_from, None);
        assert_eq!(title.declared_in.as_deref(), Some("Site\\Page"));
    }

    #[test]
    fn test_accessors_and_identifier_generation() {
        let mut meta = page_metadata();
        meta.id_generator = IdGenerator::Uuid;
        let object = meta.instantiate().unwrap();
        {
            let mut guard = object.write();
            meta.set_field_value(&mut *guard, "title", Value::from("Home"))
                .unwrap();
            meta.ensure_identifier(&mut *guard).unwrap();
        }
        let guard = object.read();
        assert_eq!(
            meta.get_field_value(&*guard, "title").unwrap(),
            Value::from("Home")
        );
        assert!(!meta.identifier_value(&*guard).unwrap().is_null());
    }

    #[test]
    fn test_setter_type_mismatch_names_field() {
        let meta = page_metadata();
        let object = meta.instantiate().unwrap();
        let err = meta
            .set_field_value(&mut *object.write(), "title", Value::from(vec!["a", "b"]))
            .unwrap_err();
        match err {
            MappingError::InvalidFieldValue { field, .. } => assert_eq!(field, "title"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_record_restores_declarative_part() {
        let meta = page_metadata();
        let json = serde_json::to_value(meta.to_record()).unwrap();
        let record: ClassMetadataRecord = serde_json::from_value(json).unwrap();

        let mut restored = ClassMetadata::new("Site\\Page");
        restored.apply_record(record);
        assert_eq!(restored.identifier.as_deref(), Some("id"));
        assert_eq!(
            restored.field_mapping("title").map(|f| f.node),
            Some(NodeKind::Text)
        );
        assert!(!restored.is_instantiable());
    }
}
