//! Metadata registry.
//!
//! Builds [`ClassMetadata`] lazily, ancestors first, and keeps the lookup
//! tables the codecs use to map element names back to classes:
//!
//! - `element_map`: element name → namespace → class
//! - `wrapper_map`: wrapper element name → owner element name → item class
//!   (`None` for scalar items)
//! - `alternative_map`: base class → namespace → subclass
//! - `discriminator_map`: ancestor → subclasses declaring a discriminator
//!
//! Loading is serialised by a re-entrant guard so a class referencing itself
//! (or a class that references it back) resolves against the metadata being
//! built, and concurrent first access loads every class exactly once.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use oxm_types::TypeRegistry;
use parking_lot::{ReentrantMutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::cache::{CacheStore, MAPS_CACHE_KEY, class_cache_key};
use crate::error::{MappingError, Result};
use crate::mapping::{
    AttributeSet, ClassMetadata, ClassMetadataRecord, IdGenerator, MappingDriver,
    MetadataEvent, NodeKind, WILDCARD,
};
use crate::xml::utils::name_matches_type;

/// Lookup tables shared by the codecs. Entries are only ever added.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryMaps {
    pub element_map: IndexMap<String, IndexMap<String, String>>,
    pub wrapper_map: IndexMap<String, IndexMap<String, Option<String>>>,
    pub alternative_map: IndexMap<String, IndexMap<String, String>>,
    #[serde(default)]
    pub discriminator_map: IndexMap<String, Vec<String>>,
}

impl RegistryMaps {
    /// Classes registered for an element name, falling back to the
    /// wildcard entry.
    pub fn element_candidates(&self, local_name: &str) -> Option<&IndexMap<String, String>> {
        self.element_map
            .get(local_name)
            .or_else(|| self.element_map.get(WILDCARD))
    }

    pub fn is_known_element(&self, local_name: &str) -> bool {
        self.element_map.contains_key(local_name)
    }

    /// Item class of a wrapper element inside its owner, if registered.
    pub fn wrapper_entry(&self, wrapper: &str, owner: &str) -> Option<&Option<String>> {
        self.wrapper_map
            .get(wrapper)
            .and_then(|owners| owners.get(owner))
    }
}

const EVENT_CAPACITY: usize = 64;

pub struct MetadataRegistry {
    driver: Arc<dyn MappingDriver>,
    types: Arc<TypeRegistry>,
    cache: Option<Arc<dyn CacheStore>>,
    loaded: RwLock<HashMap<String, Arc<ClassMetadata>>>,
    /// Classes being loaded; only read while holding `load_guard`.
    pending: RwLock<HashMap<String, Arc<ClassMetadata>>>,
    maps: RwLock<RegistryMaps>,
    load_guard: ReentrantMutex<()>,
    snapshot: OnceCell<Arc<RegistryMaps>>,
    events: broadcast::Sender<MetadataEvent>,
}

impl MetadataRegistry {
    /// Registry over `driver` with the built-in scalar types and no cache.
    pub fn new(driver: Arc<dyn MappingDriver>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            driver,
            types: Arc::new(TypeRegistry::with_defaults()),
            cache: None,
            loaded: RwLock::new(HashMap::new()),
            pending: RwLock::new(HashMap::new()),
            maps: RwLock::new(RegistryMaps::default()),
            load_guard: ReentrantMutex::new(()),
            snapshot: OnceCell::new(),
            events,
        }
    }

    pub fn with_types(mut self, types: TypeRegistry) -> Self {
        self.types = Arc::new(types);
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    pub fn driver(&self) -> &Arc<dyn MappingDriver> {
        &self.driver
    }

    /// Subscribes to class-loaded notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<MetadataEvent> {
        self.events.subscribe()
    }

    pub fn has_metadata_for(&self, type_name: &str) -> bool {
        self.loaded.read().contains_key(type_name)
    }

    /// True when the type is loaded or the driver can load it.
    pub fn is_mapped(&self, type_name: &str) -> bool {
        self.has_metadata_for(type_name) || !self.driver.is_transient(type_name)
    }

    /// Metadata for a class, loading it and its ancestors if needed.
    pub fn metadata_for(&self, type_name: &str) -> Result<Arc<ClassMetadata>> {
        if let Some(metadata) = self.loaded.read().get(type_name) {
            return Ok(Arc::clone(metadata));
        }
        let _guard = self.load_guard.lock();
        self.load_metadata(type_name)?;
        self.loaded_or_pending(type_name).ok_or_else(|| {
            MappingError::MappingNotFoundForClass {
                class: type_name.to_string(),
            }
            .into()
        })
    }

    /// Loads a class and every ancestor not loaded yet.
    ///
    /// Returns the names of the classes loaded by this call, root first.
    pub fn load_metadata(&self, type_name: &str) -> Result<Vec<String>> {
        if self.has_metadata_for(type_name) {
            return Ok(Vec::new());
        }
        let _guard = self.load_guard.lock();
        if self.loaded_or_pending(type_name).is_some() {
            return Ok(Vec::new());
        }
        if self.driver.is_transient(type_name) {
            return Err(MappingError::MappingNotFoundForClass {
                class: type_name.to_string(),
            }
            .into());
        }

        let mut parent: Option<Arc<ClassMetadata>> = None;
        let mut newly_loaded = Vec::new();
        for name in self.ancestry(type_name)? {
            let metadata = match self.loaded_or_pending(&name) {
                Some(metadata) => metadata,
                None => {
                    let metadata = self.load_class(&name, parent.as_deref())?;
                    newly_loaded.push(name);
                    metadata
                }
            };
            parent = Some(metadata);
        }
        Ok(newly_loaded)
    }

    /// Loads every class the driver knows about.
    pub fn load_all(&self) -> Result<Vec<Arc<ClassMetadata>>> {
        self.driver
            .all_class_names()
            .iter()
            .map(|name| self.metadata_for(name))
            .collect()
    }

    /// Lookup tables with every class registered.
    ///
    /// Computed once per registry. With a cache, a saved snapshot is restored
    /// as is; otherwise every class is loaded and the snapshot saved.
    pub fn all_maps(&self) -> Result<Arc<RegistryMaps>> {
        self.snapshot
            .get_or_try_init(|| -> Result<Arc<RegistryMaps>> {
                if let Some(cache) = &self.cache
                    && let Some(json) = cache.fetch(MAPS_CACHE_KEY)
                {
                    let maps: RegistryMaps = serde_json::from_value(json)?;
                    debug!(
                        elements = maps.element_map.len(),
                        "restored class maps from cache"
                    );
                    *self.maps.write() = maps.clone();
                    return Ok(Arc::new(maps));
                }

                self.load_all()?;
                let maps = self.maps.read().clone();
                if let Some(cache) = &self.cache {
                    cache.save(MAPS_CACHE_KEY, serde_json::to_value(&maps)?);
                }
                Ok(Arc::new(maps))
            })
            .cloned()
    }

    /// Current tables, including only the classes loaded so far.
    pub fn maps(&self) -> RegistryMaps {
        self.maps.read().clone()
    }

    /// Subclass of `base` registered for `namespace`.
    pub fn alternative_class_for_namespace(
        &self,
        base: &str,
        namespace: &str,
        default_to_base: bool,
    ) -> Option<String> {
        self.maps
            .read()
            .alternative_map
            .get(base)
            .and_then(|alternatives| alternatives.get(namespace))
            .cloned()
            .or_else(|| default_to_base.then(|| base.to_string()))
    }

    /// Subclass of `base` whose short type name matches an element name.
    pub fn alternative_class_for_name(
        &self,
        base: &str,
        local_name: &str,
        default_to_base: bool,
    ) -> Option<String> {
        self.maps
            .read()
            .alternative_map
            .get(base)
            .and_then(|alternatives| {
                alternatives
                    .values()
                    .find(|candidate| name_matches_type(local_name, candidate))
                    .cloned()
            })
            .or_else(|| default_to_base.then(|| base.to_string()))
    }

    /// First subclass of `base` whose discriminator matches the attributes.
    pub fn alternative_class_for_attributes(
        &self,
        base: &str,
        namespace: &str,
        attributes: &AttributeSet,
        default_to_base: bool,
    ) -> Result<Option<String>> {
        let candidates = self
            .maps
            .read()
            .discriminator_map
            .get(base)
            .cloned()
            .unwrap_or_default();
        for candidate in candidates {
            if self.discriminator_matches(&candidate, namespace, attributes)? {
                return Ok(Some(candidate));
            }
        }
        Ok(default_to_base.then(|| base.to_string()))
    }

    /// Whether a class declares a discriminator matching the attributes.
    pub fn discriminator_matches(
        &self,
        class: &str,
        namespace: &str,
        attributes: &AttributeSet,
    ) -> Result<bool> {
        let metadata = self.metadata_for(class)?;
        Ok(metadata
            .discriminator
            .as_ref()
            .is_some_and(|d| d.matches(attributes, namespace)))
    }

    /// Published metadata, or metadata still being loaded by this thread.
    /// Callers must hold `load_guard`.
    fn loaded_or_pending(&self, type_name: &str) -> Option<Arc<ClassMetadata>> {
        if let Some(metadata) = self.loaded.read().get(type_name) {
            return Some(Arc::clone(metadata));
        }
        self.pending.read().get(type_name).cloned()
    }

    /// `type_name` and its ancestors, root first.
    fn ancestry(&self, type_name: &str) -> Result<Vec<String>> {
        let mut chain = vec![type_name.to_string()];
        let mut seen = HashSet::from([type_name.to_string()]);
        let mut current = type_name.to_string();
        while let Some(parent) = self.driver.parent_class(&current) {
            if !seen.insert(parent.clone()) {
                return Err(MappingError::ReflectionFailure {
                    class: type_name.to_string(),
                    message: format!("cyclic inheritance through {}", parent),
                }
                .into());
            }
            chain.push(parent.clone());
            current = parent;
        }
        chain.reverse();
        Ok(chain)
    }

    fn load_class(
        &self,
        name: &str,
        parent: Option<&ClassMetadata>,
    ) -> Result<Arc<ClassMetadata>> {
        let mut metadata = ClassMetadata::new(name);
        if let Some(parent) = parent {
            metadata.inherit_from(parent);
        }

        match self.fetch_record(name)? {
            Some(record) => {
                trace!(class = %name, "restoring class metadata from cache");
                metadata.apply_record(record);
                self.driver.wakeup_reflection(name, &mut metadata)?;
            }
            None => {
                self.driver.load_metadata_for_class(name, &mut metadata)?;
                self.save_record(&metadata)?;
            }
        }

        metadata.id_generator = match parent {
            Some(parent) if !parent.is_mapped_superclass => parent.id_generator,
            _ => IdGenerator::resolve(metadata.generator_type)?,
        };

        if let Some(parent) = parent {
            metadata.parent_classes = parent.parent_classes.clone();
            metadata.parent_classes.push(parent.name.clone());
        }

        let metadata = Arc::new(metadata);
        self.pending
            .write()
            .insert(name.to_string(), Arc::clone(&metadata));

        let validated = self.validate_field_types(&metadata);
        self.pending.write().remove(name);
        validated?;

        self.register(&metadata);
        self.loaded
            .write()
            .insert(name.to_string(), Arc::clone(&metadata));
        Ok(metadata)
    }

    fn validate_field_types(&self, metadata: &ClassMetadata) -> Result<()> {
        for field in metadata.field_mappings() {
            if self.types.has_type(&field.type_name) {
                continue;
            }
            if !self.is_mapped(&field.type_name) {
                return Err(MappingError::FieldTypeNotFound {
                    class: metadata.name.clone(),
                    field: field.field_name.clone(),
                    type_name: field.type_name.clone(),
                }
                .into());
            }
            if field.node != NodeKind::Element {
                return Err(MappingError::CustomTypeWithoutElementNode {
                    class: metadata.name.clone(),
                    field: field.field_name.clone(),
                }
                .into());
            }
            self.load_metadata(&field.type_name)?;
        }
        Ok(())
    }

    fn register(&self, metadata: &ClassMetadata) {
        let namespace = metadata.default_namespace();
        {
            let mut maps = self.maps.write();

            if let Some(parent) = &metadata.parent {
                maps.alternative_map
                    .entry(parent.clone())
                    .or_default()
                    .insert(namespace.clone(), metadata.name.clone());
            }

            if !metadata.is_mapped_superclass {
                maps.element_map
                    .entry(metadata.xml_name.clone())
                    .or_default()
                    .insert(namespace.clone(), metadata.name.clone());

                for field in metadata.field_mappings() {
                    let Some(wrapper) = &field.wrapper else {
                        continue;
                    };
                    let item_type = (!self.types.has_type(&field.type_name))
                        .then(|| field.type_name.clone());
                    maps.wrapper_map
                        .entry(wrapper.clone())
                        .or_default()
                        .insert(metadata.xml_name.clone(), item_type);
                }
            }

            if metadata.discriminator.is_some() {
                for ancestor in &metadata.parent_classes {
                    let subclasses = maps
                        .discriminator_map
                        .entry(ancestor.clone())
                        .or_default();
                    if !subclasses.contains(&metadata.name) {
                        subclasses.push(metadata.name.clone());
                    }
                }
            }
        }

        debug!(
            class = %metadata.name,
            xml_name = %metadata.xml_name,
            namespace = %namespace,
            "loaded class metadata"
        );
        let _ = self.events.send(MetadataEvent::ClassLoaded {
            class: metadata.name.clone(),
            xml_name: metadata.xml_name.clone(),
            namespace,
        });
    }

    fn fetch_record(&self, name: &str) -> Result<Option<ClassMetadataRecord>> {
        let Some(cache) = &self.cache else {
            return Ok(None);
        };
        match cache.fetch(&class_cache_key(name)) {
            Some(json) => Ok(Some(serde_json::from_value(json)?)),
            None => Ok(None),
        }
    }

    fn save_record(&self, metadata: &ClassMetadata) -> Result<()> {
        if let Some(cache) = &self.cache {
            cache.save(
                &class_cache_key(&metadata.name),
                serde_json::to_value(metadata.to_record())?,
            );
        }
        Ok(())
    }
}

impl std::fmt::Debug for MetadataRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut loaded: Vec<String> = self.loaded.read().keys().cloned().collect();
        loaded.sort();
        f.debug_struct("MetadataRegistry")
            .field("loaded", &loaded)
            .field("types", &self.types)
            .finish_non_exhaustive()
    }
}
