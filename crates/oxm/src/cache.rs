//! Key/value store for loaded metadata.
//!
//! The registry saves one record per class under `<class>$XMLCLASSMETADATA`
//! and the lookup tables under [`MAPS_CACHE_KEY`]. Values are JSON so any
//! backend able to hold a document can implement [`CacheStore`].

use std::collections::HashMap;

use parking_lot::RwLock;
use serde_json::Value as JsonValue;

/// Key of the lookup table snapshot.
pub const MAPS_CACHE_KEY: &str = "maps$XMLCLASSMAPS";

const CLASS_CACHE_SUFFIX: &str = "$XMLCLASSMETADATA";

/// Key of the metadata record for one class.
pub fn class_cache_key(class_name: &str) -> String {
    format!("{}{}", class_name, CLASS_CACHE_SUFFIX)
}

pub trait CacheStore: Send + Sync {
    fn fetch(&self, key: &str) -> Option<JsonValue>;

    fn save(&self, key: &str, value: JsonValue);

    fn contains(&self, key: &str) -> bool {
        self.fetch(key).is_some()
    }
}

/// In-process cache backed by a map.
#[derive(Debug, Default)]
pub struct ArrayCache {
    entries: RwLock<HashMap<String, JsonValue>>,
}

impl ArrayCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl CacheStore for ArrayCache {
    fn fetch(&self, key: &str) -> Option<JsonValue> {
        self.entries.read().get(key).cloned()
    }

    fn save(&self, key: &str, value: JsonValue) {
        self.entries.write().insert(key.to_string(), value);
    }

    fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_array_cache_roundtrip() {
        let cache = ArrayCache::new();
        assert!(cache.is_empty());
        cache.save("a", json!({"x": 1}));
        assert_eq!(cache.fetch("a"), Some(json!({"x": 1})));
        assert!(cache.contains("a"));
        assert!(cache.fetch("b").is_none());
    }

    #[test]
    fn test_cache_keys() {
        assert_eq!(
            class_cache_key("Documents\\Article"),
            "Documents\\Article$XMLCLASSMETADATA"
        );
        assert_eq!(MAPS_CACHE_KEY, "maps$XMLCLASSMAPS");
    }
}
