use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::value::XmlObject;

/// Points in the codec where class hooks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleEvent {
    /// Right after instantiation, before any field is set.
    PreDecode,
    /// After the element is fully decoded.
    PostDecode,
    PreEncode,
    PostEncode,
}

/// Callback registered on a class for a [`LifecycleEvent`].
pub type LifecycleHook = Arc<dyn Fn(&mut dyn XmlObject) + Send + Sync>;

/// Notifications published by the metadata registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataEvent {
    ClassLoaded {
        class: String,
        xml_name: String,
        namespace: String,
    },
}
