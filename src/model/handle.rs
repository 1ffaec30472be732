use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of one graph-store collection. Only the naming convention in
/// `logic::naming` mints these, so a value is always storage-safe.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionName(String);

impl CollectionName {
    pub fn from_raw(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Edge collections are distinguished by their reserved prefix.
    pub fn is_edge_collection(&self) -> bool {
        self.0.starts_with("rel-")
    }
}

impl fmt::Display for CollectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle of one stored document: collection plus document key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentHandle {
    pub collection: CollectionName,
    pub key: String,
}

impl DocumentHandle {
    pub fn new(collection: CollectionName, key: impl Into<String>) -> Self {
        Self {
            collection,
            key: key.into(),
        }
    }

    /// The store-wide document id, `collection/key`.
    pub fn id(&self) -> String {
        format!("{}/{}", self.collection, self.key)
    }

    /// Parse a `collection/key` id back into a handle.
    pub fn from_id(id: &str) -> Option<DocumentHandle> {
        let (collection, key) = id.split_once('/')?;
        if collection.is_empty() || key.is_empty() {
            return None;
        }
        Some(DocumentHandle::new(CollectionName::from_raw(collection), key))
    }
}
