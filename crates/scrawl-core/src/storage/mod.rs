//! Key-value storage scopes used for session persistence and collaboration.
//!
//! A [`KeyValueStore`] models one browser-like storage scope: string keys to
//! string values, plus an optional change feed that reports writes made by
//! *other* contexts sharing the same backing store.

mod autosave;
mod memory;

#[cfg(not(target_arch = "wasm32"))]
mod file;

#[cfg(target_arch = "wasm32")]
mod web;

pub use autosave::AutoSave;
pub use memory::MemoryStore;

#[cfg(not(target_arch = "wasm32"))]
pub use file::FileStore;

#[cfg(target_arch = "wasm32")]
pub use web::{WebScope, WebStore};

use std::rc::Rc;
use std::sync::mpsc::Receiver;
use thiserror::Error;

/// Storage errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("Storage quota exceeded writing {key}")]
    QuotaExceeded { key: String },
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// A write observed in a shared store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageChange {
    pub key: String,
    /// New value, or `None` when the key was removed.
    pub value: Option<String>,
}

/// One storage scope (session-scoped or durable).
///
/// Note: On native platforms, implementations must be Send + Sync.
/// On WASM, these bounds are relaxed since it's single-threaded.
#[cfg(not(target_arch = "wasm32"))]
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    fn remove(&self, key: &str) -> StorageResult<()>;

    /// All keys currently stored.
    fn keys(&self) -> StorageResult<Vec<String>>;

    /// Subscribe to writes made by other contexts. `None` when the backend
    /// has no change notifications.
    fn watch(&self) -> Option<Receiver<StorageChange>> {
        None
    }
}

/// One storage scope (WASM version without Send + Sync).
#[cfg(target_arch = "wasm32")]
pub trait KeyValueStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    fn remove(&self, key: &str) -> StorageResult<()>;

    /// All keys currently stored.
    fn keys(&self) -> StorageResult<Vec<String>>;

    /// Subscribe to writes made by other contexts. `None` when the backend
    /// has no change notifications.
    fn watch(&self) -> Option<Receiver<StorageChange>> {
        None
    }
}

/// Shared handle to a storage scope.
pub type SharedStore = Rc<dyn KeyValueStore>;

/// Keys starting with `prefix`, sorted.
pub fn keys_with_prefix(store: &dyn KeyValueStore, prefix: &str) -> StorageResult<Vec<String>> {
    let mut keys: Vec<String> = store
        .keys()?
        .into_iter()
        .filter(|k| k.starts_with(prefix))
        .collect();
    keys.sort();
    Ok(keys)
}

/// Serialize `value` as JSON under `key`.
pub fn set_json<T: serde::Serialize>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> StorageResult<()> {
    let json =
        serde_json::to_string(value).map_err(|e| StorageError::Serialization(e.to_string()))?;
    store.set(key, &json)
}

/// Read and deserialize the JSON value under `key`.
pub fn get_json<T: serde::de::DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> StorageResult<Option<T>> {
    match store.get(key)? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| StorageError::Serialization(format!("Failed to parse {}: {}", key, e))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_keys_with_prefix_sorted() {
        let store = MemoryStore::new();
        store.set("a.2", "x").unwrap();
        store.set("a.1", "x").unwrap();
        store.set("b.1", "x").unwrap();
        assert_eq!(keys_with_prefix(&store, "a.").unwrap(), vec!["a.1", "a.2"]);
    }

    #[test]
    fn test_json_helpers() {
        let store = MemoryStore::new();
        let mut value = BTreeMap::new();
        value.insert("k".to_string(), 3);
        set_json(&store, "rec", &value).unwrap();
        let back: Option<BTreeMap<String, i32>> = get_json(&store, "rec").unwrap();
        assert_eq!(back, Some(value));

        store.set("bad", "{").unwrap();
        let err = get_json::<BTreeMap<String, i32>>(&store, "bad").unwrap_err();
        assert!(matches!(err, StorageError::Serialization(_)));
        assert_eq!(get_json::<i32>(&store, "missing").unwrap(), None);
    }
}
