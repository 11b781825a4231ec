//! In-memory storage implementation.

use super::{KeyValueStore, StorageChange, StorageError, StorageResult};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, RwLock};

#[derive(Default)]
struct Shared {
    entries: RwLock<BTreeMap<String, String>>,
    /// Maximum total size of keys and values, in bytes.
    quota: RwLock<Option<usize>>,
    watchers: Mutex<Vec<(u64, Sender<StorageChange>)>>,
    next_context: AtomicU64,
}

/// In-memory storage for tests and ephemeral use.
///
/// Cloning yields a handle to the same store within the same context.
/// [`MemoryStore::context`] yields a handle that behaves like another tab
/// sharing the store: its writes are reported to this handle's watchers and
/// vice versa.
#[derive(Clone)]
pub struct MemoryStore {
    shared: Arc<Shared>,
    context: u64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        let shared = Arc::new(Shared::default());
        let context = shared.next_context.fetch_add(1, Ordering::Relaxed);
        Self { shared, context }
    }

    /// Create a store that rejects writes past `bytes` total size.
    pub fn with_quota(bytes: usize) -> Self {
        let store = Self::new();
        store.set_quota(Some(bytes));
        store
    }

    /// A handle for another context sharing this store.
    pub fn context(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            context: self.shared.next_context.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn set_quota(&self, bytes: Option<usize>) {
        if let Ok(mut quota) = self.shared.quota.write() {
            *quota = bytes;
        }
    }

    pub fn len(&self) -> usize {
        self.shared.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn notify(&self, key: &str, value: Option<&str>) {
        let Ok(mut watchers) = self.shared.watchers.lock() else {
            return;
        };
        let change = StorageChange {
            key: key.to_string(),
            value: value.map(str::to_string),
        };
        watchers
            .retain(|(context, tx)| *context == self.context || tx.send(change.clone()).is_ok());
    }
}

fn lock_error(e: impl std::fmt::Display) -> StorageError {
    StorageError::Unavailable(format!("Lock error: {}", e))
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let entries = self.shared.entries.read().map_err(lock_error)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        {
            let mut entries = self.shared.entries.write().map_err(lock_error)?;
            let quota = *self.shared.quota.read().map_err(lock_error)?;
            if let Some(quota) = quota {
                let used: usize = entries
                    .iter()
                    .filter(|(k, _)| k.as_str() != key)
                    .map(|(k, v)| k.len() + v.len())
                    .sum();
                if used + key.len() + value.len() > quota {
                    return Err(StorageError::QuotaExceeded { key: key.to_string() });
                }
            }
            entries.insert(key.to_string(), value.to_string());
        }
        self.notify(key, Some(value));
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let removed = {
            let mut entries = self.shared.entries.write().map_err(lock_error)?;
            entries.remove(key).is_some()
        };
        if removed {
            self.notify(key, None);
        }
        Ok(())
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        let entries = self.shared.entries.read().map_err(lock_error)?;
        Ok(entries.keys().cloned().collect())
    }

    fn watch(&self) -> Option<Receiver<StorageChange>> {
        let (tx, rx) = mpsc::channel();
        self.shared.watchers.lock().ok()?.push((self.context, tx));
        Some(rx)
    }
}
