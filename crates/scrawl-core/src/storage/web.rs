//! Browser `sessionStorage` / `localStorage` scopes.

use super::{KeyValueStore, StorageChange, StorageError, StorageResult};
use std::cell::RefCell;
use std::sync::mpsc::{self, Receiver};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{Storage, StorageEvent};

/// Which browser storage area a [`WebStore`] wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebScope {
    /// Per-tab `sessionStorage`.
    Session,
    /// Durable, origin-wide `localStorage`.
    Local,
}

/// A browser storage area.
pub struct WebStore {
    scope: WebScope,
    storage: Storage,
    // Keep listeners alive for as long as the store exists.
    listeners: RefCell<Vec<Closure<dyn Fn(StorageEvent)>>>,
}

impl WebStore {
    pub fn open(scope: WebScope) -> StorageResult<Self> {
        let window = web_sys::window()
            .ok_or_else(|| StorageError::Unavailable("No window".to_string()))?;
        let storage = match scope {
            WebScope::Session => window.session_storage(),
            WebScope::Local => window.local_storage(),
        }
        .map_err(|e| StorageError::Unavailable(format!("{:?}", e)))?
        .ok_or_else(|| StorageError::Unavailable(format!("{:?} storage disabled", scope)))?;
        Ok(Self {
            scope,
            storage,
            listeners: RefCell::new(Vec::new()),
        })
    }

    pub fn scope(&self) -> WebScope {
        self.scope
    }
}

fn js_error(e: JsValue) -> StorageError {
    StorageError::Io(format!("{:?}", e))
}

fn is_quota_error(e: &JsValue) -> bool {
    e.dyn_ref::<js_sys::Error>()
        .map(|err| {
            let name: String = err.name().into();
            name == "QuotaExceededError" || name == "NS_ERROR_DOM_QUOTA_REACHED"
        })
        .unwrap_or(false)
}

impl KeyValueStore for WebStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.storage.get_item(key).map_err(js_error)
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.storage.set_item(key, value).map_err(|e| {
            if is_quota_error(&e) {
                StorageError::QuotaExceeded { key: key.to_string() }
            } else {
                js_error(e)
            }
        })
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.storage.remove_item(key).map_err(js_error)
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        let len = self.storage.length().map_err(js_error)?;
        let mut keys = Vec::with_capacity(len as usize);
        for i in 0..len {
            if let Some(key) = self.storage.key(i).map_err(js_error)? {
                keys.push(key);
            }
        }
        Ok(keys)
    }

    /// `storage` events only fire for the durable scope in other tabs.
    fn watch(&self) -> Option<Receiver<StorageChange>> {
        if self.scope != WebScope::Local {
            return None;
        }
        let window = web_sys::window()?;
        let (tx, rx) = mpsc::channel();
        let on_storage = Closure::wrap(Box::new(move |e: StorageEvent| {
            if let Some(key) = e.key() {
                let _ = tx.send(StorageChange {
                    key,
                    value: e.new_value(),
                });
            }
        }) as Box<dyn Fn(StorageEvent)>);
        let callback = on_storage.as_ref().unchecked_ref();
        if let Err(e) = window.add_event_listener_with_callback("storage", callback) {
            log::warn!("Failed to watch storage: {:?}", e);
            return None;
        }
        self.listeners.borrow_mut().push(on_storage);
        Some(rx)
    }
}

impl Drop for WebStore {
    fn drop(&mut self) {
        let Some(window) = web_sys::window() else {
            return;
        };
        for listener in self.listeners.borrow_mut().drain(..) {
            let callback = listener.as_ref().unchecked_ref();
            let _ = window.remove_event_listener_with_callback("storage", callback);
        }
    }
}
