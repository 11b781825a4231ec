//! Auto-save functionality for session persistence.
//!
//! The host drives time: [`AutoSave::maybe_save`] is called with the current
//! timestamp and writes the persisted session record when the session is
//! dirty and the interval has elapsed.

use super::{SharedStore, StorageResult, get_json, set_json};
use crate::config::EditorConfig;
use crate::session::{PersistedSession, Session};

/// Name of the persisted session record, under the configured key prefix.
pub const SESSION_RECORD: &str = "session";

/// Manages automatic session persistence.
pub struct AutoSave {
    store: SharedStore,
    key: String,
    interval_ms: u64,
    last_save: Option<u64>,
    dirty: bool,
}

impl AutoSave {
    pub fn new(store: SharedStore, config: &EditorConfig) -> Self {
        Self {
            store,
            key: config.key(SESSION_RECORD),
            interval_ms: config.autosave_interval_ms,
            last_save: None,
            dirty: false,
        }
    }

    /// Mark the session as having unsaved changes.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Check if enough time has passed for an auto-save.
    pub fn should_save(&self, now: u64) -> bool {
        if !self.dirty {
            return false;
        }
        match self.last_save {
            Some(last) => now.saturating_sub(last) >= self.interval_ms,
            None => true,
        }
    }

    /// Save the session if needed (dirty + interval elapsed).
    /// Returns true if a save was performed.
    pub fn maybe_save(&mut self, session: &Session, now: u64) -> StorageResult<bool> {
        if !self.should_save(now) {
            return Ok(false);
        }
        self.save(session, now)?;
        Ok(true)
    }

    /// Force save the session immediately. The dirty flag stays set on
    /// failure so the next tick retries.
    pub fn save(&mut self, session: &Session, now: u64) -> StorageResult<()> {
        let result = set_json(self.store.as_ref(), &self.key, &session.to_persisted());
        // Back off for one interval even after a failure.
        self.last_save = Some(now);
        result?;
        self.dirty = false;
        log::debug!("Autosaved session to {}", self.key);
        Ok(())
    }

    /// Load the last saved session record, if any.
    pub fn load(&self) -> StorageResult<Option<PersistedSession>> {
        get_json(self.store.as_ref(), &self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{KeyValueStore, MemoryStore, StorageError};
    use std::rc::Rc;

    fn autosave(store: &MemoryStore) -> AutoSave {
        let config = EditorConfig {
            autosave_interval_ms: 1_000,
            ..EditorConfig::default()
        };
        AutoSave::new(Rc::new(store.clone()), &config)
    }

    #[test]
    fn test_autosave_dirty_flag() {
        let store = MemoryStore::new();
        let mut manager = autosave(&store);
        assert!(!manager.should_save(0));
        manager.mark_dirty();
        assert!(manager.should_save(0));
    }

    #[test]
    fn test_autosave_respects_interval() {
        let store = MemoryStore::new();
        let mut manager = autosave(&store);
        let session = Session::default();

        manager.mark_dirty();
        assert!(manager.maybe_save(&session, 10_000).unwrap());
        assert!(!manager.is_dirty());

        manager.mark_dirty();
        assert!(!manager.maybe_save(&session, 10_500).unwrap());
        assert!(manager.maybe_save(&session, 11_000).unwrap());
    }

    #[test]
    fn test_autosave_load() {
        let store = MemoryStore::new();
        let mut manager = autosave(&store);
        let session = Session::default();
        manager.mark_dirty();
        manager.save(&session, 0).unwrap();

        assert!(store.get("scrawl.session").unwrap().is_some());
        let loaded = autosave(&store).load().unwrap().unwrap();
        assert_eq!(loaded.current_document_id, session.current_id());
    }

    #[test]
    fn test_failed_save_keeps_dirty() {
        let store = MemoryStore::with_quota(4);
        let mut manager = autosave(&store);
        manager.mark_dirty();
        let err = manager.save(&Session::default(), 0).unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded { .. }));
        assert!(manager.is_dirty());
    }
}
