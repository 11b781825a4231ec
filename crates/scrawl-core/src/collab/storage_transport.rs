//! Transports backed by a durable storage scope.
//!
//! Envelopes are written under `{prefix}.{shareId}.{timestamp}.{nonce}` with a
//! zero-padded timestamp, so key order is publication order. Two readers
//! consume the log: [`StorageNotifyTransport`] through the store's change
//! feed and [`StoragePollTransport`] by scanning a rolling window.

use super::envelope::Envelope;
use super::transport::{Transport, TransportError};
use crate::storage::{KeyValueStore, SharedStore, StorageChange, keys_with_prefix};
use std::collections::HashSet;
use std::sync::mpsc::Receiver;

/// The per-share envelope log in one storage scope.
#[derive(Clone)]
pub struct EnvelopeLog {
    store: SharedStore,
    /// `{prefix}.{shareId}.`
    share_prefix: String,
    retention: usize,
}

impl EnvelopeLog {
    pub fn new(store: SharedStore, prefix: &str, share_id: &str, retention: usize) -> Self {
        Self {
            store,
            share_prefix: format!("{}.{}.", prefix, share_id),
            retention: retention.max(1),
        }
    }

    pub fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }

    fn key_for(&self, envelope: &Envelope) -> String {
        format!("{}{:016}.{}", self.share_prefix, envelope.timestamp, envelope.nonce)
    }

    /// Timestamp encoded in a log key, if the key belongs to this log.
    pub fn timestamp_of(&self, key: &str) -> Option<u64> {
        let rest = key.strip_prefix(&self.share_prefix)?;
        let (timestamp, _nonce) = rest.split_once('.')?;
        timestamp.parse().ok()
    }

    /// Write `envelope` and prune the log to the retention limit.
    pub fn append(&self, envelope: &Envelope) -> Result<(), TransportError> {
        let json = envelope
            .to_json()
            .map_err(|e| TransportError::Serialization(e.to_string()))?;
        self.store.set(&self.key_for(envelope), &json)?;
        self.prune()
    }

    fn prune(&self) -> Result<(), TransportError> {
        let keys = self.keys()?;
        if keys.len() > self.retention {
            for key in &keys[..keys.len() - self.retention] {
                self.store.remove(key)?;
            }
        }
        Ok(())
    }

    /// Keys in this log, oldest first.
    pub fn keys(&self) -> Result<Vec<String>, TransportError> {
        Ok(keys_with_prefix(self.store.as_ref(), &self.share_prefix)?)
    }

    /// Parse a stored envelope. Malformed entries are logged and skipped.
    fn parse(&self, key: &str, raw: &str) -> Option<Envelope> {
        match Envelope::from_json(raw) {
            Ok(envelope) => Some(envelope),
            Err(e) => {
                log::warn!("Skipping malformed envelope {}: {}", key, e);
                None
            }
        }
    }

    fn owns(&self, key: &str) -> bool {
        key.starts_with(&self.share_prefix)
    }
}

/// Writes envelopes to the log and delivers writes from other contexts via
/// the store's change feed.
pub struct StorageNotifyTransport {
    log: EnvelopeLog,
    feed: Option<Receiver<StorageChange>>,
    closed: bool,
}

impl StorageNotifyTransport {
    pub fn new(log: EnvelopeLog) -> Self {
        let feed = log.store().watch();
        if feed.is_none() {
            log::warn!("Storage has no change notifications; relying on polling");
        }
        Self {
            log,
            feed,
            closed: false,
        }
    }

    pub fn has_feed(&self) -> bool {
        self.feed.is_some()
    }
}

impl Transport for StorageNotifyTransport {
    fn name(&self) -> &'static str {
        "storage-notify"
    }

    fn publish(&mut self, envelope: &Envelope) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        log::debug!("storage: append {:?} seq {}", envelope.kind, envelope.seq);
        self.log.append(envelope)
    }

    fn poll(&mut self, _now: u64) -> Vec<Envelope> {
        let Some(feed) = &self.feed else {
            return Vec::new();
        };
        feed.try_iter()
            .filter(|change| self.log.owns(&change.key))
            .filter_map(|change| {
                let value = change.value?;
                self.log.parse(&change.key, &value)
            })
            .collect()
    }

    fn close(&mut self) {
        self.closed = true;
        self.feed = None;
    }
}

/// Periodically scans the log for envelopes inside a rolling window.
///
/// Read-only: publishing is a no-op, the notify transport owns the writes.
pub struct StoragePollTransport {
    log: EnvelopeLog,
    interval_ms: u64,
    window_ms: u64,
    next_poll: Option<u64>,
    armed: bool,
    delivered: HashSet<String>,
}

impl StoragePollTransport {
    pub fn new(log: EnvelopeLog, interval_ms: u64, window_ms: u64) -> Self {
        Self {
            log,
            interval_ms,
            window_ms,
            next_poll: None,
            armed: true,
            delivered: HashSet::new(),
        }
    }

    /// Whether the poll timer is still running.
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    fn scan(&mut self, now: u64) -> Result<Vec<Envelope>, TransportError> {
        let keys = self.log.keys()?;
        let cutoff = now.saturating_sub(self.window_ms);
        let mut found = Vec::new();
        for key in &keys {
            if self.delivered.contains(key) {
                continue;
            }
            match self.log.timestamp_of(key) {
                Some(ts) if ts >= cutoff => {}
                _ => continue,
            }
            if let Some(raw) = self.log.store().get(key)? {
                if let Some(envelope) = self.log.parse(key, &raw) {
                    found.push(envelope);
                }
            }
            self.delivered.insert(key.clone());
        }
        // Forget keys that were pruned from the log.
        let live: HashSet<&String> = keys.iter().collect();
        self.delivered.retain(|k| live.contains(k));
        Ok(found)
    }
}

impl Transport for StoragePollTransport {
    fn name(&self) -> &'static str {
        "storage-poll"
    }

    fn publish(&mut self, _envelope: &Envelope) -> Result<(), TransportError> {
        Ok(())
    }

    fn poll(&mut self, now: u64) -> Vec<Envelope> {
        if !self.armed {
            return Vec::new();
        }
        if let Some(due) = self.next_poll {
            if now < due {
                return Vec::new();
            }
        }
        self.next_poll = Some(now + self.interval_ms);
        match self.scan(now) {
            Ok(envelopes) => envelopes,
            Err(e) => {
                log::warn!("Envelope poll failed: {}", e);
                Vec::new()
            }
        }
    }

    fn close(&mut self) {
        self.armed = false;
        self.next_poll = None;
        self.delivered.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::envelope::Payload;
    use crate::storage::{MemoryStore, StorageError};
    use std::rc::Rc;

    fn envelope(user: &str, seq: u64, timestamp: u64) -> Envelope {
        Envelope::new(user, &Payload::Leave, timestamp, seq).unwrap()
    }

    fn log_on(store: &MemoryStore, retention: usize) -> EnvelopeLog {
        EnvelopeLog::new(Rc::new(store.clone()), "scrawl.env", "share", retention)
    }

    #[test]
    fn test_append_prunes_to_retention() {
        let store = MemoryStore::new();
        let log = log_on(&store, 3);
        for i in 0..5 {
            log.append(&envelope("a", i, 1_000 + i)).unwrap();
        }
        let keys = log.keys().unwrap();
        assert_eq!(keys.len(), 3);
        assert_eq!(log.timestamp_of(&keys[0]), Some(1_002));
        assert_eq!(log.timestamp_of(&keys[2]), Some(1_004));
    }

    #[test]
    fn test_retention_is_per_share() {
        let store = MemoryStore::new();
        let a = log_on(&store, 1);
        let b = EnvelopeLog::new(Rc::new(store.clone()), "scrawl.env", "other", 1);
        a.append(&envelope("a", 1, 1)).unwrap();
        b.append(&envelope("b", 1, 2)).unwrap();
        a.append(&envelope("a", 2, 3)).unwrap();
        assert_eq!(a.keys().unwrap().len(), 1);
        assert_eq!(b.keys().unwrap().len(), 1);
    }

    #[test]
    fn test_notify_delivers_other_context_writes() {
        let store = MemoryStore::new();
        let mut mine = StorageNotifyTransport::new(log_on(&store, 10));
        let mut theirs = StorageNotifyTransport::new(log_on(&store.context(), 10));
        assert!(mine.has_feed());

        theirs.publish(&envelope("b", 1, 5)).unwrap();
        let received = mine.poll(0);
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].user_id, "b");
        // Own writes are not echoed by the store.
        assert!(theirs.poll(0).is_empty());
    }

    #[test]
    fn test_notify_reports_quota() {
        let store = MemoryStore::with_quota(16);
        let mut transport = StorageNotifyTransport::new(log_on(&store, 10));
        let err = transport.publish(&envelope("a", 1, 1)).unwrap_err();
        assert!(matches!(err, TransportError::Storage(StorageError::QuotaExceeded { .. })));
    }

    #[test]
    fn test_poll_window_and_interval() {
        let store = MemoryStore::new();
        let log = log_on(&store, 10);
        log.append(&envelope("b", 1, 1_000)).unwrap();
        log.append(&envelope("b", 2, 15_000)).unwrap();

        let mut poller = StoragePollTransport::new(log.clone(), 1_000, 10_000);
        let first = poller.poll(20_000);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].seq, 2);

        log.append(&envelope("b", 3, 20_100)).unwrap();
        // Not due yet.
        assert!(poller.poll(20_500).is_empty());
        let second = poller.poll(21_000);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].seq, 3);
    }

    #[test]
    fn test_poll_disarmed_after_close() {
        let store = MemoryStore::new();
        let log = log_on(&store, 10);
        log.append(&envelope("b", 1, 100)).unwrap();
        let mut poller = StoragePollTransport::new(log, 1_000, 10_000);
        poller.close();
        assert!(!poller.is_armed());
        assert!(poller.poll(200).is_empty());
    }

    #[test]
    fn test_malformed_entry_is_skipped() {
        let store = MemoryStore::new();
        let log = log_on(&store, 10);
        store.set("scrawl.env.share.0000000000000100.x", "{").unwrap();
        log.append(&envelope("b", 1, 100)).unwrap();
        let mut poller = StoragePollTransport::new(log, 1_000, 10_000);
        assert_eq!(poller.poll(200).len(), 1);
    }
}
