//! De-duplicating event bus over a set of transports.

use super::CollabError;
use super::envelope::{Envelope, EnvelopeKind, Payload, UserInfo};
use super::storage_transport::{EnvelopeLog, StorageNotifyTransport, StoragePollTransport};
use super::transport::{ChannelHub, Transport, TransportError};
use crate::config::EditorConfig;
use crate::notice::Notice;
use crate::storage::{SharedStore, StorageError};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Participants keyed by user id.
pub type Peers = BTreeMap<String, UserInfo>;

type EventListener = Box<dyn FnMut(&Envelope)>;
type PresenceListener = Box<dyn FnMut(&Peers)>;

/// Name of the envelope log record, under the configured key prefix.
pub const ENVELOPE_LOG: &str = "env";

/// Sequence numbers remembered per sender below its highest `seq`.
const SEQ_WINDOW: u64 = 256;

/// Recently delivered `seq`s of one sender.
///
/// Anything more than [`SEQ_WINDOW`] behind the highest `seq` is treated as
/// already delivered, so memory stays bounded however long the share runs.
#[derive(Debug, Default)]
struct SeqWindow {
    high: u64,
    recent: BTreeSet<u64>,
}

impl SeqWindow {
    /// Record `seq`; false when it was delivered before or is too old.
    fn insert(&mut self, seq: u64) -> bool {
        if seq.saturating_add(SEQ_WINDOW) <= self.high || !self.recent.insert(seq) {
            return false;
        }
        if seq > self.high {
            self.high = seq;
            let floor = self.high.saturating_sub(SEQ_WINDOW);
            self.recent = self.recent.split_off(&floor);
        }
        true
    }

    fn len(&self) -> usize {
        self.recent.len()
    }
}

/// Publish/subscribe façade for one share.
///
/// Every envelope carries a per-user `seq`; the bus drops any `(userId, seq)`
/// it has already delivered, as well as echoes of its own envelopes, so any
/// number of transports can deliver the same event.
pub struct EventBus {
    share_id: String,
    user_id: String,
    user: UserInfo,
    transports: Vec<Box<dyn Transport>>,
    next_seq: u64,
    seen: HashMap<String, SeqWindow>,
    /// Highest presence `seq` applied per user.
    presence_seq: HashMap<String, u64>,
    peers: Peers,
    event_listeners: Vec<EventListener>,
    presence_listeners: Vec<PresenceListener>,
    notices: Vec<Notice>,
    closed: bool,
}

impl EventBus {
    pub fn new(share_id: impl Into<String>, user_id: impl Into<String>, user: UserInfo) -> Self {
        let user_id = user_id.into();
        let mut peers = Peers::new();
        peers.insert(user_id.clone(), user.clone());
        Self {
            share_id: share_id.into(),
            user_id,
            user,
            transports: Vec::new(),
            next_seq: 1,
            seen: HashMap::new(),
            presence_seq: HashMap::new(),
            peers,
            event_listeners: Vec::new(),
            presence_listeners: Vec::new(),
            notices: Vec::new(),
            closed: false,
        }
    }

    /// Attach the standard delivery paths: the same-process channel (when a
    /// hub is given), the durable store's change feed and the poller. On
    /// wasm32 a `BroadcastChannel` is added when available.
    pub fn attach_defaults(
        &mut self,
        hub: Option<&ChannelHub>,
        durable: Option<SharedStore>,
        config: &EditorConfig,
    ) {
        if let Some(hub) = hub {
            self.add_transport(Box::new(hub.join(&self.share_id)));
        }
        if let Some(store) = durable {
            let log = EnvelopeLog::new(
                store,
                &config.key(ENVELOPE_LOG),
                &self.share_id,
                config.envelope_retention,
            );
            self.add_transport(Box::new(StorageNotifyTransport::new(log.clone())));
            self.add_transport(Box::new(StoragePollTransport::new(
                log,
                config.poll_interval_ms,
                config.envelope_window_ms,
            )));
        }
        #[cfg(target_arch = "wasm32")]
        match super::broadcast::BroadcastChannelTransport::open(
            &config.key(ENVELOPE_LOG),
            &self.share_id,
        ) {
            Ok(transport) => self.add_transport(Box::new(transport)),
            Err(e) => log::warn!("Broadcast channel unavailable: {}", e),
        }
    }

    pub fn add_transport(&mut self, transport: Box<dyn Transport>) {
        log::debug!("Bus {}: attached {} transport", self.share_id, transport.name());
        self.transports.push(transport);
    }

    pub fn share_id(&self) -> &str {
        &self.share_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn user(&self) -> &UserInfo {
        &self.user
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn transport_names(&self) -> Vec<&'static str> {
        self.transports.iter().map(|t| t.name()).collect()
    }

    /// Participants, always including the local user.
    pub fn peers(&self) -> &Peers {
        &self.peers
    }

    pub fn on_event(&mut self, listener: impl FnMut(&Envelope) + 'static) {
        self.event_listeners.push(Box::new(listener));
    }

    pub fn on_presence_change(&mut self, listener: impl FnMut(&Peers) + 'static) {
        self.presence_listeners.push(Box::new(listener));
    }

    /// Notices raised since the last call, e.g. failed storage writes.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Announce the local user.
    pub fn join(&mut self, now: u64) -> Result<u64, CollabError> {
        log::info!("Joining share {} as {}", self.share_id, self.user_id);
        self.publish(&Payload::Join(self.user.clone()), now)
    }

    /// Send `payload` on every transport. Returns the envelope's `seq`.
    ///
    /// Transport failures never fail the call: unavailable transports are
    /// skipped and storage faults are surfaced as notices.
    pub fn publish(&mut self, payload: &Payload, now: u64) -> Result<u64, CollabError> {
        if self.closed {
            return Err(CollabError::Closed);
        }
        let seq = self.next_seq;
        let envelope = Envelope::new(&self.user_id, payload, now, seq)?;
        self.next_seq += 1;

        let mut failures = Vec::new();
        for transport in &mut self.transports {
            if let Err(e) = transport.publish(&envelope) {
                failures.push((transport.name(), e));
            }
        }
        for (name, error) in failures {
            self.transport_failed(name, error);
        }
        Ok(seq)
    }

    fn transport_failed(&mut self, name: &str, error: TransportError) {
        match error {
            TransportError::Storage(StorageError::QuotaExceeded { key }) => {
                log::error!("{}: storage quota exceeded writing {}", name, key);
                self.notices.push(Notice::error(
                    "Storage is full; changes may not reach other tabs",
                ));
            }
            TransportError::Storage(e) => {
                log::error!("{}: storage write failed: {}", name, e);
                self.notices.push(Notice::warning(format!("Could not share change: {}", e)));
            }
            other => log::warn!("{}: {}", name, other),
        }
    }

    /// Drain every transport and return the envelopes not seen before.
    /// Listeners are notified before this returns.
    pub fn tick(&mut self, now: u64) -> Vec<Envelope> {
        if self.closed {
            return Vec::new();
        }
        let mut incoming = Vec::new();
        for transport in &mut self.transports {
            incoming.extend(transport.poll(now));
        }

        let mut fresh = Vec::new();
        let mut presence_changed = false;
        for envelope in incoming {
            if envelope.user_id == self.user_id {
                continue;
            }
            let window = self.seen.entry(envelope.user_id.clone()).or_default();
            if !window.insert(envelope.seq) {
                continue;
            }
            log::debug!(
                "Bus {}: {:?} from {} seq {}",
                self.share_id,
                envelope.kind,
                envelope.user_id,
                envelope.seq
            );
            presence_changed |= self.fold_presence(&envelope);
            for listener in &mut self.event_listeners {
                listener(&envelope);
            }
            fresh.push(envelope);
        }

        if presence_changed {
            for listener in &mut self.presence_listeners {
                listener(&self.peers);
            }
        }
        fresh
    }

    /// Apply `join`/`leave` to the peer set. Older presence envelopes from
    /// the same user are ignored, so a reordered `join` cannot revive a peer
    /// that already left.
    fn fold_presence(&mut self, envelope: &Envelope) -> bool {
        if !matches!(envelope.kind, EnvelopeKind::Join | EnvelopeKind::Leave) {
            return false;
        }
        let last = self.presence_seq.entry(envelope.user_id.clone()).or_insert(0);
        if envelope.seq < *last {
            return false;
        }
        *last = envelope.seq;

        match envelope.kind {
            EnvelopeKind::Join => {
                let info = match envelope.payload() {
                    Ok(Payload::Join(info)) => info,
                    _ => UserInfo::anonymous(&envelope.user_id),
                };
                let previous = self.peers.insert(envelope.user_id.clone(), info.clone());
                if previous.is_none() {
                    log::info!("Peer {} joined share {}", envelope.user_id, self.share_id);
                }
                previous.as_ref() != Some(&info)
            }
            _ => {
                let removed = self.peers.remove(&envelope.user_id).is_some();
                if removed {
                    log::info!("Peer {} left share {}", envelope.user_id, self.share_id);
                }
                removed
            }
        }
    }

    /// Announce departure, detach every transport and clear all state.
    /// Always runs to completion; calling it again does nothing.
    pub fn leave(&mut self, now: u64) {
        if self.closed {
            return;
        }
        if let Err(e) = self.publish(&Payload::Leave, now) {
            log::warn!("Failed to announce leave: {}", e);
        }
        self.closed = true;
        for transport in &mut self.transports {
            transport.close();
        }
        self.transports.clear();
        self.event_listeners.clear();
        self.presence_listeners.clear();
        self.seen.clear();
        self.presence_seq.clear();
        self.peers.retain(|id, _| *id == self.user_id);
        log::info!("Left share {}", self.share_id);
    }
}

impl Drop for EventBus {
    fn drop(&mut self) {
        self.leave(crate::time::now_millis());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn bus(hub: &ChannelHub, store: Option<&MemoryStore>, user: &str) -> EventBus {
        let mut bus = EventBus::new("share", user, UserInfo::new(user, "#000000"));
        let durable = store.map(|s| Rc::new(s.context()) as SharedStore);
        bus.attach_defaults(Some(hub), durable, &EditorConfig::default());
        bus
    }

    #[test]
    fn test_local_user_always_present() {
        let hub = ChannelHub::new();
        let mut a = bus(&hub, None, "a");
        assert!(a.peers().contains_key("a"));
        a.leave(0);
        assert_eq!(a.peers().len(), 1);
        assert!(a.is_closed());
    }

    #[test]
    fn test_join_via_channel_and_poll_yields_one_peer() {
        let hub = ChannelHub::new();
        let store = MemoryStore::new();
        let mut a = bus(&hub, Some(&store), "a");
        let mut b = bus(&hub, Some(&store), "b");

        let presence_calls = Rc::new(RefCell::new(0));
        let calls = presence_calls.clone();
        a.on_presence_change(move |_| *calls.borrow_mut() += 1);

        b.join(1_000).unwrap();
        // Channel, change feed and poller all deliver the same join.
        let received = a.tick(1_500);
        assert_eq!(received.len(), 1);
        assert!(a.tick(3_000).is_empty());

        assert_eq!(a.peers().len(), 2);
        assert!(a.peers().contains_key("b"));
        assert_eq!(*presence_calls.borrow(), 1);
    }

    #[test]
    fn test_own_envelopes_are_not_echoed() {
        let hub = ChannelHub::new();
        let store = MemoryStore::new();
        let mut a = bus(&hub, Some(&store), "a");
        a.join(1_000).unwrap();
        assert!(a.tick(1_500).is_empty());
    }

    #[test]
    fn test_cursor_does_not_change_presence() {
        let hub = ChannelHub::new();
        let mut a = bus(&hub, None, "a");
        let mut b = bus(&hub, None, "b");

        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        a.on_event(move |e| sink.borrow_mut().push(e.kind));

        b.publish(&Payload::Cursor(kurbo::Point::new(1.0, 2.0)), 0).unwrap();
        a.tick(0);
        assert_eq!(*events.borrow(), vec![EnvelopeKind::Cursor]);
        assert_eq!(a.peers().len(), 1);
    }

    #[test]
    fn test_leave_removes_peer_and_late_join_is_ignored() {
        let hub = ChannelHub::new();
        let mut a = bus(&hub, None, "a");
        let mut b = EventBus::new("share", "b", UserInfo::new("b", "#111111"));
        let mut raw = hub.join("share");

        let join = Envelope::new("b", &Payload::Join(b.user().clone()), 0, 1).unwrap();
        let leave = Envelope::new("b", &Payload::Leave, 0, 2).unwrap();
        raw.publish(&leave).unwrap();
        raw.publish(&join).unwrap();
        a.tick(0);
        assert!(!a.peers().contains_key("b"));

        b.leave(0);
    }

    #[test]
    fn test_dedup_memory_stays_bounded() {
        let hub = ChannelHub::new();
        let mut a = bus(&hub, None, "a");
        let mut raw = hub.join("share");
        let cursor = |seq: u64| {
            let point = kurbo::Point::new(seq as f64, 0.0);
            Envelope::new("b", &Payload::Cursor(point), 0, seq).unwrap()
        };

        for seq in 1..=10_000 {
            raw.publish(&cursor(seq)).unwrap();
            assert_eq!(a.tick(0).len(), 1);
            a.publish(&Payload::Cursor(kurbo::Point::ZERO), 0).unwrap();
        }
        assert_eq!(a.seen.len(), 1);
        assert!(a.seen["b"].len() <= SEQ_WINDOW as usize + 1);

        // Replays, recent or long past, are still dropped.
        raw.publish(&cursor(9_990)).unwrap();
        raw.publish(&cursor(3)).unwrap();
        assert!(a.tick(0).is_empty());
    }

    #[test]
    fn test_reordered_envelopes_within_window_are_delivered() {
        let mut window = SeqWindow::default();
        assert!(window.insert(5));
        assert!(window.insert(3));
        assert!(window.insert(4));
        assert!(!window.insert(3));
        assert!(window.insert(SEQ_WINDOW + 10));
        assert!(!window.insert(5));
        assert!(window.insert(20));
    }

    #[test]
    fn test_leave_announces_and_detaches() {
        let hub = ChannelHub::new();
        let mut a = bus(&hub, None, "a");
        let mut b = bus(&hub, None, "b");
        b.join(0).unwrap();
        a.tick(0);
        assert_eq!(a.peers().len(), 2);

        b.leave(10);
        b.leave(20);
        assert!(b.publish(&Payload::Leave, 30).is_err());
        a.tick(10);
        assert_eq!(a.peers().len(), 1);
        assert_eq!(hub.subscriber_count("share"), 1);
    }

    #[test]
    fn test_drop_leaves() {
        let hub = ChannelHub::new();
        let mut a = bus(&hub, None, "a");
        {
            let mut b = bus(&hub, None, "b");
            b.join(0).unwrap();
            a.tick(0);
        }
        a.tick(0);
        assert_eq!(a.peers().len(), 1);
    }

    #[test]
    fn test_quota_failure_becomes_notice() {
        let hub = ChannelHub::new();
        let store = MemoryStore::with_quota(8);
        let mut a = bus(&hub, Some(&store), "a");
        let mut b = bus(&hub, None, "b");

        assert!(a.join(0).is_ok());
        let notices = a.take_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, crate::notice::NoticeLevel::Error);
        // The channel still delivered.
        assert_eq!(b.tick(0).len(), 1);
    }
}
