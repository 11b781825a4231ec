//! Transport abstraction and the same-process channel transport.

use super::envelope::Envelope;
use crate::storage::StorageError;
use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    #[error("Transport unavailable: {0}")]
    Unavailable(String),
    #[error("Transport closed")]
    Closed,
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// One delivery path for envelopes.
///
/// Transports may duplicate or reorder envelopes; the bus de-duplicates.
pub trait Transport {
    fn name(&self) -> &'static str;

    /// Send an envelope to other participants.
    fn publish(&mut self, envelope: &Envelope) -> Result<(), TransportError>;

    /// Envelopes received since the last poll. `now` is in milliseconds.
    fn poll(&mut self, now: u64) -> Vec<Envelope>;

    /// Detach from the underlying channel. Idempotent.
    fn close(&mut self);
}

type Subscribers = HashMap<String, Vec<(u64, Sender<Envelope>)>>;

#[derive(Default)]
struct HubState {
    subscribers: Subscribers,
    next_id: u64,
}

/// Same-process fan-out shared by every participant in one process.
#[derive(Clone, Default)]
pub struct ChannelHub {
    state: Arc<Mutex<HubState>>,
}

impl ChannelHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to the channel for `share_id`.
    pub fn join(&self, share_id: &str) -> ChannelTransport {
        let (tx, rx) = mpsc::channel();
        let id = match self.state.lock() {
            Ok(mut state) => {
                let id = state.next_id;
                state.next_id += 1;
                state
                    .subscribers
                    .entry(share_id.to_string())
                    .or_default()
                    .push((id, tx));
                Some(id)
            }
            Err(e) => {
                log::warn!("Channel hub unavailable: {}", e);
                None
            }
        };
        ChannelTransport {
            hub: self.clone(),
            share_id: share_id.to_string(),
            id,
            rx,
        }
    }

    /// Number of live subscribers for `share_id`.
    pub fn subscriber_count(&self, share_id: &str) -> usize {
        self.state
            .lock()
            .map(|s| s.subscribers.get(share_id).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    fn send(&self, share_id: &str, from: u64, envelope: &Envelope) -> Result<(), TransportError> {
        let mut state = self
            .state
            .lock()
            .map_err(|e| TransportError::Unavailable(e.to_string()))?;
        if let Some(subscribers) = state.subscribers.get_mut(share_id) {
            subscribers.retain(|(id, tx)| *id == from || tx.send(envelope.clone()).is_ok());
        }
        Ok(())
    }

    fn leave(&self, share_id: &str, id: u64) {
        if let Ok(mut state) = self.state.lock() {
            if let Some(subscribers) = state.subscribers.get_mut(share_id) {
                subscribers.retain(|(sub, _)| *sub != id);
                if subscribers.is_empty() {
                    state.subscribers.remove(share_id);
                }
            }
        }
    }
}

/// A participant's handle on a [`ChannelHub`].
pub struct ChannelTransport {
    hub: ChannelHub,
    share_id: String,
    /// `None` once closed, or when the hub could not register us.
    id: Option<u64>,
    rx: Receiver<Envelope>,
}

impl Transport for ChannelTransport {
    fn name(&self) -> &'static str {
        "channel"
    }

    fn publish(&mut self, envelope: &Envelope) -> Result<(), TransportError> {
        let id = self.id.ok_or(TransportError::Closed)?;
        log::debug!("channel: publish {:?} seq {}", envelope.kind, envelope.seq);
        self.hub.send(&self.share_id, id, envelope)
    }

    fn poll(&mut self, _now: u64) -> Vec<Envelope> {
        if self.id.is_none() {
            return Vec::new();
        }
        self.rx.try_iter().collect()
    }

    fn close(&mut self) {
        if let Some(id) = self.id.take() {
            self.hub.leave(&self.share_id, id);
        }
    }
}

impl Drop for ChannelTransport {
    fn drop(&mut self) {
        self.close();
    }
}
