//! Serverless collaboration between contexts sharing a secret share id.
//!
//! Edits and presence travel as [`Envelope`]s over several [`Transport`]s at
//! once: a same-process channel, the durable store's change feed and a
//! periodic poll of the durable store (plus a `BroadcastChannel` on wasm32).
//! Delivery is best-effort and at-least-once; the [`EventBus`] removes
//! duplicates and echoes.

mod bus;
mod envelope;
mod mirror;
mod share;
mod storage_transport;
mod transport;

#[cfg(target_arch = "wasm32")]
mod broadcast;

pub use bus::{ENVELOPE_LOG, EventBus, Peers};
pub use envelope::{ContentPayload, Envelope, EnvelopeKind, Payload, SnapshotPayload, UserInfo};
pub use mirror::{Applied, Mirror, diff};
pub use share::{
    SHARE_RECORD, ShareLink, ShareMetadata, generate_session, join_session, new_share_id,
    parse_share_link, share_link,
};
pub use storage_transport::{EnvelopeLog, StorageNotifyTransport, StoragePollTransport};
pub use transport::{ChannelHub, ChannelTransport, Transport, TransportError};

#[cfg(target_arch = "wasm32")]
pub use broadcast::BroadcastChannelTransport;

use crate::storage::StorageError;
use thiserror::Error;

/// Collaboration errors.
#[derive(Debug, Error)]
pub enum CollabError {
    #[error("Event bus is closed")]
    Closed,
    #[error("Unknown share: {0}")]
    UnknownShare(String),
    #[error("Not collaborating")]
    NotShared,
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}
