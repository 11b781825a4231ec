//! Share identifiers, session metadata and share links.

use super::CollabError;
use crate::config::EditorConfig;
use crate::session::DocumentId;
use crate::storage::{KeyValueStore, get_json, set_json};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Name of the share metadata records, under the configured key prefix.
pub const SHARE_RECORD: &str = "share";

/// Metadata written when a share is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareMetadata {
    pub share_id: String,
    pub document_id: DocumentId,
    pub host_id: String,
    pub created_at: u64,
}

/// A new share identifier: the 128 random bits of a v4 UUID (122 of them
/// random) in URL-safe base64.
pub fn new_share_id() -> String {
    URL_SAFE_NO_PAD.encode(Uuid::new_v4().as_bytes())
}

fn metadata_key(config: &EditorConfig, share_id: &str) -> String {
    format!("{}.{}", config.key(SHARE_RECORD), share_id)
}

/// Create a share for `document_id` and record its metadata in both the
/// session-scoped and the durable store.
///
/// Succeeds when at least one scope accepted the write.
pub fn generate_session(
    session_store: &dyn KeyValueStore,
    durable_store: &dyn KeyValueStore,
    config: &EditorConfig,
    document_id: DocumentId,
    host_id: &str,
    now: u64,
) -> Result<ShareMetadata, CollabError> {
    let metadata = ShareMetadata {
        share_id: new_share_id(),
        document_id,
        host_id: host_id.to_string(),
        created_at: now,
    };
    let key = metadata_key(config, &metadata.share_id);
    let session_write = set_json(session_store, &key, &metadata);
    let durable_write = set_json(durable_store, &key, &metadata);
    match (session_write, durable_write) {
        (Err(e), Err(_)) => {
            log::error!("Failed to record share {}: {}", metadata.share_id, e);
            return Err(e.into());
        }
        (Err(e), Ok(())) | (Ok(()), Err(e)) => {
            log::error!("Share {} recorded in one scope only: {}", metadata.share_id, e);
        }
        (Ok(()), Ok(())) => {}
    }
    log::info!("Created share {} for document {}", metadata.share_id, document_id);
    Ok(metadata)
}

/// Look up share metadata in the session scope, then the durable scope.
/// Metadata found only in the durable scope is copied into the session.
pub fn join_session(
    session_store: &dyn KeyValueStore,
    durable_store: &dyn KeyValueStore,
    config: &EditorConfig,
    share_id: &str,
) -> Result<ShareMetadata, CollabError> {
    let key = metadata_key(config, share_id);
    if let Some(metadata) = get_json::<ShareMetadata>(session_store, &key)? {
        return Ok(metadata);
    }
    let metadata: ShareMetadata =
        get_json(durable_store, &key)?
                .ok_or_else(|| CollabError::UnknownShare(share_id.to_string()))?;
    if let Err(e) = set_json(session_store, &key, &metadata) {
        log::warn!("Could not cache share {} in session: {}", share_id, e);
    }
    Ok(metadata)
}

/// Parameters carried by a share link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareLink {
    pub share_id: String,
    pub document_id: Option<DocumentId>,
}

/// `<base>?share=<shareId>&doc=<documentId>`. Any query or fragment already
/// on `base` is dropped.
pub fn share_link(base: &str, share_id: &str, document_id: DocumentId) -> String {
    let base = base.split(['?', '#']).next().unwrap_or(base);
    format!("{}?share={}&doc={}", base, share_id, document_id)
}

/// Extract share parameters from a URL's query or fragment.
pub fn parse_share_link(url: &str) -> Option<ShareLink> {
    let (before_fragment, fragment) = match url.split_once('#') {
        Some((head, fragment)) => (head, Some(fragment)),
        None => (url, None),
    };
    let query = before_fragment.split_once('?').map(|(_, q)| q);

    let mut share_id = None;
    let mut document_id = None;
    for part in [query, fragment].into_iter().flatten() {
        let (share, doc) = parse_params(part);
        share_id = share_id.or(share);
        document_id = document_id.or(doc);
    }

    Some(ShareLink {
        share_id: share_id?,
        document_id: document_id.and_then(|d| Uuid::parse_str(&d).ok()),
    })
}

fn parse_params(s: &str) -> (Option<String>, Option<String>) {
    let s = s.trim_start_matches(['?', '#']);

    let mut share = None;
    let mut doc = None;

    for pair in s.split('&') {
        let mut parts = pair.splitn(2, '=');
        if let (Some(key), Some(value)) = (parts.next(), parts.next()) {
            if !value.is_empty() {
                match key {
                    "share" => share = Some(value.to_string()),
                    "doc" => doc = Some(value.to_string()),
                    _ => {}
                }
            }
        }
    }

    (share, doc)
}
