//! Session-wide content cache: contentId → binary payload.
//!
//! Image elements only carry a [`ContentId`]; the pixels live here so that
//! snapshots stay small and history entries never copy payloads. Entries are
//! append-only for the lifetime of the session.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Key into the [`ContentCache`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(String);

impl ContentId {
    /// Mint a fresh, unique content id.
    pub fn mint() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ContentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ContentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Payload format, sniffed from magic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentFormat {
    Png,
    Jpeg,
    WebP,
    Unknown,
}

impl ContentFormat {
    /// Get MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            ContentFormat::Png => "image/png",
            ContentFormat::Jpeg => "image/jpeg",
            ContentFormat::WebP => "image/webp",
            ContentFormat::Unknown => "application/octet-stream",
        }
    }

    /// Detect format from magic bytes.
    pub fn sniff(data: &[u8]) -> Self {
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
            return ContentFormat::Png;
        }
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return ContentFormat::Jpeg;
        }
        if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            return ContentFormat::WebP;
        }
        ContentFormat::Unknown
    }
}

/// A cached payload with its natural pixel size.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentEntry {
    pub bytes: Arc<[u8]>,
    pub width: u32,
    pub height: u32,
    pub format: ContentFormat,
}

impl ContentEntry {
    pub fn new(bytes: impl Into<Arc<[u8]>>, width: u32, height: u32) -> Self {
        let bytes = bytes.into();
        let format = ContentFormat::sniff(&bytes);
        Self {
            bytes,
            width,
            height,
            format,
        }
    }
}

/// Append-only map from [`ContentId`] to payload.
#[derive(Debug, Clone, Default)]
pub struct ContentCache {
    entries: HashMap<ContentId, ContentEntry>,
}

impl ContentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a payload under a freshly minted id.
    pub fn insert(&mut self, bytes: impl Into<Arc<[u8]>>, width: u32, height: u32) -> ContentId {
        let id = ContentId::mint();
        self.entries.insert(id.clone(), ContentEntry::new(bytes, width, height));
        log::debug!("Cached content {} ({}x{})", id, width, height);
        id
    }

    /// Store a payload under a known id (content received from a peer).
    /// An existing entry is kept.
    pub fn insert_with_id(&mut self, id: ContentId, entry: ContentEntry) {
        self.entries.entry(id).or_insert(entry);
    }

    /// Copy an entry under a new id. The payload bytes are shared.
    pub fn duplicate(&mut self, id: &ContentId) -> Option<ContentId> {
        let entry = self.entries.get(id)?.clone();
        let new_id = ContentId::mint();
        self.entries.insert(new_id.clone(), entry);
        Some(new_id)
    }

    pub fn get(&self, id: &ContentId) -> Option<&ContentEntry> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &ContentId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
