//! Wire format for collaboration events.

use super::CollabError;
use crate::content::ContentId;
use crate::element::{Element, ElementId};
use crate::history::Snapshot;
use crate::session::DocumentId;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use kurbo::Point;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Envelope kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeKind {
    Join,
    Leave,
    Upsert,
    Remove,
    Snapshot,
    Content,
    Cursor,
}

/// One event on the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: EnvelopeKind,
    pub user_id: String,
    #[serde(default)]
    pub data: serde_json::Value,
    /// Milliseconds since the Unix epoch, set by the sender.
    pub timestamp: u64,
    /// Per-user monotonic counter.
    #[serde(default)]
    pub seq: u64,
    #[serde(default)]
    pub nonce: String,
}

/// Display info for a participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub name: String,
    /// Hex color string.
    pub color: String,
}

impl UserInfo {
    pub fn new(name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: color.into(),
        }
    }

    /// A generated name and color for an anonymous participant.
    pub fn anonymous(user_id: &str) -> Self {
        const COLORS: [&str; 6] = [
            "#e03131", "#1971c2", "#2f9e44", "#f08c00", "#9c36b5", "#0c8599",
        ];
        let hash = user_id
            .bytes()
            .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
        let short: String = user_id.chars().take(4).collect();
        Self::new(format!("Guest {}", short), COLORS[hash % COLORS.len()])
    }
}

/// An image payload in transit. The bytes are base64 encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentPayload {
    pub content_id: ContentId,
    pub width: u32,
    pub height: u32,
    pub bytes: String,
}

impl ContentPayload {
    pub fn encode(content_id: ContentId, bytes: &[u8], width: u32, height: u32) -> Self {
        Self {
            content_id,
            width,
            height,
            bytes: STANDARD.encode(bytes),
        }
    }

    pub fn decode_bytes(&self) -> Result<Vec<u8>, CollabError> {
        STANDARD
            .decode(&self.bytes)
            .map_err(|e| CollabError::InvalidPayload(format!("content {}: {}", self.content_id, e)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotPayload {
    pub document_id: DocumentId,
    pub elements: Snapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct RemovePayload {
    id: ElementId,
}

/// Decoded envelope data.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Join(UserInfo),
    Leave,
    Upsert(Element),
    Remove(ElementId),
    Snapshot(SnapshotPayload),
    Content(ContentPayload),
    Cursor(Point),
}

impl Payload {
    pub fn kind(&self) -> EnvelopeKind {
        match self {
            Payload::Join(_) => EnvelopeKind::Join,
            Payload::Leave => EnvelopeKind::Leave,
            Payload::Upsert(_) => EnvelopeKind::Upsert,
            Payload::Remove(_) => EnvelopeKind::Remove,
            Payload::Snapshot(_) => EnvelopeKind::Snapshot,
            Payload::Content(_) => EnvelopeKind::Content,
            Payload::Cursor(_) => EnvelopeKind::Cursor,
        }
    }

    fn to_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            Payload::Join(user) => serde_json::to_value(user),
            Payload::Leave => Ok(serde_json::Value::Null),
            Payload::Upsert(element) => serde_json::to_value(element),
            Payload::Remove(id) => serde_json::to_value(RemovePayload { id: *id }),
            Payload::Snapshot(snapshot) => serde_json::to_value(snapshot),
            Payload::Content(content) => serde_json::to_value(content),
            Payload::Cursor(point) => serde_json::to_value(point),
        }
    }
}

impl Envelope {
    /// Wrap `payload` for sending. A fresh nonce is minted.
    pub fn new(
        user_id: &str,
        payload: &Payload,
        timestamp: u64,
        seq: u64,
    ) -> Result<Self, CollabError> {
        Ok(Self {
            kind: payload.kind(),
            user_id: user_id.to_string(),
            data: payload.to_value()?,
            timestamp,
            seq,
            nonce: Uuid::new_v4().simple().to_string(),
        })
    }

    /// Decode `data` according to `kind`.
    pub fn payload(&self) -> Result<Payload, CollabError> {
        let data = self.data.clone();
        let payload = match self.kind {
            EnvelopeKind::Join => Payload::Join(serde_json::from_value(data)?),
            EnvelopeKind::Leave => Payload::Leave,
            EnvelopeKind::Upsert => Payload::Upsert(serde_json::from_value(data)?),
            EnvelopeKind::Remove => {
                Payload::Remove(serde_json::from_value::<RemovePayload>(data)?.id)
            }
            EnvelopeKind::Snapshot => Payload::Snapshot(serde_json::from_value(data)?),
            EnvelopeKind::Content => Payload::Content(serde_json::from_value(data)?),
            EnvelopeKind::Cursor => Payload::Cursor(serde_json::from_value(data)?),
        };
        Ok(payload)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Text;

    #[test]
    fn test_wire_field_names() {
        let envelope = Envelope::new("u1", &Payload::Leave, 1234, 7).unwrap();
        let json: serde_json::Value = serde_json::from_str(&envelope.to_json().unwrap()).unwrap();
        assert_eq!(json["type"], "leave");
        assert_eq!(json["userId"], "u1");
        assert_eq!(json["timestamp"], 1234);
        assert_eq!(json["seq"], 7);
        assert!(!json["nonce"].as_str().unwrap().is_empty());
    }

    #[test]
    fn test_upsert_payload_decodes() {
        let text = Element::from(Text::new(Point::new(1.0, 2.0), "hi".to_string()));
        let envelope = Envelope::new("u1", &Payload::Upsert(text.clone()), 0, 1).unwrap();
        let parsed = Envelope::from_json(&envelope.to_json().unwrap()).unwrap();
        assert_eq!(parsed.payload().unwrap(), Payload::Upsert(text));
    }

    #[test]
    fn test_content_payload_bytes() {
        let payload = ContentPayload::encode(ContentId::from("c"), &[1, 2, 3], 4, 5);
        assert_eq!(payload.decode_bytes().unwrap(), vec![1, 2, 3]);

        let broken = ContentPayload {
            bytes: "%%%".to_string(),
            ..payload
        };
        assert!(matches!(broken.decode_bytes(), Err(CollabError::InvalidPayload(_))));
    }

    #[test]
    fn test_mismatched_data_is_error() {
        let cursor = Payload::Cursor(Point::new(1.0, 1.0));
        let mut envelope = Envelope::new("u1", &cursor, 0, 1).unwrap();
        envelope.kind = EnvelopeKind::Upsert;
        assert!(envelope.payload().is_err());
    }

    #[test]
    fn test_anonymous_user_is_stable() {
        assert_eq!(UserInfo::anonymous("abcdef"), UserInfo::anonymous("abcdef"));
        assert_eq!(UserInfo::anonymous("abcdef").name, "Guest abcd");
    }
}
