//! Mirroring one document's edits through the bus.
//!
//! Outgoing: the visible snapshot before and after a change is diffed by
//! element id into `upsert`/`remove` payloads, preceded by a `content`
//! payload the first time an image's bytes are shared. Incoming: payloads
//! are applied last-writer-wins per element, ordered by envelope timestamp
//! with the user id as tie-breaker.

use super::envelope::{ContentPayload, Envelope, Payload, SnapshotPayload};
use crate::content::{ContentCache, ContentEntry, ContentId};
use crate::element::{Element, ElementId};
use crate::history::Snapshot;
use crate::session::DocumentId;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Element ids removed from and upserted into `after` relative to `before`.
/// Upserts keep `after`'s stacking order.
pub fn diff(before: &Snapshot, after: &Snapshot) -> (Vec<ElementId>, Vec<Element>) {
    if before.ptr_eq(after) {
        return (Vec::new(), Vec::new());
    }
    let old: HashMap<ElementId, &Arc<Element>> = (0..before.len())
        .filter_map(|i| before.get_shared(i))
        .map(|e| (e.id(), e))
        .collect();
    let new_ids: HashSet<ElementId> = after.iter().map(Element::id).collect();

    let removed = before
        .iter()
        .map(Element::id)
        .filter(|id| !new_ids.contains(id))
        .collect();
    let upserted = (0..after.len())
        .filter_map(|i| after.get_shared(i))
        .filter(|e| match old.get(&e.id()) {
            Some(prev) => !Arc::ptr_eq(prev, e) && ***prev != ***e,
            None => true,
        })
        .map(|e| (**e).clone())
        .collect();
    (removed, upserted)
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Version {
    timestamp: u64,
    user_id: String,
}

/// What applying an inbound envelope did.
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    /// The document should move to this snapshot.
    Changed(Snapshot),
    /// An image payload was added to the content cache.
    ContentArrived(ContentId),
    /// Stale, duplicate or not a document edit.
    Ignored,
}

/// Per-document mirroring state.
#[derive(Debug, Clone)]
pub struct Mirror {
    document_id: DocumentId,
    versions: HashMap<ElementId, Version>,
    sent_content: HashSet<ContentId>,
}

impl Mirror {
    pub fn new(document_id: DocumentId) -> Self {
        Self {
            document_id,
            versions: HashMap::new(),
            sent_content: HashSet::new(),
        }
    }

    pub fn document_id(&self) -> DocumentId {
        self.document_id
    }

    /// Payloads describing the change from `before` to `after`, recorded as
    /// local writes at `now`.
    pub fn outgoing(
        &mut self,
        before: &Snapshot,
        after: &Snapshot,
        content: &ContentCache,
        user_id: &str,
        now: u64,
    ) -> Vec<Payload> {
        let (removed, upserted) = diff(before, after);
        let mut payloads = Vec::with_capacity(removed.len() + upserted.len());
        for id in removed {
            self.record(id, now, user_id);
            payloads.push(Payload::Remove(id));
        }
        for element in upserted {
            self.record(element.id(), now, user_id);
            if let Some(payload) = self.content_for(&element, content) {
                payloads.push(payload);
            }
            payloads.push(Payload::Upsert(element));
        }
        payloads
    }

    /// The whole document for a newly joined peer: every image payload
    /// followed by a `snapshot`.
    pub fn full_state(&self, snapshot: &Snapshot, content: &ContentCache) -> Vec<Payload> {
        let mut payloads: Vec<Payload> = snapshot
            .iter()
            .filter_map(Element::as_image)
            .map(|image| &image.content_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .filter_map(|id| encode_content(id, content))
            .collect();
        payloads.push(Payload::Snapshot(SnapshotPayload {
            document_id: self.document_id,
            elements: snapshot.clone(),
        }));
        payloads
    }

    fn content_for(&mut self, element: &Element, content: &ContentCache) -> Option<Payload> {
        let image = element.as_image()?;
        if self.sent_content.contains(&image.content_id) {
            return None;
        }
        let payload = encode_content(&image.content_id, content)?;
        self.sent_content.insert(image.content_id.clone());
        Some(payload)
    }

    fn record(&mut self, id: ElementId, timestamp: u64, user_id: &str) {
        self.versions.insert(
            id,
            Version {
                timestamp,
                user_id: user_id.to_string(),
            },
        );
    }

    /// Whether a write by `version` beats what we have for `id`. Accepted
    /// writes are recorded.
    fn accept(&mut self, id: ElementId, version: &Version) -> bool {
        match self.versions.get(&id) {
            Some(current) if current >= version => false,
            _ => {
                self.versions.insert(id, version.clone());
                true
            }
        }
    }

    /// Apply an inbound envelope to `current`.
    pub fn apply(
        &mut self,
        current: &Snapshot,
        envelope: &Envelope,
        content: &mut ContentCache,
    ) -> Applied {
        let payload = match envelope.payload() {
            Ok(payload) => payload,
            Err(e) => {
                log::warn!("Dropping {:?} from {}: {}", envelope.kind, envelope.user_id, e);
                return Applied::Ignored;
            }
        };
        let version = Version {
            timestamp: envelope.timestamp,
            user_id: envelope.user_id.clone(),
        };

        match payload {
            Payload::Upsert(element) => {
                if !self.accept(element.id(), &version) {
                    return Applied::Ignored;
                }
                changed(current, current.with_upserted(element))
            }
            Payload::Remove(id) => {
                if !self.accept(id, &version) || !current.contains(id) {
                    return Applied::Ignored;
                }
                Applied::Changed(current.without(id))
            }
            Payload::Snapshot(snapshot) => {
                if snapshot.document_id != self.document_id {
                    log::debug!(
                        "Snapshot for document {} mirrored into {}",
                        snapshot.document_id,
                        self.document_id
                    );
                }
                self.apply_snapshot(current, &snapshot.elements, &version)
            }
            Payload::Content(payload) => apply_content(payload, content),
            Payload::Join(_) | Payload::Leave | Payload::Cursor(_) => Applied::Ignored,
        }
    }

    /// Merge a full remote snapshot: newer remote elements win, local
    /// elements the remote lacks are dropped unless written after it.
    fn apply_snapshot(
        &mut self,
        current: &Snapshot,
        remote: &Snapshot,
        version: &Version,
    ) -> Applied {
        let remote_ids: HashSet<ElementId> = remote.iter().map(Element::id).collect();
        let mut next = current.clone();
        for id in current.iter().map(Element::id).filter(|id| !remote_ids.contains(id)) {
            if self.accept(id, version) {
                next = next.without(id);
            }
        }
        for element in remote.iter() {
            if self.accept(element.id(), version) {
                next = next.with_upserted(element.clone());
            }
        }
        changed(current, next)
    }
}

fn changed(current: &Snapshot, next: Snapshot) -> Applied {
    if &next == current {
        Applied::Ignored
    } else {
        Applied::Changed(next)
    }
}

fn encode_content(id: &ContentId, content: &ContentCache) -> Option<Payload> {
    match content.get(id) {
        Some(entry) => Some(Payload::Content(ContentPayload::encode(
            id.clone(),
            &entry.bytes,
            entry.width,
            entry.height,
        ))),
        None => {
            log::warn!("Image content {} missing; sharing element without payload", id);
            None
        }
    }
}

fn apply_content(payload: ContentPayload, content: &mut ContentCache) -> Applied {
    if content.contains(&payload.content_id) {
        return Applied::Ignored;
    }
    match payload.decode_bytes() {
        Ok(bytes) => {
            let id = payload.content_id.clone();
            let entry = ContentEntry::new(bytes, payload.width, payload.height);
            content.insert_with_id(id.clone(), entry);
            Applied::ContentArrived(id)
        }
        Err(e) => {
            log::warn!("Dropping content payload: {}", e);
            Applied::Ignored
        }
    }
}
