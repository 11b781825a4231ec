//! Documents and the editing session that owns them.
//!
//! A [`Session`] is the explicit context every editor operation works
//! against: the list of documents (each with its own [`History`]), the
//! current tool settings and the session-wide [`ContentCache`].

use crate::config::EditorConfig;
use crate::content::{ContentCache, ContentId};
use crate::element::Element;
use crate::history::{History, HistoryConfig, Snapshot};
use crate::tools::ToolSettings;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for documents.
pub type DocumentId = Uuid;

/// Session and document errors.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Document not found: {0}")]
    DocumentNotFound(DocumentId),
    #[error("Persisted session has no documents")]
    NoDocuments,
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Storage(#[from] crate::storage::StorageError),
}

/// A drawing with its own independent history. New documents start with
/// an empty first entry.
#[derive(Debug, Clone)]
pub struct Document {
    pub(crate) id: DocumentId,
    pub name: String,
    pub history: History,
    owned_content: BTreeSet<ContentId>,
}

impl Document {
    pub fn new(name: impl Into<String>, config: HistoryConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            history: History::seeded(config),
            owned_content: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }

    /// Visible snapshot.
    pub fn current(&self) -> &Snapshot {
        self.history.current()
    }

    /// Record that this document references a cached payload.
    pub fn own_content(&mut self, id: ContentId) {
        self.owned_content.insert(id);
    }

    pub fn owned_content(&self) -> impl Iterator<Item = &ContentId> {
        self.owned_content.iter()
    }

    fn collect_owned_content(&mut self) {
        let ids: Vec<ContentId> = self
            .history
            .snapshots()
            .iter()
            .flat_map(|s| s.iter())
            .filter_map(Element::as_image)
            .map(|image| image.content_id.clone())
            .collect();
        self.owned_content.extend(ids);
    }
}

/// Persisted form of a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedDocument {
    pub id: DocumentId,
    pub name: String,
    pub history: Vec<Snapshot>,
    pub cursor: i64,
}

/// Persisted form of a whole session. The content cache is not included.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSession {
    pub documents: Vec<PersistedDocument>,
    pub current_document_id: DocumentId,
}

/// Documents, tool settings and content shared by one editing session.
#[derive(Debug, Clone)]
pub struct Session {
    documents: Vec<Document>,
    current: DocumentId,
    pub settings: ToolSettings,
    pub content: ContentCache,
    history_config: HistoryConfig,
    untitled_counter: usize,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(&EditorConfig::default())
    }
}

impl Session {
    /// A session with one empty document.
    pub fn new(config: &EditorConfig) -> Self {
        let document = Document::new("Untitled 1", config.history);
        Self {
            current: document.id,
            documents: vec![document],
            settings: ToolSettings::default(),
            content: ContentCache::new(),
            history_config: config.history,
            untitled_counter: 1,
        }
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn document(&self, id: DocumentId) -> Option<&Document> {
        self.documents.iter().find(|d| d.id == id)
    }

    pub fn document_mut(&mut self, id: DocumentId) -> Option<&mut Document> {
        self.documents.iter_mut().find(|d| d.id == id)
    }

    pub fn current_id(&self) -> DocumentId {
        self.current
    }

    pub fn current_document(&self) -> &Document {
        // `current` always names an existing document.
        self.document(self.current)
            .unwrap_or(&self.documents[0])
    }

    pub fn current_document_mut(&mut self) -> &mut Document {
        let index = self
            .documents
            .iter()
            .position(|d| d.id == self.current)
            .unwrap_or(0);
        &mut self.documents[index]
    }

    /// Visible snapshot of the current document.
    pub fn current_snapshot(&self) -> &Snapshot {
        self.current_document().current()
    }

    /// Create an empty document and make it current.
    pub fn new_document(&mut self, name: Option<String>) -> DocumentId {
        let name = name.unwrap_or_else(|| self.next_untitled_name());
        let document = Document::new(name, self.history_config);
        let id = document.id;
        log::info!("Created document {} ({})", document.name, id);
        self.documents.push(document);
        self.current = id;
        id
    }

    /// Make the document `id` current, creating it empty under `name` if the
    /// session has no such document.
    pub fn open_or_create_document(
        &mut self,
        id: DocumentId,
        name: impl Into<String>,
    ) -> DocumentId {
        if self.document(id).is_none() {
            let mut document = Document::new(name, self.history_config);
            document.id = id;
            log::info!("Created document {} ({})", document.name, id);
            self.documents.push(document);
        }
        self.current = id;
        id
    }

    /// Delete a document. Deleting the last one leaves a fresh empty
    /// document in its place.
    pub fn delete_document(&mut self, id: DocumentId) -> Result<(), SessionError> {
        let index = self
            .documents
            .iter()
            .position(|d| d.id == id)
            .ok_or(SessionError::DocumentNotFound(id))?;
        let removed = self.documents.remove(index);
        log::info!("Deleted document {} ({})", removed.name, id);

        if self.documents.is_empty() {
            self.new_document(None);
        } else if self.current == id {
            let next = index.min(self.documents.len() - 1);
            self.current = self.documents[next].id;
        }
        Ok(())
    }

    /// Copy a document (history included) and make the copy current.
    /// The copy references the same content ids.
    pub fn duplicate_document(&mut self, id: DocumentId) -> Result<DocumentId, SessionError> {
        let source = self.document(id).ok_or(SessionError::DocumentNotFound(id))?;
        let mut copy = source.clone();
        copy.id = Uuid::new_v4();
        copy.name = format!("{} (copy)", source.name);
        let new_id = copy.id;
        self.documents.push(copy);
        self.current = new_id;
        Ok(new_id)
    }

    pub fn rename_document(
        &mut self,
        id: DocumentId,
        name: impl Into<String>,
    ) -> Result<(), SessionError> {
        let document = self.document_mut(id).ok_or(SessionError::DocumentNotFound(id))?;
        document.name = name.into();
        Ok(())
    }

    pub fn switch_document(&mut self, id: DocumentId) -> Result<(), SessionError> {
        if self.document(id).is_none() {
            return Err(SessionError::DocumentNotFound(id));
        }
        self.current = id;
        Ok(())
    }

    pub fn to_persisted(&self) -> PersistedSession {
        PersistedSession {
            documents: self
                .documents
                .iter()
                .map(|d| PersistedDocument {
                    id: d.id,
                    name: d.name.clone(),
                    history: d.history.snapshots().to_vec(),
                    cursor: d.history.cursor_index(),
                })
                .collect(),
            current_document_id: self.current,
        }
    }

    /// Rebuild a session from its persisted record. Tool settings and the
    /// content cache start fresh.
    pub fn from_persisted(
        record: PersistedSession,
        config: &EditorConfig,
    ) -> Result<Self, SessionError> {
        if record.documents.is_empty() {
            return Err(SessionError::NoDocuments);
        }
        let documents: Vec<Document> = record
            .documents
            .into_iter()
            .map(|d| {
                let mut document = Document {
                    id: d.id,
                    name: d.name,
                    history: History::from_parts(d.history, d.cursor, config.history),
                    owned_content: BTreeSet::new(),
                };
                document.collect_owned_content();
                document
            })
            .collect();
        let current = if documents.iter().any(|d| d.id == record.current_document_id) {
            record.current_document_id
        } else {
            log::warn!("Persisted current document {} missing", record.current_document_id);
            documents[0].id
        };
        Ok(Self {
            untitled_counter: documents.len(),
            documents,
            current,
            settings: ToolSettings::default(),
            content: ContentCache::new(),
            history_config: config.history,
        })
    }

    pub fn to_json(&self) -> Result<String, SessionError> {
        Ok(serde_json::to_string(&self.to_persisted())?)
    }

    pub fn from_json(json: &str, config: &EditorConfig) -> Result<Self, SessionError> {
        let record: PersistedSession = serde_json::from_str(json)?;
        Self::from_persisted(record, config)
    }

    fn next_untitled_name(&mut self) -> String {
        self.untitled_counter += 1;
        format!("Untitled {}", self.untitled_counter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_or_create_document() {
        let mut session = Session::default();
        let id = Uuid::new_v4();
        assert_eq!(session.open_or_create_document(id, "Shared"), id);
        assert_eq!(session.current_id(), id);
        assert_eq!(session.documents().len(), 2);

        let first = session.documents()[0].id();
        session.open_or_create_document(first, "ignored");
        assert_eq!(session.current_id(), first);
        assert_eq!(session.documents().len(), 2);
    }
    use crate::content::ContentId;
    use crate::element::{HexColor, Image, Stroke};
    use kurbo::Point;

    fn commit_stroke(session: &mut Session) {
        let points = vec![Point::new(0.0, 0.0), Point::new(5.0, 5.0)];
        let stroke = Stroke::from_points(points, HexColor::black(), 2.0);
        session
            .current_document_mut()
            .history
            .commit(|s| s.with_pushed(stroke))
            .unwrap();
    }

    #[test]
    fn test_new_session_has_one_document() {
        let session = Session::default();
        assert_eq!(session.documents().len(), 1);
        assert!(session.current_snapshot().is_empty());
    }

    #[test]
    fn test_documents_are_independent() {
        let mut session = Session::default();
        let first = session.current_id();
        commit_stroke(&mut session);
        let second = session.new_document(None);
        assert_eq!(session.current_id(), second);
        assert!(session.current_snapshot().is_empty());
        session.switch_document(first).unwrap();
        assert_eq!(session.current_snapshot().len(), 1);
    }

    #[test]
    fn test_delete_last_document_creates_fresh_one() {
        let mut session = Session::default();
        let only = session.current_id();
        commit_stroke(&mut session);
        session.delete_document(only).unwrap();
        assert_eq!(session.documents().len(), 1);
        assert_ne!(session.current_id(), only);
        assert!(session.current_snapshot().is_empty());
    }

    #[test]
    fn test_delete_current_switches_to_neighbor() {
        let mut session = Session::default();
        let first = session.current_id();
        let second = session.new_document(Some("Two".to_string()));
        session.delete_document(second).unwrap();
        assert_eq!(session.current_id(), first);
        assert!(matches!(
            session.delete_document(second),
            Err(SessionError::DocumentNotFound(_))
        ));
    }

    #[test]
    fn test_duplicate_and_rename() {
        let mut session = Session::default();
        let original = session.current_id();
        commit_stroke(&mut session);
        let copy = session.duplicate_document(original).unwrap();
        assert_eq!(session.current_snapshot().len(), 1);
        session.rename_document(copy, "Copy").unwrap();
        assert_eq!(session.document(copy).unwrap().name, "Copy");
        assert_eq!(session.document(original).unwrap().name, "Untitled 1");
    }

    #[test]
    fn test_persisted_layout() {
        let mut session = Session::default();
        commit_stroke(&mut session);
        let json: serde_json::Value = serde_json::from_str(&session.to_json().unwrap()).unwrap();
        assert_eq!(json["currentDocumentId"], session.current_id().to_string());
        assert_eq!(json["documents"][0]["cursor"], 1);
        assert_eq!(json["documents"][0]["history"][0], serde_json::json!([]));
        assert_eq!(json["documents"][0]["history"][1][0]["kind"], "stroke");
    }

    #[test]
    fn test_persisted_roundtrip_restores_history() {
        let mut session = Session::default();
        commit_stroke(&mut session);
        commit_stroke(&mut session);
        session.current_document_mut().history.undo();
        let image = Image::new(ContentId::from("pic"), Point::ZERO, 10.0, 10.0);
        session.new_document(None);
        session.current_document_mut().history.commit(|s| s.with_pushed(image)).unwrap();

        let json = session.to_json().unwrap();
        let restored = Session::from_json(&json, &EditorConfig::default()).unwrap();
        assert_eq!(restored.documents().len(), 2);
        assert_eq!(restored.current_id(), session.current_id());
        let first = &restored.documents()[0];
        assert_eq!(first.history.len(), 3);
        assert!(first.history.can_redo());
        assert_eq!(first.current().len(), 1);
        let owned: Vec<_> = restored.current_document().owned_content().cloned().collect();
        assert_eq!(owned, vec![ContentId::from("pic")]);
    }

    #[test]
    fn test_from_persisted_rejects_empty() {
        let record = PersistedSession {
            documents: Vec::new(),
            current_document_id: Uuid::new_v4(),
        };
        assert!(matches!(
            Session::from_persisted(record, &EditorConfig::default()),
            Err(SessionError::NoDocuments)
        ));
    }
}
