//! The editor façade the host drives.
//!
//! [`Editor`] composes a [`Session`], the [`Interaction`] state machine, an
//! optional [`AutoSave`] and an optional shared document on the
//! collaboration bus. The host feeds it input events and calls
//! [`Editor::tick`] regularly; time always comes from the host.

use crate::collab::{
    Applied, ChannelHub, CollabError, Envelope, EnvelopeKind, EventBus, Mirror, Payload, Peers,
    ShareLink,
    ShareMetadata, UserInfo, generate_session, join_session, share_link,
};
use crate::config::EditorConfig;
use crate::content::ContentId;
use crate::element::{ElementId, FontFamily, HexColor, TextMeasure};
use crate::history::Snapshot;
use crate::input::{ClickTracker, KeyEvent, PointerEvent};
use crate::interaction::{Action, Interaction};
use crate::notice::Notice;
use crate::session::{DocumentId, Session, SessionError};
use crate::storage::{AutoSave, SharedStore};
use crate::time::now_millis;
use crate::tools::{ToolKind, ToolSettings};
use kurbo::Point;
use uuid::Uuid;

/// Storage scopes used to create and discover shares.
#[derive(Clone)]
pub struct CollabStores {
    /// Per-context scope (`sessionStorage` in a browser).
    pub session: SharedStore,
    /// Scope shared by every context (`localStorage` in a browser).
    pub durable: SharedStore,
}

/// A document mirrored through the bus.
struct SharedDocument {
    metadata: ShareMetadata,
    bus: EventBus,
    mirror: Mirror,
    /// The shared document's snapshot as last published or applied.
    published: Snapshot,
}

/// A drawing editor over one session.
pub struct Editor {
    config: EditorConfig,
    session: Session,
    interaction: Interaction,
    clicks: ClickTracker,
    autosave: Option<AutoSave>,
    shared: Option<SharedDocument>,
    notices: Vec<Notice>,
}

impl Default for Editor {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

impl Editor {
    pub fn new(config: EditorConfig) -> Self {
        Self::with_session(Session::new(&config), config)
    }

    pub fn with_session(session: Session, config: EditorConfig) -> Self {
        Self {
            interaction: Interaction::new(config.clone()),
            config,
            session,
            clicks: ClickTracker::new(),
            autosave: None,
            shared: None,
            notices: Vec::new(),
        }
    }

    /// Open the session saved in `store`, or a fresh one, with autosave to
    /// the same store.
    ///
    /// A record that cannot be read or rebuilt is replaced by a fresh session;
    /// the failure is reported as a notice from the next [`Editor::tick`].
    pub fn restore(store: SharedStore, config: EditorConfig) -> Self {
        let autosave = AutoSave::new(store, &config);
        let restored = autosave.load().map_err(|e| e.to_string()).and_then(|record| {
            record
                .map(|record| {
                    log::info!("Restoring session from {}", autosave.key());
                    Session::from_persisted(record, &config).map_err(|e| e.to_string())
                })
                .transpose()
        });
        let mut notices = Vec::new();
        let session = match restored {
            Ok(Some(session)) => session,
            Ok(None) => Session::new(&config),
            Err(e) => {
                log::error!("Discarding unreadable session {}: {}", autosave.key(), e);
                notices.push(Notice::error(format!(
                    "Could not restore saved drawings, starting fresh: {}",
                    e
                )));
                Session::new(&config)
            }
        };
        let mut editor = Self::with_session(session, config);
        editor.autosave = Some(autosave);
        editor.notices = notices;
        editor
    }

    /// Notices raised outside of an input or tick, such as a failed restore.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Persist the session to `store` whenever it changes.
    pub fn enable_autosave(&mut self, store: SharedStore) {
        let mut autosave = AutoSave::new(store, &self.config);
        autosave.mark_dirty();
        self.autosave = Some(autosave);
    }

    /// Use a custom text measurement.
    pub fn set_text_measure(&mut self, measure: Box<dyn TextMeasure>) {
        self.interaction = Interaction::with_measure(self.config.clone(), measure);
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn interaction(&self) -> &Interaction {
        &self.interaction
    }

    // --- UI chrome ---

    /// What to draw: the current document with any in-progress gesture.
    pub fn current_snapshot(&self) -> Snapshot {
        self.interaction.display_snapshot(&self.session)
    }

    pub fn can_undo(&self) -> bool {
        self.interaction.is_idle() && self.session.current_document().history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.interaction.is_idle() && self.session.current_document().history.can_redo()
    }

    pub fn selection(&self) -> Option<ElementId> {
        self.interaction.selection(self.session.current_snapshot())
    }

    pub fn settings(&self) -> &ToolSettings {
        &self.session.settings
    }

    pub fn set_tool(&mut self, tool: ToolKind) -> Vec<Action> {
        let actions = self.interaction.set_tool(&mut self.session, tool);
        self.after(actions, now_millis())
    }

    pub fn set_color(&mut self, color: HexColor) -> Vec<Action> {
        self.session.settings.color = color;
        self.interaction.restyle_text_edit(&self.session)
    }

    /// Stroke width for the draw and erase tools.
    pub fn set_size(&mut self, size: f64) {
        if size.is_finite() && size > 0.0 {
            self.session.settings.size = size;
        } else {
            log::warn!("Ignoring stroke size {}", size);
        }
    }

    pub fn set_font(&mut self, font: FontFamily) -> Vec<Action> {
        self.session.settings.font = font;
        self.interaction.restyle_text_edit(&self.session)
    }

    pub fn set_font_size(&mut self, size: f64) -> Vec<Action> {
        if !(size.is_finite() && size > 0.0) {
            log::warn!("Ignoring font size {}", size);
            return Vec::new();
        }
        self.session.settings.font_size = size;
        self.interaction.restyle_text_edit(&self.session)
    }

    pub fn undo(&mut self) -> Vec<Action> {
        let actions = self.interaction.undo(&mut self.session);
        self.after(actions, now_millis())
    }

    pub fn redo(&mut self) -> Vec<Action> {
        let actions = self.interaction.redo(&mut self.session);
        self.after(actions, now_millis())
    }

    pub fn copy(&mut self) {
        self.interaction.copy(&self.session);
    }

    pub fn paste(&mut self) -> Vec<Action> {
        let actions = self.interaction.paste(&mut self.session);
        self.after(actions, now_millis())
    }

    pub fn delete_selection(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        self.interaction.delete_selection(&mut self.session, &mut actions);
        self.after(actions, now_millis())
    }

    /// Store an image payload and arm the image tool with it.
    pub fn import_image(
        &mut self,
        bytes: Vec<u8>,
        width: u32,
        height: u32,
    ) -> (ContentId, Vec<Action>) {
        let (content_id, actions) =
            self.interaction.import_image(&mut self.session, bytes, width, height);
        (content_id, self.after(actions, now_millis()))
    }

    // --- Input ---

    /// Dispatch a pointer event at `now` (milliseconds). A second
    /// pointer-down close in time and space also produces a double-click.
    pub fn handle_pointer(&mut self, event: PointerEvent, now: u64) -> Vec<Action> {
        let mut actions = self.interaction.handle_pointer(&mut self.session, event);
        if let PointerEvent::Down { position } = event {
            if self.clicks.register(position, now) {
                let double = PointerEvent::DoubleClick { position };
                actions.extend(self.interaction.handle_pointer(&mut self.session, double));
            }
        }
        self.after(actions, now)
    }

    pub fn handle_key(&mut self, event: KeyEvent, now: u64) -> Vec<Action> {
        let actions = self.interaction.handle_key(&mut self.session, event);
        self.after(actions, now)
    }

    /// Bookkeeping after anything that may have committed.
    fn after(&mut self, mut actions: Vec<Action>, now: u64) -> Vec<Action> {
        if actions.contains(&Action::Committed) {
            if let Some(autosave) = &mut self.autosave {
                autosave.mark_dirty();
            }
            self.publish_changes(now, &mut actions);
        }
        actions
    }

    // --- Documents ---

    /// Finalize in-progress work before the current document changes.
    fn leave_document(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        self.interaction.interrupt(&mut self.session, &mut actions);
        let mut actions = self.after(actions, now_millis());
        self.interaction.reset();
        actions.push(Action::SelectionChanged(None));
        actions
    }

    fn document_changed(&mut self, mut actions: Vec<Action>) -> Vec<Action> {
        if let Some(autosave) = &mut self.autosave {
            autosave.mark_dirty();
        }
        actions.push(Action::RenderNeeded);
        actions
    }

    pub fn new_document(&mut self, name: Option<String>) -> (DocumentId, Vec<Action>) {
        let actions = self.leave_document();
        let id = self.session.new_document(name);
        (id, self.document_changed(actions))
    }

    pub fn switch_document(&mut self, id: DocumentId) -> Result<Vec<Action>, SessionError> {
        if self.session.document(id).is_none() {
            return Err(SessionError::DocumentNotFound(id));
        }
        if id == self.session.current_id() {
            return Ok(Vec::new());
        }
        let actions = self.leave_document();
        self.session.switch_document(id)?;
        Ok(self.document_changed(actions))
    }

    pub fn duplicate_document(
        &mut self,
        id: DocumentId,
    ) -> Result<(DocumentId, Vec<Action>), SessionError> {
        if self.session.document(id).is_none() {
            return Err(SessionError::DocumentNotFound(id));
        }
        let actions = self.leave_document();
        let copy = self.session.duplicate_document(id)?;
        Ok((copy, self.document_changed(actions)))
    }

    /// Delete a document. Deleting the shared document also leaves the share.
    pub fn delete_document(&mut self, id: DocumentId) -> Result<Vec<Action>, SessionError> {
        if self.session.document(id).is_none() {
            return Err(SessionError::DocumentNotFound(id));
        }
        let actions = self.leave_document();
        self.session.delete_document(id)?;
        if self.shared_document() == Some(id) {
            self.leave_share(now_millis());
        }
        Ok(self.document_changed(actions))
    }

    pub fn rename_document(
        &mut self,
        id: DocumentId,
        name: impl Into<String>,
    ) -> Result<(), SessionError> {
        self.session.rename_document(id, name)?;
        if let Some(autosave) = &mut self.autosave {
            autosave.mark_dirty();
        }
        Ok(())
    }

    // --- Collaboration ---

    /// Id of the document mirrored through the bus.
    pub fn shared_document(&self) -> Option<DocumentId> {
        self.shared.as_ref().map(|s| s.mirror.document_id())
    }

    pub fn share_metadata(&self) -> Option<&ShareMetadata> {
        self.shared.as_ref().map(|s| &s.metadata)
    }

    /// Participants of the current share, including the local user.
    pub fn peers(&self) -> Option<&Peers> {
        self.shared.as_ref().map(|s| s.bus.peers())
    }

    /// Link for inviting others to the current share.
    pub fn share_link(&self, base: &str) -> Option<String> {
        let shared = self.shared.as_ref()?;
        Some(share_link(base, &shared.metadata.share_id, shared.metadata.document_id))
    }

    /// Share the current document. Any previous share is left first.
    pub fn share(
        &mut self,
        stores: &CollabStores,
        hub: Option<&ChannelHub>,
        now: u64,
    ) -> Result<ShareMetadata, CollabError> {
        self.leave_share(now);
        let user_id = Uuid::new_v4().simple().to_string();
        let document_id = self.session.current_id();
        let metadata = generate_session(
            stores.session.as_ref(),
            stores.durable.as_ref(),
            &self.config,
            document_id,
            &user_id,
            now,
        )?;
        self.connect(metadata.clone(), document_id, user_id, stores, hub, now)?;
        Ok(metadata)
    }

    /// Join the share named by `link`. The shared drawing is mirrored into
    /// the local document with the share's document id, which is created
    /// (and made current) if needed.
    pub fn join_share(
        &mut self,
        link: &ShareLink,
        stores: &CollabStores,
        hub: Option<&ChannelHub>,
        now: u64,
    ) -> Result<(Vec<Action>, ShareMetadata), CollabError> {
        self.leave_share(now);
        let joined = join_session(
            stores.session.as_ref(),
            stores.durable.as_ref(),
            &self.config,
            &link.share_id,
        );
        let metadata = match joined {
            Ok(metadata) => metadata,
            Err(CollabError::UnknownShare(share_id)) => {
                let document_id = link
                    .document_id
                    .ok_or(CollabError::UnknownShare(share_id.clone()))?;
                log::warn!("No metadata for share {}; using the link's document id", share_id);
                ShareMetadata {
                    share_id,
                    document_id,
                    host_id: String::new(),
                    created_at: now,
                }
            }
            Err(e) => return Err(e),
        };

        let actions = self.leave_document();
        let document_id = self
            .session
            .open_or_create_document(metadata.document_id, "Shared drawing");
        let actions = self.document_changed(actions);

        let user_id = Uuid::new_v4().simple().to_string();
        self.connect(metadata.clone(), document_id, user_id, stores, hub, now)?;
        Ok((actions, metadata))
    }

    fn connect(
        &mut self,
        metadata: ShareMetadata,
        document_id: DocumentId,
        user_id: String,
        stores: &CollabStores,
        hub: Option<&ChannelHub>,
        now: u64,
    ) -> Result<(), CollabError> {
        let info = UserInfo::anonymous(&user_id);
        let mut bus = EventBus::new(metadata.share_id.clone(), user_id, info);
        bus.attach_defaults(hub, Some(stores.durable.clone()), &self.config);
        bus.join(now)?;
        let published = self
            .session
            .document(document_id)
            .map(|d| d.current().clone())
            .unwrap_or_default();
        self.shared = Some(SharedDocument {
            metadata,
            bus,
            mirror: Mirror::new(document_id),
            published,
        });
        Ok(())
    }

    /// Leave the current share, if any.
    pub fn leave_share(&mut self, now: u64) {
        if let Some(mut shared) = self.shared.take() {
            shared.bus.leave(now);
        }
    }

    /// Register a listener for every inbound envelope (including cursors).
    pub fn on_collab_event(&mut self, listener: impl FnMut(&Envelope) + 'static) {
        if let Some(shared) = &mut self.shared {
            shared.bus.on_event(listener);
        }
    }

    pub fn on_presence_change(&mut self, listener: impl FnMut(&Peers) + 'static) {
        if let Some(shared) = &mut self.shared {
            shared.bus.on_presence_change(listener);
        }
    }

    /// Share the local pointer position.
    pub fn publish_cursor(&mut self, position: Point, now: u64) {
        if let Some(shared) = &mut self.shared {
            if let Err(e) = shared.bus.publish(&Payload::Cursor(position), now) {
                log::debug!("Cursor not sent: {}", e);
            }
        }
    }

    /// Mirror changes to the shared document made since the last publish.
    fn publish_changes(&mut self, now: u64, actions: &mut Vec<Action>) {
        let Some(shared) = &mut self.shared else {
            return;
        };
        let Some(document) = self.session.document(shared.mirror.document_id()) else {
            return;
        };
        let after = document.current().clone();
        if after.ptr_eq(&shared.published) {
            return;
        }
        let payloads = shared.mirror.outgoing(
            &shared.published,
            &after,
            &self.session.content,
            shared.bus.user_id(),
            now,
        );
        shared.published = after;
        for payload in &payloads {
            if let Err(e) = shared.bus.publish(payload, now) {
                log::warn!("Dropped outgoing {:?}: {}", payload.kind(), e);
            }
        }
        actions.extend(shared.bus.take_notices().into_iter().map(Action::Notice));
    }

    /// Whether this participant answers joins with the full document: the
    /// host, or the lowest user id when the host is gone.
    fn answers_joins(shared: &SharedDocument) -> bool {
        let peers = shared.bus.peers();
        let responder = if peers.contains_key(&shared.metadata.host_id) {
            Some(shared.metadata.host_id.as_str())
        } else {
            peers.keys().next().map(String::as_str)
        };
        responder == Some(shared.bus.user_id())
    }

    /// Drive the bus and autosave. Call regularly with the current time.
    pub fn tick(&mut self, now: u64) -> Vec<Action> {
        let mut actions: Vec<Action> =
            self.take_notices().into_iter().map(Action::Notice).collect();
        self.receive(now, &mut actions);

        if let Some(autosave) = &mut self.autosave {
            if let Err(e) = autosave.maybe_save(&self.session, now) {
                log::error!("Autosave failed: {}", e);
                actions.push(Action::Notice(Notice::error(format!("Could not save: {}", e))));
            }
        }
        actions
    }

    fn receive(&mut self, now: u64, actions: &mut Vec<Action>) {
        let Some(shared) = &mut self.shared else {
            return;
        };
        let envelopes = shared.bus.tick(now);
        let document_id = shared.mirror.document_id();
        let mut changed = false;
        let mut render = false;
        let mut answer_join = false;

        for envelope in &envelopes {
            if envelope.kind == EnvelopeKind::Join {
                answer_join = true;
                continue;
            }
            let current = self.session.document(document_id).map(|d| d.current().clone());
            let Some(current) = current else {
                break;
            };
            match shared.mirror.apply(&current, envelope, &mut self.session.content) {
                Applied::Changed(next) => {
                    let Some(document) = self.session.document_mut(document_id) else {
                        break;
                    };
                    match document.history.commit(|_| next) {
                        Ok(()) => {
                            shared.published = document.current().clone();
                            changed = true;
                        }
                        Err(e) => {
                            log::warn!("Rejected remote edit from {}: {}", envelope.user_id, e)
                        }
                    }
                }
                Applied::ContentArrived(_) => render = true,
                Applied::Ignored => {}
            }
        }

        if answer_join && Self::answers_joins(shared) {
            let snapshot = shared.published.clone();
            for payload in shared.mirror.full_state(&snapshot, &self.session.content) {
                if let Err(e) = shared.bus.publish(&payload, now) {
                    log::warn!("Failed to send document to new peer: {}", e);
                }
            }
        }
        actions.extend(shared.bus.take_notices().into_iter().map(Action::Notice));

        if changed {
            if let Some(autosave) = &mut self.autosave {
                autosave.mark_dirty();
            }
            if self.session.current_id() == document_id {
                actions.push(Action::Committed);
                actions.extend(self.interaction.revalidate(self.session.current_snapshot()));
                render = true;
            }
        }
        if render {
            actions.push(Action::RenderNeeded);
        }
    }
}

impl Drop for Editor {
    fn drop(&mut self) {
        self.leave_share(now_millis());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::parse_share_link;
    use crate::element::Element;
    use crate::input::{Key, Modifiers};
    use crate::notice::NoticeLevel;
    use crate::session::PersistedSession;
    use crate::storage::{KeyValueStore, MemoryStore};
    use std::rc::Rc;

    fn down(x: f64, y: f64) -> PointerEvent {
        PointerEvent::Down { position: Point::new(x, y) }
    }

    fn mv(x: f64, y: f64) -> PointerEvent {
        PointerEvent::Move { position: Point::new(x, y) }
    }

    fn up(x: f64, y: f64) -> PointerEvent {
        PointerEvent::Up { position: Point::new(x, y) }
    }

    fn stroke(editor: &mut Editor, y: f64, now: u64) {
        editor.set_tool(ToolKind::Draw);
        editor.handle_pointer(down(0.0, y), now);
        editor.handle_pointer(mv(10.0, y), now);
        editor.handle_pointer(up(20.0, y), now);
    }

    fn stores(durable: &MemoryStore) -> CollabStores {
        CollabStores {
            session: Rc::new(MemoryStore::new()),
            durable: Rc::new(durable.context()),
        }
    }

    #[test]
    fn test_stroke_commit_undo_redo() {
        let mut editor = Editor::default();
        assert!(!editor.can_undo());
        stroke(&mut editor, 5.0, 0);
        assert_eq!(editor.current_snapshot().len(), 1);
        assert!(editor.can_undo());

        let actions = editor.undo();
        assert!(actions.contains(&Action::Committed));
        assert!(editor.current_snapshot().is_empty());
        assert!(editor.can_redo());

        editor.redo();
        assert_eq!(editor.current_snapshot().len(), 1);
    }

    #[test]
    fn test_display_includes_stroke_in_progress() {
        let mut editor = Editor::default();
        editor.set_tool(ToolKind::Draw);
        editor.handle_pointer(down(0.0, 0.0), 0);
        editor.handle_pointer(mv(10.0, 10.0), 10);
        assert_eq!(editor.current_snapshot().len(), 1);
        assert!(editor.session().current_snapshot().is_empty());
        assert!(!editor.can_undo());
    }

    #[test]
    fn test_double_click_reedits_text() {
        let mut editor = Editor::default();
        editor.set_tool(ToolKind::Text);
        editor.handle_pointer(down(10.0, 10.0), 0);
        editor.handle_key(KeyEvent::new(Key::Character('a')), 0);
        editor.handle_key(KeyEvent::new(Key::Enter), 0);
        editor.set_tool(ToolKind::Select);

        editor.handle_pointer(down(12.0, 15.0), 1_000);
        editor.handle_pointer(up(12.0, 15.0), 1_050);
        let actions = editor.handle_pointer(down(12.0, 15.0), 1_200);
        assert!(actions.iter().any(|a| matches!(a, Action::TextEditorOpened(_))));
        assert!(editor.interaction().is_editing_text());
        // The element being edited is hidden from the display snapshot.
        assert!(editor.current_snapshot().is_empty());
    }

    #[test]
    fn test_style_setters_restyle_open_editor() {
        let mut editor = Editor::default();
        editor.set_tool(ToolKind::Text);
        editor.handle_pointer(down(0.0, 0.0), 0);
        let actions = editor.set_font_size(48.0);
        assert!(matches!(&actions[..], [Action::TextEditorUpdated(t)] if t.size == 48.0));
        assert!(editor.set_font_size(f64::NAN).is_empty());
        editor.set_size(-1.0);
        assert_eq!(editor.settings().size, 4.0);
    }

    #[test]
    fn test_switch_document_commits_text_and_resets() {
        let mut editor = Editor::default();
        let first = editor.session().current_id();
        editor.set_tool(ToolKind::Text);
        editor.handle_pointer(down(0.0, 0.0), 0);
        editor.handle_key(KeyEvent::new(Key::Character('x')), 0);

        let (second, _) = editor.new_document(None);
        assert_eq!(editor.session().current_id(), second);
        assert!(!editor.interaction().is_editing_text());
        assert_eq!(editor.session().document(first).unwrap().current().len(), 1);

        editor.switch_document(first).unwrap();
        assert_eq!(editor.current_snapshot().len(), 1);
        assert!(editor.switch_document(Uuid::new_v4()).is_err());
    }

    #[test]
    fn test_autosave_and_restore() {
        let store = MemoryStore::new();
        let config = EditorConfig {
            autosave_interval_ms: 1_000,
            ..EditorConfig::default()
        };
        let mut editor = Editor::restore(Rc::new(store.clone()), config.clone());
        stroke(&mut editor, 1.0, 0);
        editor.tick(5_000);
        assert!(store.get("scrawl.session").unwrap().is_some());
        drop(editor);

        let restored = Editor::restore(Rc::new(store.clone()), config);
        assert_eq!(restored.current_snapshot().len(), 1);
        assert!(restored.can_undo());
    }

    #[test]
    fn test_corrupt_record_restores_fresh_session_with_notice() {
        let store = MemoryStore::new();
        store.set("scrawl.session", "{").unwrap();
        let mut editor = Editor::restore(Rc::new(store.clone()), EditorConfig::default());
        assert_eq!(editor.session().documents().len(), 1);
        assert!(editor.current_snapshot().is_empty());

        let actions = editor.tick(0);
        let errors = actions
            .iter()
            .filter(|a| matches!(a, Action::Notice(n) if n.level == NoticeLevel::Error))
            .count();
        assert_eq!(errors, 1);
        assert!(editor.tick(1).iter().all(|a| !matches!(a, Action::Notice(_))));
    }

    #[test]
    fn test_record_without_documents_restores_fresh_session() {
        let store = MemoryStore::new();
        let config = EditorConfig::default();
        let empty = PersistedSession {
            documents: Vec::new(),
            current_document_id: Session::new(&config).current_id(),
        };
        store.set("scrawl.session", &serde_json::to_string(&empty).unwrap()).unwrap();
        let mut editor = Editor::restore(Rc::new(store), config);
        assert_eq!(editor.session().documents().len(), 1);
        assert_eq!(editor.take_notices().len(), 1);
    }

    #[test]
    fn test_autosave_failure_is_notice() {
        let store = MemoryStore::with_quota(8);
        let mut editor = Editor::default();
        editor.enable_autosave(Rc::new(store));
        let actions = editor.tick(0);
        assert!(actions.iter().any(|a| matches!(a, Action::Notice(_))));
    }

    #[test]
    fn test_shared_edits_reach_peer() {
        let hub = ChannelHub::new();
        let durable = MemoryStore::new();

        let mut host = Editor::default();
        stroke(&mut host, 1.0, 0);
        let metadata = host.share(&stores(&durable), Some(&hub), 1_000).unwrap();
        let link = host.share_link("https://example.org/").unwrap();
        let link = parse_share_link(&link).unwrap();
        assert_eq!(link.share_id, metadata.share_id);

        let mut guest = Editor::default();
        guest.join_share(&link, &stores(&durable), Some(&hub), 1_100).unwrap();
        assert_eq!(guest.session().current_id(), metadata.document_id);

        // Host answers the join with the full document.
        host.tick(1_200);
        let actions = guest.tick(1_300);
        assert!(actions.contains(&Action::Committed));
        assert_eq!(guest.current_snapshot().len(), 1);
        assert_eq!(host.peers().unwrap().len(), 2);

        // Live edits flow both ways.
        stroke(&mut guest, 50.0, 1_400);
        host.tick(1_500);
        assert_eq!(host.current_snapshot().len(), 2);

        host.handle_key(KeyEvent::with_modifiers(Key::Character('z'), Modifiers::CTRL), 1_600);
        assert_eq!(host.current_snapshot().len(), 1);
        guest.tick(1_700);
        assert_eq!(guest.current_snapshot().len(), 1);
    }

    #[test]
    fn test_shared_image_carries_content() {
        let hub = ChannelHub::new();
        let durable = MemoryStore::new();
        let mut host = Editor::default();
        host.share(&stores(&durable), Some(&hub), 0).unwrap();
        let link = ShareLink {
            share_id: host.share_metadata().unwrap().share_id.clone(),
            document_id: None,
        };
        let mut guest = Editor::default();
        guest.join_share(&link, &stores(&durable), Some(&hub), 0).unwrap();
        host.tick(0);
        guest.tick(0);

        let (content_id, _) = host.import_image(vec![0x89, b'P', b'N', b'G'], 64, 32);
        host.handle_pointer(down(10.0, 10.0), 10);
        host.handle_pointer(up(10.0, 10.0), 20);
        guest.tick(30);

        assert!(guest.session().content.contains(&content_id));
        let snapshot = guest.current_snapshot();
        assert!(matches!(
            snapshot.get(0),
            Some(Element::Image(image)) if image.content_id == content_id
        ));
    }

    #[test]
    fn test_join_unknown_share_without_document_fails() {
        let mut editor = Editor::default();
        let link = ShareLink {
            share_id: "missing".to_string(),
            document_id: None,
        };
        let result = editor.join_share(&link, &stores(&MemoryStore::new()), None, 0);
        assert!(matches!(result, Err(CollabError::UnknownShare(_))));
        assert!(editor.shared_document().is_none());
    }

    #[test]
    fn test_leave_share_on_delete() {
        let durable = MemoryStore::new();
        let mut editor = Editor::default();
        let shared = editor.session().current_id();
        editor.share(&stores(&durable), None, 0).unwrap();
        editor.new_document(None);
        editor.delete_document(shared).unwrap();
        assert!(editor.shared_document().is_none());
    }
}
