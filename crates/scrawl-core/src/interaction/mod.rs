//! Pointer and keyboard interaction state machine.
//!
//! [`Interaction`] interprets events against the active tool and the current
//! snapshot of the session's current document. It never holds document
//! state itself: every handler takes the [`Session`] explicitly and reports
//! what happened as a list of [`Action`]s for the host.

mod gesture;
mod text_edit;

pub use gesture::{Finished, Gesture, Segment};
pub use text_edit::{TextEdit, TextOutcome};

use crate::config::EditorConfig;
use crate::content::ContentId;
use crate::element::{
    ApproxTextMeasure, Element, ElementId, ElementKind, ElementTrait, Image, Text, TextMeasure,
};
use crate::hit::{hit_test_kind, resize_handle_at};
use crate::history::Snapshot;
use crate::input::{Key, KeyEvent, PointerEvent};
use crate::notice::Notice;
use crate::session::Session;
use crate::tools::ToolKind;
use kurbo::{Point, Vec2};

/// Something the host should react to.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// A new history entry was committed (or undo/redo moved the cursor).
    Committed,
    /// Paint this segment directly; the stroke is not committed yet.
    DrawSegment(Segment),
    /// Show the inline text editor for this draft.
    TextEditorOpened(Text),
    /// The draft being edited changed.
    TextEditorUpdated(Text),
    TextEditorClosed,
    /// The active tool changed without the host asking.
    ToolChanged(ToolKind),
    SelectionChanged(Option<ElementId>),
    /// Re-render the surface.
    RenderNeeded,
    Notice(Notice),
}

/// Why a text commit pass runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextCommitReason {
    /// Confirm key.
    Confirm,
    /// Pointer-down outside the editor.
    ClickOutside,
    /// Tool switch or document switch.
    Interrupt,
}

/// An image payload waiting to be placed with the image tool.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingImage {
    pub content_id: ContentId,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Default)]
enum Phase {
    #[default]
    Idle,
    Active(Gesture),
    EditingText(TextEdit),
}

/// Selected element, re-resolved by id before each use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Selection {
    id: ElementId,
    index: usize,
}

/// Gesture state machine for one editor.
pub struct Interaction {
    phase: Phase,
    selection: Option<Selection>,
    clipboard: Option<Element>,
    pending_image: Option<PendingImage>,
    config: EditorConfig,
    measure: Box<dyn TextMeasure>,
}

impl Default for Interaction {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

impl Interaction {
    pub fn new(config: EditorConfig) -> Self {
        Self::with_measure(config, Box::new(ApproxTextMeasure))
    }

    /// Use a custom text measurement (e.g. backed by a font engine).
    pub fn with_measure(config: EditorConfig, measure: Box<dyn TextMeasure>) -> Self {
        Self {
            phase: Phase::Idle,
            selection: None,
            clipboard: None,
            pending_image: None,
            config,
            measure,
        }
    }

    pub fn measure(&self) -> &dyn TextMeasure {
        self.measure.as_ref()
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.phase, Phase::Idle)
    }

    pub fn is_editing_text(&self) -> bool {
        matches!(self.phase, Phase::EditingText(_))
    }

    pub fn text_edit(&self) -> Option<&TextEdit> {
        match &self.phase {
            Phase::EditingText(edit) => Some(edit),
            _ => None,
        }
    }

    pub fn gesture(&self) -> Option<&Gesture> {
        match &self.phase {
            Phase::Active(gesture) => Some(gesture),
            _ => None,
        }
    }

    pub fn pending_image(&self) -> Option<&PendingImage> {
        self.pending_image.as_ref()
    }

    /// Id of the selected element, if it still exists in `snapshot`.
    pub fn selection(&self, snapshot: &Snapshot) -> Option<ElementId> {
        let selection = self.selection?;
        snapshot.contains(selection.id).then_some(selection.id)
    }

    /// Select an element by id. Unknown ids clear the selection.
    pub fn select(&mut self, session: &Session, id: Option<ElementId>) {
        self.selection = id.and_then(|id| {
            session
                .current_snapshot()
                .find(id)
                .map(|(index, _)| Selection { id, index })
        });
    }

    /// Snapshot to display: the committed snapshot with any in-progress
    /// gesture applied and the element under the text editor hidden.
    pub fn display_snapshot(&self, session: &Session) -> Snapshot {
        let base = session.current_snapshot();
        match &self.phase {
            Phase::Idle => base.clone(),
            Phase::Active(Gesture::Drawing(stroke)) => base.with_pushed(stroke.clone()),
            Phase::Active(gesture) => base.with_upserted(gesture.preview()),
            Phase::EditingText(edit) => match edit.target_id() {
                Some(id) => base.without(id),
                None => base.clone(),
            },
        }
    }

    /// Drop the selection if its element no longer exists, refreshing the
    /// cached index otherwise.
    pub fn revalidate(&mut self, snapshot: &Snapshot) -> Option<Action> {
        let selection = self.selection?;
        if snapshot.get(selection.index).is_some_and(|e| e.id() == selection.id) {
            return None;
        }
        match snapshot.find(selection.id) {
            Some((index, _)) => {
                self.selection = Some(Selection { id: selection.id, index });
                None
            }
            None => {
                log::debug!("Dropping stale selection {}", selection.id);
                self.selection = None;
                Some(Action::SelectionChanged(None))
            }
        }
    }

    /// Dispatch a pointer event.
    pub fn handle_pointer(&mut self, session: &mut Session, event: PointerEvent) -> Vec<Action> {
        match event {
            PointerEvent::Down { position } => self.pointer_down(session, position),
            PointerEvent::Move { position } => self.pointer_move(position),
            PointerEvent::Up { position } => self.pointer_up(session, Some(position)),
            PointerEvent::Leave => self.pointer_up(session, None),
            PointerEvent::DoubleClick { position } => self.double_click(session, position),
        }
    }

    fn pointer_down(&mut self, session: &mut Session, point: Point) -> Vec<Action> {
        let mut actions = Vec::new();

        match &self.phase {
            Phase::EditingText(edit) => {
                if edit.draft().hit_test(point, 0.0, self.measure.as_ref()) {
                    return actions;
                }
                self.commit_text(session, TextCommitReason::ClickOutside, &mut actions);
                return actions;
            }
            Phase::Active(_) => {
                // A second pointer-down without an up: finalize the first gesture.
                self.finish_gesture(session, None, &mut actions);
            }
            Phase::Idle => {}
        }

        match session.settings.tool {
            ToolKind::Select => self.select_down(session, point, &mut actions),
            ToolKind::Draw | ToolKind::Erase => {
                let settings = &session.settings;
                let erase = settings.tool == ToolKind::Erase;
                let gesture = Gesture::draw(point, settings.color, settings.size, erase);
                actions.push(Action::DrawSegment(Segment {
                    from: point,
                    to: point,
                    color: settings.color,
                    width: settings.size,
                    erase,
                }));
                self.phase = Phase::Active(gesture);
            }
            ToolKind::Text => {
                let snapshot = session.current_snapshot();
                let tolerance = self.config.hit_tolerance;
                let measure = self.measure.as_ref();
                let hit = hit_test_kind(point, snapshot, ElementKind::Text, tolerance, measure);
                let edit = match hit {
                    Some(hit) => hit.element.as_text().map(TextEdit::existing),
                    None => None,
                }
                .unwrap_or_else(|| TextEdit::fresh(point, &session.settings));
                self.open_text_edit(edit, &mut actions);
            }
            ToolKind::ImagePlace => self.place_image(session, point, &mut actions),
        }
        actions
    }

    fn select_down(&mut self, session: &mut Session, point: Point, actions: &mut Vec<Action>) {
        let snapshot = session.current_snapshot();

        // Handles are only live on an already-selected image.
        if let Some(image) = self.resolve_selection(snapshot).and_then(|(_, e)| e.as_image()) {
            if let Some(corner) = resize_handle_at(point, image, self.config.handle_radius) {
                self.phase = Phase::Active(Gesture::resize(image, corner));
                return;
            }
        }

        let tolerance = self.config.hit_tolerance;
        let measure = self.measure.as_ref();
        let hit = hit_test_kind(point, snapshot, ElementKind::Text, tolerance, measure)
            .or_else(|| hit_test_kind(point, snapshot, ElementKind::Image, tolerance, measure));
        match hit {
            Some(hit) => {
                let id = hit.element.id();
                let changed = self.selection.map(|s| s.id) != Some(id);
                self.selection = Some(Selection { id, index: hit.index });
                self.phase = Phase::Active(Gesture::drag(hit.element, point));
                if changed {
                    actions.push(Action::SelectionChanged(Some(id)));
                    actions.push(Action::RenderNeeded);
                }
            }
            None => {
                if self.selection.take().is_some() {
                    actions.push(Action::SelectionChanged(None));
                    actions.push(Action::RenderNeeded);
                }
                self.phase = Phase::Idle;
            }
        }
    }

    fn pointer_move(&mut self, point: Point) -> Vec<Action> {
        let Phase::Active(gesture) = &mut self.phase else {
            return Vec::new();
        };
        match gesture.update(point, self.config.min_image_size) {
            Some(segment) => vec![Action::DrawSegment(segment)],
            None if matches!(gesture, Gesture::Drawing(_)) => Vec::new(),
            None => vec![Action::RenderNeeded],
        }
    }

    /// Pointer-up, or pointer-leave when `point` is `None`. Both finalize.
    fn pointer_up(&mut self, session: &mut Session, point: Option<Point>) -> Vec<Action> {
        let mut actions = Vec::new();
        if matches!(self.phase, Phase::Active(_)) {
            self.finish_gesture(session, point, &mut actions);
        }
        actions
    }

    fn double_click(&mut self, session: &mut Session, point: Point) -> Vec<Action> {
        let mut actions = Vec::new();
        if session.settings.tool != ToolKind::Select || self.is_editing_text() {
            return actions;
        }
        if matches!(self.phase, Phase::Active(_)) {
            self.finish_gesture(session, None, &mut actions);
        }
        let hit = hit_test_kind(
            point,
            session.current_snapshot(),
            ElementKind::Text,
            self.config.hit_tolerance,
            self.measure.as_ref(),
        );
        if let Some(text) = hit.and_then(|h| h.element.as_text()) {
            let edit = TextEdit::existing(text);
            self.open_text_edit(edit, &mut actions);
        }
        actions
    }

    /// Dispatch a key press.
    pub fn handle_key(&mut self, session: &mut Session, event: KeyEvent) -> Vec<Action> {
        let mut actions = Vec::new();

        if let Phase::EditingText(edit) = &mut self.phase {
            match event.key {
                Key::Character(c) if !event.modifiers.command() => edit.insert_char(c),
                Key::Backspace => edit.backspace(),
                Key::Enter if event.modifiers.shift => edit.insert_char('\n'),
                Key::Enter => {
                    self.commit_text(session, TextCommitReason::Confirm, &mut actions);
                    return actions;
                }
                Key::Escape => {
                    self.cancel_text(&mut actions);
                    return actions;
                }
                _ => return actions,
            }
            actions.push(Action::TextEditorUpdated(edit.draft()));
            return actions;
        }

        if !self.is_idle() {
            return actions;
        }

        match event.key {
            Key::Delete | Key::Backspace => self.delete_selection(session, &mut actions),
            Key::Escape => {
                if self.selection.take().is_some() {
                    actions.push(Action::SelectionChanged(None));
                    actions.push(Action::RenderNeeded);
                }
            }
            Key::Character(c) if event.modifiers.command() => match c.to_ascii_lowercase() {
                'c' => self.copy(session),
                'v' => actions.extend(self.paste(session)),
                'z' if event.modifiers.shift => actions.extend(self.redo(session)),
                'z' => actions.extend(self.undo(session)),
                'y' => actions.extend(self.redo(session)),
                _ => {}
            },
            _ => {}
        }
        actions
    }

    /// Switch tools. An open text editor gets a commit pass first (an empty
    /// fresh box is discarded) and an active gesture is finalized.
    pub fn set_tool(&mut self, session: &mut Session, tool: ToolKind) -> Vec<Action> {
        let mut actions = Vec::new();
        if session.settings.tool == tool && !self.is_editing_text() {
            return actions;
        }
        self.interrupt(session, &mut actions);
        session.settings.tool = tool;
        if tool != ToolKind::ImagePlace {
            self.pending_image = None;
        }
        if tool != ToolKind::Select && self.selection.take().is_some() {
            actions.push(Action::SelectionChanged(None));
            actions.push(Action::RenderNeeded);
        }
        actions
    }

    /// Finalize whatever is in progress: commit an active gesture and run a
    /// commit pass on an open text editor. Used before tool and document
    /// switches.
    pub fn interrupt(&mut self, session: &mut Session, actions: &mut Vec<Action>) {
        match &self.phase {
            Phase::Active(_) => self.finish_gesture(session, None, actions),
            Phase::EditingText(_) => {
                self.commit_text(session, TextCommitReason::Interrupt, actions)
            }
            Phase::Idle => {}
        }
    }

    /// Forget per-document state after the current document changed.
    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.selection = None;
    }

    /// Apply a style setting to the open text editor, if any.
    pub fn restyle_text_edit(&mut self, session: &Session) -> Vec<Action> {
        let Phase::EditingText(edit) = &mut self.phase else {
            return Vec::new();
        };
        let settings = &session.settings;
        edit.font = settings.font;
        edit.size = settings.font_size;
        edit.color = settings.color;
        vec![Action::TextEditorUpdated(edit.draft())]
    }

    pub fn undo(&mut self, session: &mut Session) -> Vec<Action> {
        if !self.is_idle() {
            return Vec::new();
        }
        if !session.current_document_mut().history.undo() {
            return Vec::new();
        }
        self.after_cursor_move(session)
    }

    pub fn redo(&mut self, session: &mut Session) -> Vec<Action> {
        if !self.is_idle() {
            return Vec::new();
        }
        if !session.current_document_mut().history.redo() {
            return Vec::new();
        }
        self.after_cursor_move(session)
    }

    fn after_cursor_move(&mut self, session: &Session) -> Vec<Action> {
        let mut actions = vec![Action::Committed, Action::RenderNeeded];
        actions.extend(self.revalidate(session.current_snapshot()));
        actions
    }

    /// Copy the selected element to the internal clipboard.
    pub fn copy(&mut self, session: &Session) {
        let snapshot = session.current_snapshot();
        if let Some((_, element)) = self.resolve_selection(snapshot) {
            self.clipboard = Some(element.clone());
        }
    }

    /// Paste the clipboard offset from its source, with a fresh id. Images
    /// get a fresh content id. The pasted element becomes the selection and
    /// the next paste offsets from it.
    pub fn paste(&mut self, session: &mut Session) -> Vec<Action> {
        let mut actions = Vec::new();
        let Some(mut element) = self.clipboard.clone() else {
            return actions;
        };
        element.regenerate_id();
        let offset = self.config.paste_offset;
        element.translate(Vec2::new(offset, offset));
        if let Element::Image(image) = &mut element {
            match session.content.duplicate(&image.content_id) {
                Some(id) => image.content_id = id,
                None => log::warn!("Pasting image with missing content {}", image.content_id),
            }
        }
        let id = element.id();
        let content = element.as_image().map(|i| i.content_id.clone());
        let pasted = element.clone();
        if self.commit(session, &mut actions, |s| s.with_pushed(pasted)) {
            if let Some(content) = content {
                session.current_document_mut().own_content(content);
            }
            self.clipboard = Some(element);
            self.select(session, Some(id));
            actions.push(Action::SelectionChanged(Some(id)));
        }
        actions
    }

    /// Remove the selected element.
    pub fn delete_selection(&mut self, session: &mut Session, actions: &mut Vec<Action>) {
        let Some((_, element)) = self.resolve_selection(session.current_snapshot()) else {
            return;
        };
        let id = element.id();
        if self.commit(session, actions, |s| s.without(id)) {
            self.selection = None;
            actions.push(Action::SelectionChanged(None));
        }
    }

    /// Store an image payload and arm the image tool with it.
    pub fn import_image(
        &mut self,
        session: &mut Session,
        bytes: Vec<u8>,
        width: u32,
        height: u32,
    ) -> (ContentId, Vec<Action>) {
        let mut actions = Vec::new();
        self.interrupt(session, &mut actions);
        let content_id = session.content.insert(bytes, width, height);
        self.pending_image = Some(PendingImage {
            content_id: content_id.clone(),
            width: f64::from(width.max(1)),
            height: f64::from(height.max(1)),
        });
        if session.settings.tool != ToolKind::ImagePlace {
            session.settings.tool = ToolKind::ImagePlace;
            actions.push(Action::ToolChanged(ToolKind::ImagePlace));
        }
        if self.selection.take().is_some() {
            actions.push(Action::SelectionChanged(None));
        }
        (content_id, actions)
    }

    fn place_image(&mut self, session: &mut Session, point: Point, actions: &mut Vec<Action>) {
        if let Some(pending) = self.pending_image.take() {
            let fit = self.config.image_fit_size;
            let image = Image::new(pending.content_id.clone(), point, pending.width, pending.height)
                .fit_within(fit, fit);
            let id = image.id;
            if self.commit(session, actions, |s| s.with_pushed(image)) {
                session.current_document_mut().own_content(pending.content_id);
                self.select(session, Some(id));
                actions.push(Action::SelectionChanged(Some(id)));
            }
        } else {
            log::debug!("Image tool used without a pending image");
        }
        session.settings.tool = ToolKind::Select;
        actions.push(Action::ToolChanged(ToolKind::Select));
    }

    fn open_text_edit(&mut self, edit: TextEdit, actions: &mut Vec<Action>) {
        actions.push(Action::TextEditorOpened(edit.draft()));
        actions.push(Action::RenderNeeded);
        self.phase = Phase::EditingText(edit);
    }

    /// Run a commit pass on the open text editor.
    pub fn commit_text(
        &mut self,
        session: &mut Session,
        reason: TextCommitReason,
        actions: &mut Vec<Action>,
    ) {
        let Phase::EditingText(edit) = &self.phase else {
            return;
        };
        match edit.resolve() {
            TextOutcome::KeepEditing if reason == TextCommitReason::Interrupt => {
                self.close_text(actions);
            }
            TextOutcome::KeepEditing => {}
            TextOutcome::Unchanged => self.close_text(actions),
            TextOutcome::Insert(text) => {
                self.commit(session, actions, |s| s.with_pushed(text));
                self.close_text(actions);
            }
            TextOutcome::Replace(text) => {
                let id = text.id;
                self.commit(session, actions, |s| s.without(id).with_pushed(text));
                self.close_text(actions);
            }
            TextOutcome::Delete(id) => {
                self.commit(session, actions, |s| s.without(id));
                self.close_text(actions);
                actions.extend(self.revalidate(session.current_snapshot()));
            }
        }
    }

    /// Discard the open text editor.
    pub fn cancel_text(&mut self, actions: &mut Vec<Action>) {
        if let Phase::EditingText(edit) = &mut self.phase {
            edit.cancel();
            self.close_text(actions);
        }
    }

    fn close_text(&mut self, actions: &mut Vec<Action>) {
        self.phase = Phase::Idle;
        actions.push(Action::TextEditorClosed);
        actions.push(Action::RenderNeeded);
    }

    fn finish_gesture(
        &mut self,
        session: &mut Session,
        point: Option<Point>,
        actions: &mut Vec<Action>,
    ) {
        let mut gesture = match std::mem::take(&mut self.phase) {
            Phase::Active(gesture) => gesture,
            other => {
                self.phase = other;
                return;
            }
        };
        if let Some(point) = point {
            if let Some(segment) = gesture.update(point, self.config.min_image_size) {
                actions.push(Action::DrawSegment(segment));
            }
        }
        match gesture.finish() {
            Finished::Append(element) => {
                self.commit(session, actions, |s| s.with_pushed(element));
            }
            Finished::Replace(element) => {
                let id = element.id();
                if session.current_snapshot().contains(id) {
                    self.commit(session, actions, |s| s.with_upserted(element));
                } else {
                    log::debug!("Element {} vanished mid-gesture", id);
                    actions.push(Action::RenderNeeded);
                }
                actions.extend(self.revalidate(session.current_snapshot()));
            }
            Finished::Nothing => actions.push(Action::RenderNeeded),
        }
    }

    fn resolve_selection<'a>(&mut self, snapshot: &'a Snapshot) -> Option<(usize, &'a Element)> {
        self.revalidate(snapshot);
        let selection = self.selection?;
        snapshot.get(selection.index).map(|e| (selection.index, e))
    }

    /// Commit through the current document's history. Rejected geometry
    /// becomes a notice.
    fn commit(
        &self,
        session: &mut Session,
        actions: &mut Vec<Action>,
        build: impl FnOnce(&Snapshot) -> Snapshot,
    ) -> bool {
        match session.current_document_mut().history.commit(build) {
            Ok(()) => {
                actions.push(Action::Committed);
                actions.push(Action::RenderNeeded);
                true
            }
            Err(e) => {
                log::warn!("Rejected edit: {}", e);
                actions.push(Action::Notice(Notice::warning(format!("Edit rejected: {}", e))));
                false
            }
        }
    }
}
