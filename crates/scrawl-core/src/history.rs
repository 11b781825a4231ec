//! Immutable, branchable document history backing undo/redo.
//!
//! A [`History`] is an append-only list of [`Snapshot`]s plus a cursor.
//! Undo and redo only move the cursor; committing while the cursor is not
//! at the end truncates the redo branch first. Snapshots share unchanged
//! elements through `Arc`, so a commit only allocates the elements it adds
//! or replaces.

use crate::element::{Element, ElementId, GeometryError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::sync::Arc;

/// Complete visible state of a document at one point in history.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    elements: Arc<Vec<Arc<Element>>>,
}

impl Snapshot {
    /// An empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_elements(elements: impl IntoIterator<Item = Element>) -> Self {
        Self {
            elements: Arc::new(elements.into_iter().map(Arc::new).collect()),
        }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Elements in paint order (back to front).
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Element> + ExactSizeIterator {
        self.elements.iter().map(|e| e.as_ref())
    }

    pub fn get(&self, index: usize) -> Option<&Element> {
        self.elements.get(index).map(|e| e.as_ref())
    }

    /// Shared handle to the element at `index`.
    pub fn get_shared(&self, index: usize) -> Option<&Arc<Element>> {
        self.elements.get(index)
    }

    /// Find an element by id, returning its index.
    pub fn find(&self, id: ElementId) -> Option<(usize, &Element)> {
        self.iter().enumerate().find(|(_, e)| e.id() == id)
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.find(id).is_some()
    }

    /// A copy with `element` appended on top.
    pub fn with_pushed(&self, element: impl Into<Element>) -> Self {
        let mut elements = Vec::with_capacity(self.len() + 1);
        elements.extend(self.elements.iter().cloned());
        elements.push(Arc::new(element.into()));
        Self::from_shared(elements)
    }

    /// A copy with the element at `index` replaced. Out-of-range indices
    /// return an unchanged copy.
    pub fn with_replaced(&self, index: usize, element: impl Into<Element>) -> Self {
        let mut elements: Vec<_> = self.elements.iter().cloned().collect();
        if let Some(slot) = elements.get_mut(index) {
            *slot = Arc::new(element.into());
        }
        Self::from_shared(elements)
    }

    /// A copy without the element at `index`.
    pub fn with_removed(&self, index: usize) -> Self {
        let elements = self
            .elements
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(_, e)| e.clone())
            .collect();
        Self::from_shared(elements)
    }

    /// A copy without the element with the given id.
    pub fn without(&self, id: ElementId) -> Self {
        let elements = self.elements.iter().filter(|e| e.id() != id).cloned().collect();
        Self::from_shared(elements)
    }

    /// Replace the element with the same id in place, or append it.
    pub fn with_upserted(&self, element: Element) -> Self {
        match self.find(element.id()) {
            Some((index, _)) => self.with_replaced(index, element),
            None => self.with_pushed(element),
        }
    }

    /// Whether two snapshots are the same committed value (not just equal).
    pub fn ptr_eq(&self, other: &Snapshot) -> bool {
        Arc::ptr_eq(&self.elements, &other.elements)
    }

    fn from_shared(elements: Vec<Arc<Element>>) -> Self {
        Self {
            elements: Arc::new(elements),
        }
    }
}

impl PartialEq for Snapshot {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.iter().eq(other.iter())
    }
}

impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

impl<'de> Deserialize<'de> for Snapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let elements = Vec::<Element>::deserialize(deserializer)?;
        Ok(Snapshot::from_elements(elements))
    }
}

/// History tuning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Maximum number of entries to keep. `None` keeps everything.
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Per-document list of snapshots with an undo/redo cursor.
#[derive(Debug, Clone, Default)]
pub struct History {
    snapshots: Vec<Snapshot>,
    cursor: Option<usize>,
    config: HistoryConfig,
    empty: Snapshot,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: HistoryConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// A history whose first entry is the empty snapshot, so the first edit
    /// can be undone.
    pub fn seeded(config: HistoryConfig) -> Self {
        Self {
            snapshots: vec![Snapshot::new()],
            cursor: Some(0),
            config,
            empty: Snapshot::new(),
        }
    }

    /// Rebuild a history from persisted parts. A cursor outside the list is
    /// clamped to the last entry (or -1 when there are no entries).
    pub fn from_parts(snapshots: Vec<Snapshot>, cursor: i64, config: HistoryConfig) -> Self {
        let cursor = if snapshots.is_empty() {
            None
        } else if cursor < 0 {
            log::warn!("History cursor {} out of range, clamping to 0", cursor);
            Some(0)
        } else {
            let last = snapshots.len() - 1;
            let cursor = usize::try_from(cursor).unwrap_or(last);
            if cursor > last {
                log::warn!("History cursor {} out of range, clamping to {}", cursor, last);
            }
            Some(cursor.min(last))
        };
        let mut history = Self {
            snapshots,
            cursor,
            config,
            empty: Snapshot::new(),
        };
        history.enforce_limit();
        history
    }

    /// Build the next snapshot from the current one and append it, dropping
    /// any redo branch. Newly added elements are validated first; on error
    /// the history is left untouched.
    pub fn commit<F>(&mut self, build: F) -> Result<(), GeometryError>
    where
        F: FnOnce(&Snapshot) -> Snapshot,
    {
        let current = self.current().clone();
        let next = build(&current);
        validate_new_elements(&current, &next)?;

        let keep = self.cursor.map_or(0, |c| c + 1);
        self.snapshots.truncate(keep);
        self.snapshots.push(next);
        self.cursor = Some(self.snapshots.len() - 1);
        self.enforce_limit();
        Ok(())
    }

    /// Move the cursor back one entry. Returns false when there is nothing
    /// to undo.
    pub fn undo(&mut self) -> bool {
        match self.cursor {
            Some(c) if c > 0 => {
                self.cursor = Some(c - 1);
                true
            }
            _ => false,
        }
    }

    /// Move the cursor forward one entry. Returns false when there is
    /// nothing to redo.
    pub fn redo(&mut self) -> bool {
        let next = self.cursor.map_or(0, |c| c + 1);
        if next < self.snapshots.len() && self.cursor.is_some() {
            self.cursor = Some(next);
            true
        } else {
            false
        }
    }

    pub fn can_undo(&self) -> bool {
        matches!(self.cursor, Some(c) if c > 0)
    }

    pub fn can_redo(&self) -> bool {
        matches!(self.cursor, Some(c) if c + 1 < self.snapshots.len())
    }

    /// Snapshot at the cursor, or an empty snapshot.
    pub fn current(&self) -> &Snapshot {
        self.cursor
            .and_then(|c| self.snapshots.get(c))
            .unwrap_or(&self.empty)
    }

    /// Cursor position, or -1 when the history is empty.
    pub fn cursor_index(&self) -> i64 {
        self.cursor.map_or(-1, |c| c as i64)
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    pub fn config(&self) -> HistoryConfig {
        self.config
    }

    fn enforce_limit(&mut self) {
        let Some(limit) = self.config.limit else {
            return;
        };
        let limit = limit.max(1);
        if self.snapshots.len() <= limit {
            return;
        }
        let excess = self.snapshots.len() - limit;
        // Never drop the entry under the cursor.
        let excess = excess.min(self.cursor.unwrap_or(0));
        self.snapshots.drain(..excess);
        self.cursor = self.cursor.map(|c| c - excess);
    }
}

fn validate_new_elements(before: &Snapshot, after: &Snapshot) -> Result<(), GeometryError> {
    let shared: HashSet<*const Element> = before.elements.iter().map(Arc::as_ptr).collect();
    after
        .elements
        .iter()
        .filter(|e| !shared.contains(&Arc::as_ptr(*e)))
        .try_for_each(|e| e.validate())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{HexColor, Stroke, Text};
    use kurbo::Point;

    fn stroke_at(x: f64) -> Element {
        let points = vec![Point::new(x, 0.0), Point::new(x, 10.0)];
        Stroke::from_points(points, HexColor::black(), 2.0).into()
    }

    fn commit_n(history: &mut History, n: usize) {
        for i in 0..n {
            history.commit(|s| s.with_pushed(stroke_at(i as f64))).unwrap();
        }
    }

    #[test]
    fn test_empty_history() {
        let mut history = History::new();
        assert!(history.current().is_empty());
        assert_eq!(history.cursor_index(), -1);
        assert!(!history.can_undo());
        assert!(!history.can_redo());
        assert!(!history.undo());
        assert!(!history.redo());
    }

    #[test]
    fn test_undo_redo_arithmetic() {
        // N commits, U undos, R redos leaves the state after N - U + R commits.
        for (n, u, r) in [(5usize, 3usize, 1usize), (4, 0, 2), (3, 2, 2), (6, 5, 3)] {
            let mut history = History::new();
            commit_n(&mut history, n);
            let mut states = Vec::new();
            for i in 0..history.len() {
                states.push(history.snapshots()[i].clone());
            }
            for _ in 0..u {
                history.undo();
            }
            for _ in 0..r {
                history.redo();
            }
            let expected = n - u + r.min(u);
            assert_eq!(history.current().len(), expected);
            assert!(history.current().ptr_eq(&states[expected - 1]));
        }
    }

    #[test]
    fn test_seeded_undo_redo_arithmetic_reaches_empty() {
        // Undoing every commit is only possible from a seeded history.
        for (n, u, r) in [(3usize, 3usize, 0usize), (3, 3, 3), (3, 3, 1), (2, 4, 5)] {
            let mut history = History::seeded(HistoryConfig::default());
            commit_n(&mut history, n);
            let states: Vec<Snapshot> = history.snapshots().to_vec();
            for _ in 0..u {
                history.undo();
            }
            for _ in 0..r {
                history.redo();
            }
            let undone = u.min(n);
            let expected = n - undone + r.min(undone);
            assert_eq!(history.current().len(), expected);
            assert!(history.current().ptr_eq(&states[expected]));
            assert_eq!(history.can_undo(), expected > 0);
            assert_eq!(history.can_redo(), expected < n);
        }
    }

    #[test]
    fn test_seeded_history_undoes_to_empty() {
        let mut history = History::seeded(HistoryConfig::default());
        assert!(!history.can_undo());
        commit_n(&mut history, 1);
        assert!(history.undo());
        assert!(history.current().is_empty());
        assert!(history.redo());
        assert_eq!(history.current().len(), 1);
    }

    #[test]
    fn test_commit_truncates_redo_branch() {
        let mut history = History::new();
        commit_n(&mut history, 3);
        history.undo();
        history.undo();
        assert!(history.can_redo());

        history
            .commit(|s| s.with_pushed(Text::new(Point::ZERO, "branch".to_string())))
            .unwrap();
        assert_eq!(history.len(), 2);
        assert!(!history.can_redo());
        assert_eq!(history.cursor_index(), 1);
        assert!(history.current().get(1).unwrap().as_text().is_some());
    }

    #[test]
    fn test_structural_sharing() {
        let mut history = History::new();
        commit_n(&mut history, 2);
        let before = history.current().clone();
        history.commit(|s| s.with_pushed(stroke_at(99.0))).unwrap();
        let after = history.current();
        assert!(Arc::ptr_eq(before.get_shared(0).unwrap(), after.get_shared(0).unwrap()));
        assert!(Arc::ptr_eq(before.get_shared(1).unwrap(), after.get_shared(1).unwrap()));
        assert!(!before.ptr_eq(after));
    }

    #[test]
    fn test_invalid_geometry_rejected() {
        let mut history = History::new();
        commit_n(&mut history, 1);
        let bad = Stroke::from_points(vec![Point::new(f64::NAN, 0.0)], HexColor::black(), 2.0);
        assert!(history.commit(|s| s.with_pushed(bad)).is_err());
        assert_eq!(history.len(), 1);
        assert_eq!(history.current().len(), 1);
    }

    #[test]
    fn test_limit_drops_oldest() {
        let mut history = History::with_config(HistoryConfig { limit: Some(3) });
        commit_n(&mut history, 5);
        assert_eq!(history.len(), 3);
        assert_eq!(history.cursor_index(), 2);
        assert_eq!(history.current().len(), 5);
        assert!(history.undo());
        assert!(history.undo());
        assert!(!history.undo());
        assert_eq!(history.current().len(), 3);
    }

    #[test]
    fn test_from_parts_clamps_cursor() {
        let snapshots = vec![Snapshot::new(), Snapshot::from_elements([stroke_at(1.0)])];
        let history = History::from_parts(snapshots.clone(), 7, HistoryConfig::default());
        assert_eq!(history.cursor_index(), 1);
        let history = History::from_parts(snapshots, -1, HistoryConfig::default());
        assert_eq!(history.cursor_index(), 0);
        let history = History::from_parts(Vec::new(), 3, HistoryConfig::default());
        assert_eq!(history.cursor_index(), -1);
    }

    #[test]
    fn test_snapshot_serializes_as_element_list() {
        let snapshot = Snapshot::from_elements([stroke_at(1.0)]);
        let json = serde_json::to_value(&snapshot).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["kind"], "stroke");
        let back: Snapshot = serde_json::from_value(json).unwrap();
        assert_eq!(back, snapshot);
    }

    #[test]
    fn test_upsert_and_without() {
        let text = Text::new(Point::ZERO, "a".to_string());
        let id = text.id;
        let snapshot = Snapshot::new().with_pushed(text.clone());
        let mut edited = text;
        edited.content = "b".to_string();
        let snapshot = snapshot.with_upserted(edited.into());
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get(0).unwrap().as_text().unwrap().content, "b");
        assert!(snapshot.without(id).is_empty());
    }
}
