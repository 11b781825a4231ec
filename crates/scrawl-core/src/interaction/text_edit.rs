//! In-place text editing buffer and its commit policy.

use crate::element::{ElementId, FontFamily, HexColor, Text};
use crate::tools::ToolSettings;
use kurbo::Point;

/// What committing a text edit does to the document.
#[derive(Debug, Clone, PartialEq)]
pub enum TextOutcome {
    /// A fresh, empty box: keep the editor open.
    KeepEditing,
    /// Nothing changed; close the editor without committing.
    Unchanged,
    /// Append a new text element.
    Insert(Text),
    /// Remove the edited element and append its new version on top.
    Replace(Text),
    /// The edited element was emptied; remove it.
    Delete(ElementId),
}

/// An open text editor.
#[derive(Debug, Clone, PartialEq)]
pub struct TextEdit {
    /// Element being re-edited, or `None` for a fresh box.
    target: Option<Text>,
    pub position: Point,
    pub buffer: String,
    pub font: FontFamily,
    pub size: f64,
    pub color: HexColor,
}

impl TextEdit {
    /// A fresh, empty box at `position` styled from the tool settings.
    pub fn fresh(position: Point, settings: &ToolSettings) -> Self {
        Self {
            target: None,
            position,
            buffer: String::new(),
            font: settings.font,
            size: settings.font_size,
            color: settings.color,
        }
    }

    /// Re-edit an existing element, pre-filled with its content.
    pub fn existing(text: &Text) -> Self {
        Self {
            target: Some(text.clone()),
            position: text.position,
            buffer: text.content.clone(),
            font: text.font,
            size: text.size,
            color: text.color,
        }
    }

    /// Id of the element being re-edited.
    pub fn target_id(&self) -> Option<ElementId> {
        self.target.as_ref().map(|t| t.id)
    }

    pub fn is_fresh(&self) -> bool {
        self.target.is_none()
    }

    /// Content the editor was opened with.
    pub fn prefill(&self) -> &str {
        self.target.as_ref().map_or("", |t| t.content.as_str())
    }

    pub fn insert_char(&mut self, c: char) {
        self.buffer.push(c);
    }

    pub fn backspace(&mut self) {
        self.buffer.pop();
    }

    /// Discard typed changes, restoring the pre-fill.
    pub fn cancel(&mut self) {
        self.buffer = self.prefill().to_string();
        if let Some(target) = &self.target {
            self.font = target.font;
            self.size = target.size;
            self.color = target.color;
        }
    }

    /// The element as it would be committed right now.
    pub fn draft(&self) -> Text {
        let mut text = match &self.target {
            Some(target) => target.clone(),
            None => Text::new(self.position, String::new()),
        };
        text.content = self.buffer.clone();
        text.font = self.font;
        text.size = self.size;
        text.color = self.color;
        text
    }

    fn style_changed(&self) -> bool {
        self.target
            .as_ref()
            .is_some_and(|t| t.font != self.font || t.size != self.size || t.color != self.color)
    }

    /// Decide what a commit pass does with the current buffer.
    pub fn resolve(&self) -> TextOutcome {
        match &self.target {
            None if self.buffer.is_empty() => TextOutcome::KeepEditing,
            None => TextOutcome::Insert(self.draft()),
            Some(target) if self.buffer.is_empty() => TextOutcome::Delete(target.id),
            Some(target) if self.buffer == target.content && !self.style_changed() => {
                TextOutcome::Unchanged
            }
            Some(_) => TextOutcome::Replace(self.draft()),
        }
    }
}
