//! Tool kinds and the settings new elements are created with.

use crate::element::{FontFamily, HexColor, Text};
use serde::{Deserialize, Serialize};

/// Available tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ToolKind {
    #[default]
    Select,
    Draw,
    Erase,
    Text,
    ImagePlace,
}

impl ToolKind {
    /// Whether pointer gestures with this tool produce strokes.
    pub fn is_stroke_tool(self) -> bool {
        matches!(self, ToolKind::Draw | ToolKind::Erase)
    }

    pub fn name(self) -> &'static str {
        match self {
            ToolKind::Select => "select",
            ToolKind::Draw => "draw",
            ToolKind::Erase => "erase",
            ToolKind::Text => "text",
            ToolKind::ImagePlace => "image-place",
        }
    }
}

/// Current tool plus the style applied to new elements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSettings {
    pub tool: ToolKind,
    pub color: HexColor,
    /// Stroke width for draw and erase.
    pub size: f64,
    pub font: FontFamily,
    pub font_size: f64,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            tool: ToolKind::Select,
            color: HexColor::black(),
            size: 4.0,
            font: FontFamily::default(),
            font_size: Text::DEFAULT_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_names_match_serialization() {
        let tools = [
            ToolKind::Select,
            ToolKind::Draw,
            ToolKind::Erase,
            ToolKind::Text,
            ToolKind::ImagePlace,
        ];
        for tool in tools {
            let json = serde_json::to_string(&tool).unwrap();
            assert_eq!(json, format!("\"{}\"", tool.name()));
        }
    }

    #[test]
    fn test_stroke_tools() {
        assert!(ToolKind::Draw.is_stroke_tool());
        assert!(ToolKind::Erase.is_stroke_tool());
        assert!(!ToolKind::Text.is_stroke_tool());
    }
}
