//! Text element and text measurement.

use super::{ElementId, ElementTrait, GeometryError, HexColor, ensure_finite, ensure_positive};
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Line height as a multiple of the font size.
pub const LINE_HEIGHT_FACTOR: f64 = 1.2;

/// Font family options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontFamily {
    #[default]
    Sans,
    Serif,
    Mono,
    Hand,
}

impl FontFamily {
    /// CSS-style family name.
    pub fn name(&self) -> &'static str {
        match self {
            FontFamily::Sans => "sans-serif",
            FontFamily::Serif => "serif",
            FontFamily::Mono => "monospace",
            FontFamily::Hand => "cursive",
        }
    }

    /// Average glyph advance as a fraction of the font size.
    pub fn advance_factor(&self) -> f64 {
        match self {
            FontFamily::Sans => 0.52,
            FontFamily::Serif => 0.50,
            FontFamily::Mono => 0.60,
            FontFamily::Hand => 0.55,
        }
    }

    pub fn all() -> &'static [FontFamily] {
        &[FontFamily::Sans, FontFamily::Serif, FontFamily::Mono, FontFamily::Hand]
    }
}

/// Measures the advance width of a single line of text.
pub trait TextMeasure {
    fn advance(&self, line: &str, font: FontFamily, size: f64) -> f64;
}

/// Character-count based measurement, used when no font engine is available.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApproxTextMeasure;

impl TextMeasure for ApproxTextMeasure {
    fn advance(&self, line: &str, font: FontFamily, size: f64) -> f64 {
        line.chars().count() as f64 * size * font.advance_factor()
    }
}

/// A text element, anchored at its top-left corner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Text {
    pub(crate) id: ElementId,
    /// The text content (may contain newlines).
    pub content: String,
    /// Top-left corner.
    pub position: Point,
    pub font: FontFamily,
    /// Font size in surface units.
    pub size: f64,
    pub color: HexColor,
}

impl Text {
    /// Default font size.
    pub const DEFAULT_SIZE: f64 = 20.0;

    pub fn new(position: Point, content: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            content,
            position,
            font: FontFamily::default(),
            size: Self::DEFAULT_SIZE,
            color: HexColor::black(),
        }
    }

    pub fn with_font(mut self, font: FontFamily, size: f64) -> Self {
        self.font = font;
        self.size = size;
        self
    }

    pub fn with_color(mut self, color: HexColor) -> Self {
        self.color = color;
        self
    }

    /// Number of rendered lines (an empty string still occupies one line).
    pub fn line_count(&self) -> usize {
        let count = self.content.lines().count().max(1);
        if self.content.ends_with('\n') { count + 1 } else { count }
    }

    /// Measured (width, height) of the text block.
    pub fn measure(&self, measure: &dyn TextMeasure) -> (f64, f64) {
        let width = self
            .content
            .lines()
            .map(|line| measure.advance(line, self.font, self.size))
            .fold(0.0, f64::max);
        let height = self.line_count() as f64 * self.size * LINE_HEIGHT_FACTOR;
        (width, height)
    }
}

impl ElementTrait for Text {
    fn id(&self) -> ElementId {
        self.id
    }

    fn bounds(&self, measure: &dyn TextMeasure) -> Rect {
        let (width, height) = self.measure(measure);
        Rect::from_origin_size(self.position, (width, height))
    }

    fn hit_test(&self, point: Point, tolerance: f64, measure: &dyn TextMeasure) -> bool {
        self.bounds(measure).inflate(tolerance, tolerance).contains(point)
    }

    fn origin(&self) -> Point {
        self.position
    }

    fn translate(&mut self, delta: Vec2) {
        self.position += delta;
    }

    fn validate(&self) -> Result<(), GeometryError> {
        ensure_finite(self.position, "text position")?;
        ensure_positive(self.size, "font size")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_from_measure() {
        let text = Text::new(Point::new(10.0, 20.0), "abcd".to_string())
            .with_font(FontFamily::Mono, 10.0);
        let bounds = text.bounds(&ApproxTextMeasure);
        assert!((bounds.x0 - 10.0).abs() < f64::EPSILON);
        assert!((bounds.width() - 24.0).abs() < 1e-9);
        assert!((bounds.height() - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_multiline_height() {
        let text = Text::new(Point::ZERO, "a\nbb\n".to_string()).with_font(FontFamily::Mono, 10.0);
        assert_eq!(text.line_count(), 3);
        let (w, h) = text.measure(&ApproxTextMeasure);
        assert!((w - 12.0).abs() < 1e-9);
        assert!((h - 36.0).abs() < 1e-9);
    }

    #[test]
    fn test_hit_test() {
        let text = Text::new(Point::new(0.0, 0.0), "hello".to_string());
        assert!(text.hit_test(Point::new(5.0, 5.0), 0.0, &ApproxTextMeasure));
        assert!(!text.hit_test(Point::new(500.0, 5.0), 0.0, &ApproxTextMeasure));
    }

    #[test]
    fn test_validate() {
        let mut text = Text::new(Point::ZERO, "x".to_string());
        assert!(text.validate().is_ok());
        text.size = -1.0;
        assert!(text.validate().is_err());
    }
}
