//! Element definitions for the drawing surface.

mod color;
mod image;
mod stroke;
mod text;

pub use color::{HexColor, ParseColorError};
pub use image::Image;
pub use stroke::Stroke;
pub use text::{ApproxTextMeasure, FontFamily, LINE_HEIGHT_FACTOR, Text, TextMeasure};

use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for elements.
pub type ElementId = Uuid;

/// Geometry rejected at the mutation boundary.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("non-finite coordinate in {0}")]
    NonFinite(&'static str),
    #[error("{what} must be positive, got {value}")]
    NonPositive { what: &'static str, value: f64 },
    #[error("stroke has no points")]
    EmptyStroke,
}

/// Check that a point has finite coordinates.
pub fn ensure_finite(point: Point, what: &'static str) -> Result<(), GeometryError> {
    if point.x.is_finite() && point.y.is_finite() {
        Ok(())
    } else {
        Err(GeometryError::NonFinite(what))
    }
}

/// Check that a length is finite and strictly positive.
pub fn ensure_positive(value: f64, what: &'static str) -> Result<(), GeometryError> {
    if !value.is_finite() {
        return Err(GeometryError::NonFinite(what));
    }
    if value <= 0.0 {
        return Err(GeometryError::NonPositive { what, value });
    }
    Ok(())
}

/// Distance from a point to a line segment (a→b).
pub fn point_to_segment_dist(point: Point, a: Point, b: Point) -> f64 {
    let seg = Vec2::new(b.x - a.x, b.y - a.y);
    let pv = Vec2::new(point.x - a.x, point.y - a.y);
    let len_sq = seg.hypot2();
    if len_sq < f64::EPSILON {
        return pv.hypot();
    }
    let t = (pv.dot(seg) / len_sq).clamp(0.0, 1.0);
    let proj = Point::new(a.x + t * seg.x, a.y + t * seg.y);
    proj.distance(point)
}

/// Common behavior of all element kinds.
pub trait ElementTrait {
    /// Get the unique identifier.
    fn id(&self) -> ElementId;

    /// Bounding box in surface coordinates.
    fn bounds(&self, measure: &dyn TextMeasure) -> Rect;

    /// Check if a point hits this element.
    fn hit_test(&self, point: Point, tolerance: f64, measure: &dyn TextMeasure) -> bool;

    /// Anchor point used as the drag origin.
    fn origin(&self) -> Point;

    /// Move the element by a delta.
    fn translate(&mut self, delta: Vec2);

    /// Validate invariants before the element enters a snapshot.
    fn validate(&self) -> Result<(), GeometryError>;
}

/// Discriminant of an [`Element`], used to filter hit-tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Stroke,
    Text,
    Image,
}

/// A drawable entry inside a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Element {
    Stroke(Stroke),
    Text(Text),
    Image(Image),
}

impl Element {
    pub fn id(&self) -> ElementId {
        match self {
            Element::Stroke(s) => s.id(),
            Element::Text(t) => t.id(),
            Element::Image(i) => i.id(),
        }
    }

    pub fn kind(&self) -> ElementKind {
        match self {
            Element::Stroke(_) => ElementKind::Stroke,
            Element::Text(_) => ElementKind::Text,
            Element::Image(_) => ElementKind::Image,
        }
    }

    pub fn bounds(&self, measure: &dyn TextMeasure) -> Rect {
        match self {
            Element::Stroke(s) => s.bounds(measure),
            Element::Text(t) => t.bounds(measure),
            Element::Image(i) => i.bounds(measure),
        }
    }

    pub fn hit_test(&self, point: Point, tolerance: f64, measure: &dyn TextMeasure) -> bool {
        match self {
            Element::Stroke(s) => s.hit_test(point, tolerance, measure),
            Element::Text(t) => t.hit_test(point, tolerance, measure),
            Element::Image(i) => i.hit_test(point, tolerance, measure),
        }
    }

    pub fn origin(&self) -> Point {
        match self {
            Element::Stroke(s) => s.origin(),
            Element::Text(t) => t.origin(),
            Element::Image(i) => i.origin(),
        }
    }

    pub fn translate(&mut self, delta: Vec2) {
        match self {
            Element::Stroke(s) => s.translate(delta),
            Element::Text(t) => t.translate(delta),
            Element::Image(i) => i.translate(delta),
        }
    }

    pub fn validate(&self) -> Result<(), GeometryError> {
        match self {
            Element::Stroke(s) => s.validate(),
            Element::Text(t) => t.validate(),
            Element::Image(i) => i.validate(),
        }
    }

    /// Replace the element's ID with a fresh one (used for paste and duplication).
    pub fn regenerate_id(&mut self) {
        let new_id = Uuid::new_v4();
        match self {
            Element::Stroke(s) => s.id = new_id,
            Element::Text(t) => t.id = new_id,
            Element::Image(i) => i.id = new_id,
        }
    }

    pub fn as_text(&self) -> Option<&Text> {
        match self {
            Element::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_image(&self) -> Option<&Image> {
        match self {
            Element::Image(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_stroke(&self) -> Option<&Stroke> {
        match self {
            Element::Stroke(s) => Some(s),
            _ => None,
        }
    }
}

impl From<Stroke> for Element {
    fn from(stroke: Stroke) -> Self {
        Element::Stroke(stroke)
    }
}

impl From<Text> for Element {
    fn from(text: Text) -> Self {
        Element::Text(text)
    }
}

impl From<Image> for Element {
    fn from(image: Image) -> Self {
        Element::Image(image)
    }
}
