//! Freehand stroke element.

use super::{
    ElementId, ElementTrait, GeometryError, HexColor, TextMeasure, ensure_finite, ensure_positive,
    point_to_segment_dist,
};
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A freehand stroke (series of points). Erase strokes clear what is beneath them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stroke {
    pub(crate) id: ElementId,
    /// Points in drawing order.
    pub points: Vec<Point>,
    /// Stroke color (ignored when erasing).
    pub color: HexColor,
    /// Line width.
    pub width: f64,
    /// Whether this stroke erases instead of paints.
    #[serde(default)]
    pub erase: bool,
}

impl Stroke {
    /// Start a stroke at a single point.
    pub fn begin(start: Point, color: HexColor, width: f64, erase: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            points: vec![start],
            color,
            width,
            erase,
        }
    }

    /// Create a painting stroke from existing points.
    pub fn from_points(points: Vec<Point>, color: HexColor, width: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            points,
            color,
            width,
            erase: false,
        }
    }

    /// Add a point to the path.
    pub fn add_point(&mut self, point: Point) {
        self.points.push(point);
    }

    /// Last point of the path, if any.
    pub fn last_point(&self) -> Option<Point> {
        self.points.last().copied()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl ElementTrait for Stroke {
    fn id(&self) -> ElementId {
        self.id
    }

    fn bounds(&self, _measure: &dyn TextMeasure) -> Rect {
        let Some(first) = self.points.first() else {
            return Rect::ZERO;
        };
        let rect = self
            .points
            .iter()
            .fold(Rect::from_points(*first, *first), |acc, p| acc.union_pt(*p));
        let half = self.width / 2.0;
        rect.inflate(half, half)
    }

    fn hit_test(&self, point: Point, tolerance: f64, _measure: &dyn TextMeasure) -> bool {
        let reach = tolerance + self.width / 2.0;
        match self.points.as_slice() {
            [] => false,
            [only] => only.distance(point) <= reach,
            points => points
                .windows(2)
                .any(|w| point_to_segment_dist(point, w[0], w[1]) <= reach),
        }
    }

    fn origin(&self) -> Point {
        self.points.first().copied().unwrap_or(Point::ZERO)
    }

    fn translate(&mut self, delta: Vec2) {
        for point in &mut self.points {
            *point += delta;
        }
    }

    fn validate(&self) -> Result<(), GeometryError> {
        if self.points.is_empty() {
            return Err(GeometryError::EmptyStroke);
        }
        for point in &self.points {
            ensure_finite(*point, "stroke point")?;
        }
        ensure_positive(self.width, "stroke width")
    }
}
