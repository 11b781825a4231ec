//! Image element referencing a payload in the content cache.

use super::{ElementId, ElementTrait, GeometryError, TextMeasure, ensure_finite, ensure_positive};
use crate::content::ContentId;
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An image placed on the surface. Pixel data lives in the content cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub(crate) id: ElementId,
    /// Key into the content cache.
    pub content_id: ContentId,
    /// Top-left corner position.
    pub position: Point,
    /// Display width.
    pub width: f64,
    /// Display height.
    pub height: f64,
}

impl Image {
    pub fn new(content_id: ContentId, position: Point, width: f64, height: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            content_id,
            position,
            width,
            height,
        }
    }

    /// Scale to fit within max dimensions while preserving aspect ratio.
    /// Images already inside the box keep their size.
    pub fn fit_within(mut self, max_width: f64, max_height: f64) -> Self {
        if self.width <= max_width && self.height <= max_height {
            return self;
        }
        let aspect = self.width / self.height;
        if aspect > max_width / max_height {
            self.width = max_width;
            self.height = max_width / aspect;
        } else {
            self.height = max_height;
            self.width = max_height * aspect;
        }
        self
    }

    /// Get the bounding rectangle.
    pub fn as_rect(&self) -> Rect {
        Rect::from_origin_size(self.position, (self.width, self.height))
    }

    /// Corner points in nw, ne, sw, se order.
    pub fn corners(&self) -> [Point; 4] {
        let r = self.as_rect();
        [
            Point::new(r.x0, r.y0),
            Point::new(r.x1, r.y0),
            Point::new(r.x0, r.y1),
            Point::new(r.x1, r.y1),
        ]
    }
}

impl ElementTrait for Image {
    fn id(&self) -> ElementId {
        self.id
    }

    fn bounds(&self, _measure: &dyn TextMeasure) -> Rect {
        self.as_rect()
    }

    fn hit_test(&self, point: Point, tolerance: f64, _measure: &dyn TextMeasure) -> bool {
        self.as_rect().inflate(tolerance, tolerance).contains(point)
    }

    fn origin(&self) -> Point {
        self.position
    }

    fn translate(&mut self, delta: Vec2) {
        self.position += delta;
    }

    fn validate(&self) -> Result<(), GeometryError> {
        ensure_finite(self.position, "image position")?;
        ensure_positive(self.width, "image width")?;
        ensure_positive(self.height, "image height")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ApproxTextMeasure;

    fn image(w: f64, h: f64) -> Image {
        Image::new(ContentId::from("img"), Point::new(10.0, 20.0), w, h)
    }

    #[test]
    fn test_fit_within() {
        let fitted = image(1000.0, 500.0).fit_within(400.0, 400.0);
        assert!((fitted.width - 400.0).abs() < 0.01);
        assert!((fitted.height - 200.0).abs() < 0.01);

        let small = image(100.0, 50.0).fit_within(400.0, 400.0);
        assert!((small.width - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_bounds() {
        let bounds = image(100.0, 50.0).bounds(&ApproxTextMeasure);
        assert!((bounds.x0 - 10.0).abs() < f64::EPSILON);
        assert!((bounds.y0 - 20.0).abs() < f64::EPSILON);
        assert!((bounds.x1 - 110.0).abs() < f64::EPSILON);
        assert!((bounds.y1 - 70.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_corners() {
        let [nw, ne, sw, se] = image(100.0, 50.0).corners();
        assert_eq!(nw, Point::new(10.0, 20.0));
        assert_eq!(ne, Point::new(110.0, 20.0));
        assert_eq!(sw, Point::new(10.0, 70.0));
        assert_eq!(se, Point::new(110.0, 70.0));
    }

    #[test]
    fn test_validate_rejects_zero_size() {
        assert!(image(0.0, 10.0).validate().is_err());
        assert!(image(10.0, 10.0).validate().is_ok());
    }
}
