//! Hit-testing against a snapshot.

use crate::element::{Element, ElementKind, Image, TextMeasure};
use crate::history::Snapshot;
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};

/// Default radius of an image resize handle, in surface units.
pub const HANDLE_RADIUS: f64 = 8.0;

/// Corner of an image, used for resize handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Corner {
    #[serde(rename = "nw")]
    TopLeft,
    #[serde(rename = "ne")]
    TopRight,
    #[serde(rename = "sw")]
    BottomLeft,
    #[serde(rename = "se")]
    BottomRight,
}

impl Corner {
    pub const ALL: [Corner; 4] = [
        Corner::TopLeft,
        Corner::TopRight,
        Corner::BottomLeft,
        Corner::BottomRight,
    ];

    /// Position of this corner on `rect`.
    pub fn of(self, rect: Rect) -> Point {
        match self {
            Corner::TopLeft => Point::new(rect.x0, rect.y0),
            Corner::TopRight => Point::new(rect.x1, rect.y0),
            Corner::BottomLeft => Point::new(rect.x0, rect.y1),
            Corner::BottomRight => Point::new(rect.x1, rect.y1),
        }
    }

    /// The diagonally opposite corner, which stays fixed while resizing.
    pub fn opposite(self) -> Corner {
        match self {
            Corner::TopLeft => Corner::BottomRight,
            Corner::TopRight => Corner::BottomLeft,
            Corner::BottomLeft => Corner::TopRight,
            Corner::BottomRight => Corner::TopLeft,
        }
    }

    /// Rect produced by dragging this corner of `rect` to `point`, keeping
    /// the opposite corner fixed. Each side is clamped to `min_size`.
    pub fn drag(self, rect: Rect, point: Point, min_size: f64) -> Rect {
        let anchor = self.opposite().of(rect);
        let width = match self {
            Corner::TopLeft | Corner::BottomLeft => anchor.x - point.x,
            Corner::TopRight | Corner::BottomRight => point.x - anchor.x,
        }
        .max(min_size);
        let height = match self {
            Corner::TopLeft | Corner::TopRight => anchor.y - point.y,
            Corner::BottomLeft | Corner::BottomRight => point.y - anchor.y,
        }
        .max(min_size);
        let x0 = match self {
            Corner::TopLeft | Corner::BottomLeft => anchor.x - width,
            Corner::TopRight | Corner::BottomRight => anchor.x,
        };
        let y0 = match self {
            Corner::TopLeft | Corner::TopRight => anchor.y - height,
            Corner::BottomLeft | Corner::BottomRight => anchor.y,
        };
        Rect::new(x0, y0, x0 + width, y0 + height)
    }
}

/// An element found under a point.
#[derive(Debug, Clone, Copy)]
pub struct Hit<'a> {
    pub index: usize,
    pub element: &'a Element,
}

/// Topmost element under `point`, scanning back to front.
pub fn hit_test<'a>(
    point: Point,
    snapshot: &'a Snapshot,
    tolerance: f64,
    measure: &dyn TextMeasure,
) -> Option<Hit<'a>> {
    hit_test_filtered(point, snapshot, tolerance, measure, |_| true)
}

/// Topmost element of the given kind under `point`.
pub fn hit_test_kind<'a>(
    point: Point,
    snapshot: &'a Snapshot,
    kind: ElementKind,
    tolerance: f64,
    measure: &dyn TextMeasure,
) -> Option<Hit<'a>> {
    hit_test_filtered(point, snapshot, tolerance, measure, |k| k == kind)
}

/// Topmost element accepted by `filter` under `point`.
pub fn hit_test_filtered<'a>(
    point: Point,
    snapshot: &'a Snapshot,
    tolerance: f64,
    measure: &dyn TextMeasure,
    filter: impl Fn(ElementKind) -> bool,
) -> Option<Hit<'a>> {
    snapshot
        .iter()
        .enumerate()
        .rev()
        .filter(|(_, element)| filter(element.kind()))
        .find(|(_, element)| element.hit_test(point, tolerance, measure))
        .map(|(index, element)| Hit { index, element })
}

/// Resize handle of `image` under `point`, if any.
pub fn resize_handle_at(point: Point, image: &Image, radius: f64) -> Option<Corner> {
    let rect = image.as_rect();
    Corner::ALL
        .into_iter()
        .find(|corner| corner.of(rect).distance(point) <= radius)
}
