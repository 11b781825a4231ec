//! Active pointer gestures: drawing, dragging and resizing.

use crate::element::{Element, ElementId, HexColor, Image, Stroke};
use crate::hit::Corner;
use kurbo::{Point, Vec2};

/// A stroke segment the host can paint immediately, before the stroke is
/// committed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub from: Point,
    pub to: Point,
    pub color: HexColor,
    pub width: f64,
    pub erase: bool,
}

/// Result of ending a gesture.
#[derive(Debug, Clone, PartialEq)]
pub enum Finished {
    /// Append a new element.
    Append(Element),
    /// Replace the element with this id.
    Replace(Element),
    /// The gesture left the document unchanged.
    Nothing,
}

/// A pointer gesture between pointer-down and pointer-up.
#[derive(Debug, Clone)]
pub enum Gesture {
    Drawing(Stroke),
    Dragging {
        original: Element,
        preview: Element,
        /// Pointer position minus element origin at pointer-down.
        offset: Vec2,
    },
    Resizing {
        original: Image,
        preview: Image,
        corner: Corner,
    },
}

impl Gesture {
    pub fn draw(start: Point, color: HexColor, width: f64, erase: bool) -> Self {
        Gesture::Drawing(Stroke::begin(start, color, width, erase))
    }

    pub fn drag(element: &Element, pointer: Point) -> Self {
        Gesture::Dragging {
            original: element.clone(),
            preview: element.clone(),
            offset: pointer - element.origin(),
        }
    }

    pub fn resize(image: &Image, corner: Corner) -> Self {
        Gesture::Resizing {
            original: image.clone(),
            preview: image.clone(),
            corner,
        }
    }

    /// Id of the existing element this gesture manipulates.
    pub fn target(&self) -> Option<ElementId> {
        match self {
            Gesture::Drawing(_) => None,
            Gesture::Dragging { original, .. } => Some(original.id()),
            Gesture::Resizing { original, .. } => Some(original.id),
        }
    }

    /// Advance the gesture to `point`. Drawing returns the new segment.
    pub fn update(&mut self, point: Point, min_size: f64) -> Option<Segment> {
        match self {
            Gesture::Drawing(stroke) => {
                let last = stroke.last_point()?;
                if last == point {
                    return None;
                }
                stroke.add_point(point);
                Some(Segment {
                    from: last,
                    to: point,
                    color: stroke.color,
                    width: stroke.width,
                    erase: stroke.erase,
                })
            }
            Gesture::Dragging {
                original,
                preview,
                offset,
            } => {
                let delta = (point - *offset) - original.origin();
                let mut moved = original.clone();
                moved.translate(delta);
                *preview = moved;
                None
            }
            Gesture::Resizing {
                original,
                preview,
                corner,
            } => {
                let rect = corner.drag(original.as_rect(), point, min_size);
                preview.position = rect.origin();
                preview.width = rect.width();
                preview.height = rect.height();
                None
            }
        }
    }

    /// The in-progress element as it should be displayed.
    pub fn preview(&self) -> Element {
        match self {
            Gesture::Drawing(stroke) => Element::Stroke(stroke.clone()),
            Gesture::Dragging { preview, .. } => preview.clone(),
            Gesture::Resizing { preview, .. } => Element::Image(preview.clone()),
        }
    }

    /// End the gesture.
    pub fn finish(self) -> Finished {
        match self {
            Gesture::Drawing(stroke) => Finished::Append(Element::Stroke(stroke)),
            Gesture::Dragging { original, preview, .. } => {
                if preview == original {
                    Finished::Nothing
                } else {
                    Finished::Replace(preview)
                }
            }
            Gesture::Resizing { original, preview, .. } => {
                if preview == original {
                    Finished::Nothing
                } else {
                    Finished::Replace(Element::Image(preview))
                }
            }
        }
    }
}
