//! Snapshot renderer.

use crate::surface::Surface;
use image::RgbaImage;
use kurbo::{Point, Rect};
use peniko::Color;
use scrawl_core::content::{ContentCache, ContentId};
use scrawl_core::element::{
    ApproxTextMeasure, Element, ElementId, Image, LINE_HEIGHT_FACTOR, Stroke, Text, TextMeasure,
};
use scrawl_core::history::Snapshot;
use scrawl_core::hit::{Corner, HANDLE_RADIUS};
use scrawl_core::interaction::Segment;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;

/// Renderer errors.
#[derive(Debug, Error)]
pub enum RendererError {
    #[error("Image decode failed: {0}")]
    Decode(String),
    #[error("Encode failed: {0}")]
    Encode(String),
    #[error("Invalid surface size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },
}

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RendererError>;

/// Per-frame render settings.
pub struct RenderContext<'a> {
    pub snapshot: &'a Snapshot,
    pub content: &'a ContentCache,
    pub background_color: Color,
    /// Selection highlight color.
    pub selection_color: Color,
    /// Element to outline as selected.
    pub selection: Option<ElementId>,
    /// Size of image resize handles.
    pub handle_radius: f64,
}

impl<'a> RenderContext<'a> {
    pub fn new(snapshot: &'a Snapshot, content: &'a ContentCache) -> Self {
        Self {
            snapshot,
            content,
            background_color: Color::from_rgba8(255, 255, 255, 255),
            selection_color: Color::from_rgba8(59, 130, 246, 255), // Blue
            selection: None,
            handle_radius: HANDLE_RADIUS,
        }
    }

    pub fn with_background(mut self, color: Color) -> Self {
        self.background_color = color;
        self
    }

    pub fn with_selection(mut self, selection: Option<ElementId>) -> Self {
        self.selection = selection;
        self
    }
}

/// Draws snapshots onto a [`Surface`], caching decoded images.
///
/// Images whose content is missing or undecodable are drawn as a gray box
/// with a cross; each such content id is logged once.
pub struct SnapshotRenderer {
    decoded: HashMap<ContentId, Arc<RgbaImage>>,
    reported: HashSet<ContentId>,
    measure: Box<dyn TextMeasure>,
}

impl Default for SnapshotRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotRenderer {
    pub fn new() -> Self {
        Self::with_measure(Box::new(ApproxTextMeasure))
    }

    pub fn with_measure(measure: Box<dyn TextMeasure>) -> Self {
        Self {
            decoded: HashMap::new(),
            reported: HashSet::new(),
            measure,
        }
    }

    /// Draw the whole snapshot, back to front.
    pub fn render(&mut self, surface: &mut dyn Surface, ctx: &RenderContext) {
        surface.clear(ctx.background_color);
        for element in ctx.snapshot.iter() {
            match element {
                Element::Stroke(stroke) => render_stroke(surface, stroke),
                Element::Text(text) => render_text(surface, text),
                Element::Image(image) => self.render_image(surface, image, ctx.content),
            }
        }
        if let Some((_, selected)) = ctx.selection.and_then(|id| ctx.snapshot.find(id)) {
            self.render_selection(surface, selected, ctx);
        }
    }

    fn decode(&mut self, id: &ContentId, content: &ContentCache) -> RenderResult<Arc<RgbaImage>> {
        if let Some(cached) = self.decoded.get(id) {
            return Ok(cached.clone());
        }
        let entry = content
            .get(id)
            .ok_or_else(|| RendererError::Decode(format!("content {} not loaded", id)))?;
        let decoded = ::image::load_from_memory(&entry.bytes)
            .map_err(|e| RendererError::Decode(format!("content {}: {}", id, e)))?
            .to_rgba8();
        let decoded = Arc::new(decoded);
        self.decoded.insert(id.clone(), decoded.clone());
        Ok(decoded)
    }

    fn render_image(&mut self, surface: &mut dyn Surface, image: &Image, content: &ContentCache) {
        match self.decode(&image.content_id, content) {
            Ok(pixels) => surface.draw_image(image.as_rect(), &pixels),
            Err(e) => {
                if self.reported.insert(image.content_id.clone()) {
                    log::warn!("Drawing placeholder: {}", e);
                }
                render_placeholder(surface, image.as_rect());
            }
        }
    }

    fn render_selection(&self, surface: &mut dyn Surface, element: &Element, ctx: &RenderContext) {
        let bounds = element.bounds(self.measure.as_ref()).inflate(2.0, 2.0);
        let outline = [
            Point::new(bounds.x0, bounds.y0),
            Point::new(bounds.x1, bounds.y0),
            Point::new(bounds.x1, bounds.y1),
            Point::new(bounds.x0, bounds.y1),
            Point::new(bounds.x0, bounds.y0),
        ];
        surface.stroke_polyline(&outline, ctx.selection_color, 1.5);

        if let Element::Image(image) = element {
            let r = ctx.handle_radius / 2.0;
            for corner in Corner::ALL {
                let center = corner.of(image.as_rect());
                let handle = Rect::new(center.x - r, center.y - r, center.x + r, center.y + r);
                surface.fill_rect(handle, ctx.selection_color);
            }
        }
    }
}

fn render_stroke(surface: &mut dyn Surface, stroke: &Stroke) {
    if stroke.erase {
        surface.erase_polyline(&stroke.points, stroke.width);
    } else {
        surface.stroke_polyline(&stroke.points, stroke.color.into(), stroke.width);
    }
}

fn render_text(surface: &mut dyn Surface, text: &Text) {
    let line_height = text.size * LINE_HEIGHT_FACTOR;
    for (i, line) in text.content.split('\n').enumerate() {
        if line.is_empty() {
            continue;
        }
        let origin = Point::new(text.position.x, text.position.y + i as f64 * line_height);
        surface.draw_text(origin, line, text.font, text.size, text.color.into());
    }
}

/// Gray box with a cross, for images that cannot be drawn.
fn render_placeholder(surface: &mut dyn Surface, rect: Rect) {
    let cross = Color::from_rgba8(150, 150, 150, 255);
    surface.fill_rect(rect, Color::from_rgba8(200, 200, 200, 255));
    let diagonal = [Point::new(rect.x0, rect.y0), Point::new(rect.x1, rect.y1)];
    surface.stroke_polyline(&diagonal, cross, 2.0);
    let anti_diagonal = [Point::new(rect.x1, rect.y0), Point::new(rect.x0, rect.y1)];
    surface.stroke_polyline(&anti_diagonal, cross, 2.0);
}

/// Draw `snapshot` onto `surface` with default settings.
pub fn render_snapshot(surface: &mut dyn Surface, snapshot: &Snapshot, content: &ContentCache) {
    SnapshotRenderer::new().render(surface, &RenderContext::new(snapshot, content));
}

/// Paint a live stroke segment without re-rendering the snapshot.
pub fn draw_segment(surface: &mut dyn Surface, segment: &Segment) {
    let points = [segment.from, segment.to];
    if segment.erase {
        surface.erase_polyline(&points, segment.width);
    } else {
        surface.stroke_polyline(&points, segment.color.into(), segment.width);
    }
}
