//! Drawing-surface abstraction.

use image::RgbaImage;
use kurbo::{Point, Rect, Size};
use peniko::Color;
use scrawl_core::element::{FontFamily, HexColor};

/// A 2D target the renderer draws onto. Coordinates are surface units.
///
/// Implementations can rasterize into a pixel buffer, forward to a browser
/// canvas, or record commands for inspection.
pub trait Surface {
    /// Drawable size.
    fn size(&self) -> Size;

    /// Fill the whole surface.
    fn clear(&mut self, color: Color);

    /// Stroke a polyline with round caps and joins.
    fn stroke_polyline(&mut self, points: &[Point], color: Color, width: f64);

    /// Clear along a polyline, revealing the background.
    fn erase_polyline(&mut self, points: &[Point], width: f64);

    fn fill_rect(&mut self, rect: Rect, color: Color);

    /// Draw one line of text with its top-left corner at `origin`.
    fn draw_text(&mut self, origin: Point, text: &str, font: FontFamily, size: f64, color: Color);

    /// Draw `image` scaled to `rect`.
    fn draw_image(&mut self, rect: Rect, image: &RgbaImage);
}

/// A recorded drawing command.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Clear(HexColor),
    Stroke {
        points: Vec<Point>,
        color: HexColor,
        width: f64,
    },
    Erase {
        points: Vec<Point>,
        width: f64,
    },
    FillRect {
        rect: Rect,
        color: HexColor,
    },
    Text {
        origin: Point,
        text: String,
        font: FontFamily,
        size: f64,
        color: HexColor,
    },
    Image {
        rect: Rect,
        width: u32,
        height: u32,
    },
}

/// A surface that records commands instead of drawing.
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    size: Size,
    commands: Vec<DrawCommand>,
}

impl RecordingSurface {
    pub fn new(size: Size) -> Self {
        Self {
            size,
            commands: Vec::new(),
        }
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<DrawCommand> {
        std::mem::take(&mut self.commands)
    }
}

impl Surface for RecordingSurface {
    fn size(&self) -> Size {
        self.size
    }

    fn clear(&mut self, color: Color) {
        self.commands.push(DrawCommand::Clear(color.into()));
    }

    fn stroke_polyline(&mut self, points: &[Point], color: Color, width: f64) {
        self.commands.push(DrawCommand::Stroke {
            points: points.to_vec(),
            color: color.into(),
            width,
        });
    }

    fn erase_polyline(&mut self, points: &[Point], width: f64) {
        self.commands.push(DrawCommand::Erase {
            points: points.to_vec(),
            width,
        });
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.commands.push(DrawCommand::FillRect {
            rect,
            color: color.into(),
        });
    }

    fn draw_text(&mut self, origin: Point, text: &str, font: FontFamily, size: f64, color: Color) {
        self.commands.push(DrawCommand::Text {
            origin,
            text: text.to_string(),
            font,
            size,
            color: color.into(),
        });
    }

    fn draw_image(&mut self, rect: Rect, image: &RgbaImage) {
        self.commands.push(DrawCommand::Image {
            rect,
            width: image.width(),
            height: image.height(),
        });
    }
}
