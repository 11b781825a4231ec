//! PNG export of a snapshot.

use crate::raster::RasterSurface;
use crate::renderer::{RenderContext, RenderResult, RendererError, SnapshotRenderer};
use image::{DynamicImage, ImageFormat};
use kurbo::{Affine, Rect};
use peniko::Color;
use scrawl_core::content::ContentCache;
use scrawl_core::element::{ApproxTextMeasure, TextMeasure};
use scrawl_core::history::Snapshot;
use std::io::Cursor;

/// Largest edge, in pixels, of an exported image.
const MAX_EXPORT_EDGE: f64 = 8192.0;

/// Export settings.
#[derive(Debug, Clone, Copy)]
pub struct ExportOptions {
    /// Margin around the drawing, in surface units.
    pub padding: f64,
    pub background: Color,
    /// Pixels per surface unit.
    pub scale: f64,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            padding: 20.0,
            background: Color::from_rgba8(255, 255, 255, 255),
            scale: 1.0,
        }
    }
}

/// Union of all element bounds, or `None` for an empty snapshot.
pub fn content_bounds(snapshot: &Snapshot, measure: &dyn TextMeasure) -> Option<Rect> {
    snapshot
        .iter()
        .map(|e| e.bounds(measure))
        .reduce(|acc, r| acc.union(r))
}

/// Largest scale not above `requested` at which `bounds` fits the maximum
/// export size.
fn fit_scale(bounds: Rect, requested: f64) -> f64 {
    let widest = bounds.width().max(bounds.height());
    if widest <= 0.0 {
        return requested;
    }
    requested.min(MAX_EXPORT_EDGE / widest)
}

/// Rasterize `snapshot` cropped to its content and encode it as PNG.
pub fn export_png(
    snapshot: &Snapshot,
    content: &ContentCache,
    options: &ExportOptions,
) -> RenderResult<Vec<u8>> {
    let measure = ApproxTextMeasure;
    let bounds = content_bounds(snapshot, &measure)
        .unwrap_or(Rect::ZERO)
        .inflate(options.padding, options.padding);

    let requested = if options.scale.is_finite() && options.scale > 0.0 {
        options.scale
    } else {
        1.0
    };
    let scale = fit_scale(bounds, requested);
    if scale < requested {
        log::info!(
            "Export scale reduced from {} to {} to fit {}px",
            requested,
            scale,
            MAX_EXPORT_EDGE
        );
    }
    let width = (bounds.width() * scale).ceil().clamp(1.0, MAX_EXPORT_EDGE) as u32;
    let height = (bounds.height() * scale).ceil().clamp(1.0, MAX_EXPORT_EDGE) as u32;
    log::debug!("Exporting {} elements at {}x{}", snapshot.len(), width, height);

    let transform = Affine::scale(scale) * Affine::translate((-bounds.x0, -bounds.y0));
    let mut surface = RasterSurface::new(width, height)?.with_transform(transform);
    let ctx = RenderContext::new(snapshot, content).with_background(options.background);
    SnapshotRenderer::new().render(&mut surface, &ctx);

    let mut bytes = Vec::new();
    DynamicImage::ImageRgba8(surface.into_pixels())
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|e| RendererError::Encode(e.to_string()))?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Point;
    use scrawl_core::element::{HexColor, Stroke};

    fn decode(bytes: &[u8]) -> image::RgbaImage {
        image::load_from_memory(bytes).unwrap().to_rgba8()
    }

    #[test]
    fn test_empty_snapshot_exports_padding_only() {
        let options = ExportOptions {
            padding: 5.0,
            ..ExportOptions::default()
        };
        let png = export_png(&Snapshot::new(), &ContentCache::new(), &options).unwrap();
        let img = decode(&png);
        assert_eq!((img.width(), img.height()), (10, 10));
        assert_eq!(img.get_pixel(3, 3).0, [255, 255, 255, 255]);
    }

    #[test]
    fn test_export_crops_to_content() {
        let stroke = Stroke::from_points(
            vec![Point::new(100.0, 100.0), Point::new(140.0, 100.0)],
            HexColor::black(),
            4.0,
        );
        let snapshot = Snapshot::new().with_pushed(stroke);
        let options = ExportOptions {
            padding: 10.0,
            ..ExportOptions::default()
        };
        let img = decode(&export_png(&snapshot, &ContentCache::new(), &options).unwrap());

        let bounds = content_bounds(&snapshot, &ApproxTextMeasure).unwrap();
        assert_eq!(img.width(), (bounds.width() + 20.0).ceil() as u32);
        // Stroke runs through the middle row.
        let mid_y = (100.0 - bounds.y0 + 10.0) as u32;
        assert_eq!(img.get_pixel(img.width() / 2, mid_y).0, [0, 0, 0, 255]);
        assert_eq!(img.get_pixel(1, 1).0, [255, 255, 255, 255]);
    }

    #[test]
    fn test_oversized_drawing_is_scaled_down_not_cropped() {
        let stroke = |x: f64| {
            let points = vec![Point::new(x, 0.0), Point::new(x + 10.0, 0.0)];
            Stroke::from_points(points, HexColor::black(), 4.0)
        };
        let snapshot = Snapshot::new().with_pushed(stroke(0.0)).with_pushed(stroke(12_000.0));
        let png = export_png(&snapshot, &ContentCache::new(), &ExportOptions::default()).unwrap();
        let img = decode(&png);

        assert_eq!(img.width(), MAX_EXPORT_EDGE as u32);
        let dark_columns = |range: std::ops::Range<u32>| {
            range
                .filter(|&x| (0..img.height()).any(|y| img.get_pixel(x, y).0[0] < 128))
                .count()
        };
        assert!(dark_columns(0..img.width() / 4) > 0);
        assert!(dark_columns(img.width() * 3 / 4..img.width()) > 0);
    }

    #[test]
    fn test_scale_multiplies_size() {
        let options = ExportOptions {
            padding: 4.0,
            scale: 2.0,
            ..ExportOptions::default()
        };
        let img = decode(&export_png(&Snapshot::new(), &ContentCache::new(), &options).unwrap());
        assert_eq!((img.width(), img.height()), (16, 16));
    }
}
