//! CPU rasterizer over an RGBA pixel buffer.
//!
//! Good enough for exports and tests; not anti-aliased, and text is drawn
//! as one block per glyph since no font engine is linked.

use crate::renderer::{RenderResult, RendererError};
use crate::surface::Surface;
use image::{Rgba, RgbaImage};
use kurbo::{Affine, Point, Rect, Size};
use peniko::Color;
use scrawl_core::element::FontFamily;
use std::collections::HashSet;
use std::ops::Range;

/// A [`Surface`] that rasterizes into an [`RgbaImage`].
pub struct RasterSurface {
    pixels: RgbaImage,
    background: Rgba<u8>,
    /// Surface units to pixels.
    transform: Affine,
}

fn rgba(color: Color) -> Rgba<u8> {
    let c = color.to_rgba8();
    Rgba([c.r, c.g, c.b, c.a])
}

impl RasterSurface {
    pub fn new(width: u32, height: u32) -> RenderResult<Self> {
        if width == 0 || height == 0 {
            return Err(RendererError::InvalidSize { width, height });
        }
        Ok(Self {
            pixels: RgbaImage::new(width, height),
            background: Rgba([0, 0, 0, 0]),
            transform: Affine::IDENTITY,
        })
    }

    /// Map surface coordinates through `transform` before drawing.
    pub fn with_transform(mut self, transform: Affine) -> Self {
        self.transform = transform;
        self
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn into_pixels(self) -> RgbaImage {
        self.pixels
    }

    /// Uniform scale of the transform, for widths and font sizes.
    fn scale(&self) -> f64 {
        let [a, b, _, _, _, _] = self.transform.as_coeffs();
        (a * a + b * b).sqrt()
    }

    fn blend(&mut self, x: i64, y: i64, color: Rgba<u8>) {
        if !self.contains(x, y) {
            return;
        }
        let dst = self.pixels.get_pixel_mut(x as u32, y as u32);
        let alpha = u32::from(color[3]);
        if alpha == 255 {
            *dst = color;
            return;
        }
        let inv = 255 - alpha;
        for i in 0..3 {
            dst[i] = ((u32::from(color[i]) * alpha + u32::from(dst[i]) * inv) / 255) as u8;
        }
        dst[3] = (alpha + u32::from(dst[3]) * inv / 255) as u8;
    }

    fn put(&mut self, x: i64, y: i64, color: Rgba<u8>) {
        if self.contains(x, y) {
            self.pixels.put_pixel(x as u32, y as u32, color);
        }
    }

    fn contains(&self, x: i64, y: i64) -> bool {
        x >= 0
            && y >= 0
            && x < i64::from(self.pixels.width())
            && y < i64::from(self.pixels.height())
    }

    fn buffer_rect(&self) -> Rect {
        Rect::new(0.0, 0.0, f64::from(self.pixels.width()), f64::from(self.pixels.height()))
    }

    /// Pixel columns and rows covered by device-space `rect`, clipped to the
    /// buffer.
    fn clip(&self, rect: Rect) -> Option<(Range<i64>, Range<i64>)> {
        let rect = rect.abs();
        let bounds = self.buffer_rect();
        let x0 = rect.x0.floor().max(bounds.x0);
        let y0 = rect.y0.floor().max(bounds.y0);
        let x1 = rect.x1.ceil().min(bounds.x1);
        let y1 = rect.y1.ceil().min(bounds.y1);
        // Also rejects NaN.
        if !(x0 < x1 && y0 < y1) {
            return None;
        }
        Some((x0 as i64..x1 as i64, y0 as i64..y1 as i64))
    }

    /// Fill device-space rect.
    fn fill_device(&mut self, rect: Rect, color: Rgba<u8>, replace: bool) {
        let Some((xs, ys)) = self.clip(rect) else {
            return;
        };
        for y in ys {
            for x in xs.clone() {
                if replace {
                    self.put(x, y, color);
                } else {
                    self.blend(x, y, color);
                }
            }
        }
    }

    /// Stamp round discs along the polyline in device space.
    fn polyline(&mut self, points: &[Point], width: f64, color: Rgba<u8>, replace: bool) {
        let radius = (width * self.scale() / 2.0).max(0.5);
        let reach = self.buffer_rect().inflate(radius + 1.0, radius + 1.0);
        let device: Vec<Point> = points.iter().map(|p| self.transform * *p).collect();
        let mut covered = HashSet::new();
        let stamp = |center: Point, covered: &mut HashSet<(i64, i64)>| {
            let disc = Rect::from_center_size(center, (radius * 2.0, radius * 2.0));
            let Some((xs, ys)) = self.clip(disc) else {
                return;
            };
            for py in ys {
                for px in xs.clone() {
                    if Point::new(px as f64, py as f64).distance(center) <= radius {
                        covered.insert((px, py));
                    }
                }
            }
        };
        match device.as_slice() {
            [] => return,
            [only] => stamp(*only, &mut covered),
            _ => {
                let spacing = (radius * 0.25).max(0.5);
                for pair in device.windows(2) {
                    let Some((a, b)) = clip_segment(pair[0], pair[1], reach) else {
                        continue;
                    };
                    let steps = (a.distance(b) / spacing).ceil().max(1.0) as usize;
                    for i in 0..=steps {
                        stamp(a.lerp(b, i as f64 / steps as f64), &mut covered);
                    }
                }
            }
        }
        // Each pixel is painted once so translucent strokes don't darken
        // where stamps overlap.
        for (x, y) in covered {
            if replace {
                self.put(x, y, color);
            } else {
                self.blend(x, y, color);
            }
        }
    }
}

/// The part of segment `a`-`b` inside `bounds` (Liang-Barsky).
fn clip_segment(a: Point, b: Point, bounds: Rect) -> Option<(Point, Point)> {
    let d = b - a;
    let (mut t0, mut t1) = (0.0_f64, 1.0_f64);
    let edges = [
        (-d.x, a.x - bounds.x0),
        (d.x, bounds.x1 - a.x),
        (-d.y, a.y - bounds.y0),
        (d.y, bounds.y1 - a.y),
    ];
    for (p, q) in edges {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
        } else if p < 0.0 {
            t0 = t0.max(q / p);
        } else {
            t1 = t1.min(q / p);
        }
    }
    (t0 <= t1).then(|| (a.lerp(b, t0), a.lerp(b, t1)))
}

impl Surface for RasterSurface {
    fn size(&self) -> Size {
        Size::new(f64::from(self.pixels.width()), f64::from(self.pixels.height()))
    }

    fn clear(&mut self, color: Color) {
        self.background = rgba(color);
        let background = self.background;
        for pixel in self.pixels.pixels_mut() {
            *pixel = background;
        }
    }

    fn stroke_polyline(&mut self, points: &[Point], color: Color, width: f64) {
        self.polyline(points, width, rgba(color), false);
    }

    fn erase_polyline(&mut self, points: &[Point], width: f64) {
        let background = self.background;
        self.polyline(points, width, background, true);
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        let device = self.transform.transform_rect_bbox(rect);
        self.fill_device(device, rgba(color), false);
    }

    fn draw_text(&mut self, origin: Point, text: &str, font: FontFamily, size: f64, color: Color) {
        let advance = size * font.advance_factor();
        let color = rgba(color);
        for (i, ch) in text.chars().enumerate() {
            if ch.is_whitespace() {
                continue;
            }
            let x = origin.x + i as f64 * advance;
            let glyph = Rect::new(
                x + advance * 0.1,
                origin.y + size * 0.25,
                x + advance * 0.9,
                origin.y + size,
            );
            let device = self.transform.transform_rect_bbox(glyph);
            self.fill_device(device, color, false);
        }
    }

    fn draw_image(&mut self, rect: Rect, image: &RgbaImage) {
        let device = self.transform.transform_rect_bbox(rect);
        let empty_image = image.width() == 0 || image.height() == 0;
        if device.width() <= 0.0 || device.height() <= 0.0 || empty_image {
            return;
        }
        let Some((xs, ys)) = self.clip(device) else {
            return;
        };
        // Nearest-neighbour sampling.
        let sx = f64::from(image.width()) / device.width();
        let sy = f64::from(image.height()) / device.height();
        for y in ys {
            for x in xs.clone() {
                let u = ((x as f64 + 0.5 - device.x0) * sx).floor();
                let v = ((y as f64 + 0.5 - device.y0) * sy).floor();
                if u < 0.0 || v < 0.0 {
                    continue;
                }
                let (u, v) = (u as u32, v as u32);
                if u < image.width() && v < image.height() {
                    self.blend(x, y, *image.get_pixel(u, v));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn white() -> Color {
        Color::from_rgba8(255, 255, 255, 255)
    }

    fn black() -> Color {
        Color::from_rgba8(0, 0, 0, 255)
    }

    #[test]
    fn test_zero_size_rejected() {
        assert!(matches!(RasterSurface::new(0, 10), Err(RendererError::InvalidSize { .. })));
    }

    #[test]
    fn test_stroke_then_erase() {
        let mut surface = RasterSurface::new(20, 20).unwrap();
        surface.clear(white());
        let line = [Point::new(2.0, 10.0), Point::new(18.0, 10.0)];
        surface.stroke_polyline(&line, black(), 4.0);
        assert_eq!(*surface.pixels().get_pixel(10, 10), Rgba([0, 0, 0, 255]));
        assert_eq!(*surface.pixels().get_pixel(10, 2), Rgba([255, 255, 255, 255]));

        surface.erase_polyline(&line, 6.0);
        assert_eq!(*surface.pixels().get_pixel(10, 10), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_transform_offsets_drawing() {
        let mut surface = RasterSurface::new(10, 10)
            .unwrap()
            .with_transform(Affine::translate((-100.0, -100.0)));
        surface.clear(white());
        surface.fill_rect(Rect::new(100.0, 100.0, 102.0, 102.0), black());
        assert_eq!(*surface.pixels().get_pixel(1, 1), Rgba([0, 0, 0, 255]));
        assert_eq!(*surface.pixels().get_pixel(3, 3), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_image_scaled_nearest() {
        let mut source = RgbaImage::new(2, 1);
        source.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        source.put_pixel(1, 0, Rgba([0, 0, 255, 255]));
        let mut surface = RasterSurface::new(8, 4).unwrap();
        surface.draw_image(Rect::new(0.0, 0.0, 8.0, 4.0), &source);
        assert_eq!(*surface.pixels().get_pixel(1, 2), Rgba([255, 0, 0, 255]));
        assert_eq!(*surface.pixels().get_pixel(6, 2), Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn test_huge_shapes_are_clipped_to_the_buffer() {
        let mut surface = RasterSurface::new(4, 4).unwrap();
        surface.clear(white());
        let huge = Rect::new(-1.0e9, -1.0e9, 1.0e9, 1.0e9);
        surface.fill_rect(huge, black());
        assert!(surface.pixels().pixels().all(|p| *p == Rgba([0, 0, 0, 255])));

        let red = RgbaImage::from_pixel(1, 1, Rgba([255, 0, 0, 255]));
        surface.draw_image(huge, &red);
        assert_eq!(*surface.pixels().get_pixel(3, 3), Rgba([255, 0, 0, 255]));

        let across = [Point::new(-1.0e9, 2.0), Point::new(1.0e9, 2.0)];
        surface.stroke_polyline(&across, white(), 1.0);
        assert_eq!(*surface.pixels().get_pixel(2, 2), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_segment_outside_buffer_draws_nothing() {
        let bounds = Rect::new(0.0, 0.0, 10.0, 10.0);
        let outside = (Point::new(-5.0, 20.0), Point::new(30.0, 20.0));
        let (a, b) = clip_segment(Point::new(-10.0, 5.0), Point::new(20.0, 5.0), bounds).unwrap();
        assert!(a.distance(Point::new(0.0, 5.0)) < 1e-9);
        assert!(b.distance(Point::new(10.0, 5.0)) < 1e-9);
        assert!(clip_segment(outside.0, outside.1, bounds).is_none());
    }

    #[test]
    fn test_translucent_fill_blends() {
        let mut surface = RasterSurface::new(2, 2).unwrap();
        surface.clear(white());
        surface.fill_rect(Rect::new(0.0, 0.0, 2.0, 2.0), Color::from_rgba8(0, 0, 0, 128));
        let pixel = surface.pixels().get_pixel(0, 0);
        assert!(pixel[0] > 100 && pixel[0] < 160);
        assert_eq!(pixel[3], 255);
    }
}
