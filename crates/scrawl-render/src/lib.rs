//! Scrawl Render Library
//!
//! Drawing-surface abstraction for Scrawl snapshots, a CPU rasterizer and
//! PNG export. Browser hosts implement [`Surface`] over their canvas.

pub mod export;
mod raster;
mod renderer;
mod surface;

pub use export::{ExportOptions, content_bounds, export_png};
pub use raster::RasterSurface;
pub use renderer::{
    RenderContext, RenderResult, RendererError, SnapshotRenderer, draw_segment, render_snapshot,
};
pub use surface::{DrawCommand, RecordingSurface, Surface};
