//! Editor configuration.

use crate::history::HistoryConfig;
use serde::{Deserialize, Serialize};

/// Tunables for the editor, collaboration bus and persistence.
///
/// Every field has a default, so a JSON file only needs to list the values
/// it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditorConfig {
    pub history: HistoryConfig,
    /// Extra reach added to element hit areas, in surface units.
    pub hit_tolerance: f64,
    /// Radius of image resize handles.
    pub handle_radius: f64,
    /// Minimum width and height an image can be resized to.
    pub min_image_size: f64,
    /// Placed images are scaled down to fit a square of this side.
    pub image_fit_size: f64,
    /// Offset applied to pasted elements.
    pub paste_offset: f64,
    /// Interval between storage polls, in milliseconds.
    pub poll_interval_ms: u64,
    /// Envelopes older than this are ignored by the poller.
    pub envelope_window_ms: u64,
    /// Number of envelopes kept per share in durable storage.
    pub envelope_retention: usize,
    /// Minimum time between autosaves, in milliseconds.
    pub autosave_interval_ms: u64,
    /// Prefix for every storage key the editor writes.
    pub key_prefix: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            history: HistoryConfig::default(),
            hit_tolerance: 2.0,
            handle_radius: crate::hit::HANDLE_RADIUS,
            min_image_size: 10.0,
            image_fit_size: 400.0,
            paste_offset: 10.0,
            poll_interval_ms: 1_000,
            envelope_window_ms: 10_000,
            envelope_retention: 10,
            autosave_interval_ms: 2_000,
            key_prefix: "scrawl".to_string(),
        }
    }
}

impl EditorConfig {
    /// Parse from JSON; missing fields fall back to defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Storage key for a named record, e.g. `scrawl.session`.
    pub fn key(&self, name: &str) -> String {
        format!("{}.{}", self.key_prefix, name)
    }
}
