//! Extraction configuration.
//!
//! [`ExtractionConfig`] carries every tuning knob of the selection pipeline.
//! It is resolved once per run (defaults, then an optional flat JSON map,
//! then builder overrides), validated, and then shared by reference with
//! every stage; no stage can observe a different configuration than another.
//!
//! [`ExtractOptions`] threads the operational settings that do not affect
//! which frames are chosen (progress callbacks and cancellation) through the
//! pipeline without polluting every function signature.
//!
//! # Example
//!
//! ```
//! use keyframer::ExtractionConfig;
//!
//! let config = ExtractionConfig::from_json_str(r#"{ "max_frames": 6, "frame_gap": 10 }"#)
//!     .unwrap()
//!     .with_min_time_gap(1.5);
//!
//! assert_eq!(config.max_frames, 6);
//! assert_eq!(config.frame_gap, 10);
//! assert_eq!(config.similarity_threshold, 0.95);
//! assert!(config.validate().is_ok());
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::KeyframeError;
use crate::progress::{CancellationToken, NoOpProgress, ProgressCallback};

/// Tuning parameters for one keyframe extraction run.
///
/// Every field has a default, and a flat JSON object with any subset of the
/// field names deserializes into a complete configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
#[must_use]
pub struct ExtractionConfig {
    /// Hard cap on the number of keyframes returned.
    pub max_frames: usize,
    /// Minimum spacing in seconds enforced by the anchor, content, and
    /// bucket stages.
    pub min_time_gap: f64,
    /// Apply exposure, contrast, and sharpness correction when rendering.
    pub enable_image_enhancement: bool,
    /// Floor on the candidate count after similarity deduplication.
    pub min_frames_after_dedup: usize,
    /// Sampling stride: every `frame_gap`-th frame is scored.
    pub frame_gap: u64,
    /// Weight of the optical-flow motion signal.
    pub motion_weight: f64,
    /// Weight of the mean pixel-difference signal.
    pub scene_weight: f64,
    /// Weight of the colour-histogram distance signal.
    pub color_weight: f64,
    /// Weight of the edge-map difference signal.
    pub edge_weight: f64,
    /// Fraction (0–1) of above-threshold candidates kept by content selection.
    pub content_frame_bar: f64,
    /// Remove visually redundant candidates before the final selection.
    pub enable_deduplication: bool,
    /// Structural similarity above which two candidates count as duplicates.
    pub similarity_threshold: f64,
    /// Longest edge, in pixels, of the frame copies used for analysis and
    /// deduplication.
    pub maximum_dimension: u32,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_frames: 12,
            min_time_gap: 0.8,
            enable_image_enhancement: false,
            min_frames_after_dedup: 3,
            frame_gap: 5,
            motion_weight: 3.0,
            scene_weight: 1.5,
            color_weight: 0.5,
            edge_weight: 2.0,
            content_frame_bar: 0.5,
            enable_deduplication: true,
            similarity_threshold: 0.95,
            maximum_dimension: 480,
        }
    }
}

impl ExtractionConfig {
    /// Create a configuration with the default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a flat JSON object. Missing keys keep their defaults; unknown
    /// keys are rejected.
    ///
    /// # Errors
    ///
    /// Returns [`KeyframeError::ConfigurationParse`] on malformed input.
    pub fn from_json_str(json: &str) -> Result<Self, KeyframeError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a flat JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`KeyframeError::IoError`] if the file cannot be read, or
    /// [`KeyframeError::ConfigurationParse`] if it is not a valid
    /// configuration object.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, KeyframeError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Check that the configuration can drive a run.
    ///
    /// # Errors
    ///
    /// Returns [`KeyframeError::InvalidConfiguration`] naming the first
    /// offending key.
    pub fn validate(&self) -> Result<(), KeyframeError> {
        let invalid = |message: String| Err(KeyframeError::InvalidConfiguration(message));

        if self.max_frames == 0 {
            return invalid("max_frames must be greater than zero".to_string());
        }
        if self.frame_gap == 0 {
            return invalid("frame_gap must be greater than zero".to_string());
        }
        if self.maximum_dimension == 0 {
            return invalid("maximum_dimension must be greater than zero".to_string());
        }
        if !self.min_time_gap.is_finite() || self.min_time_gap < 0.0 {
            return invalid(format!(
                "min_time_gap must be a non-negative number of seconds, got {}",
                self.min_time_gap
            ));
        }
        if !(0.0..=1.0).contains(&self.content_frame_bar) {
            return invalid(format!(
                "content_frame_bar must lie in [0, 1], got {}",
                self.content_frame_bar
            ));
        }
        if !self.similarity_threshold.is_finite() {
            return invalid("similarity_threshold must be finite".to_string());
        }
        for (name, weight) in [
            ("motion_weight", self.motion_weight),
            ("scene_weight", self.scene_weight),
            ("color_weight", self.color_weight),
            ("edge_weight", self.edge_weight),
        ] {
            if !weight.is_finite() {
                return invalid(format!("{name} must be finite, got {weight}"));
            }
        }
        Ok(())
    }

    /// Set the maximum number of keyframes.
    pub fn with_max_frames(mut self, max_frames: usize) -> Self {
        self.max_frames = max_frames;
        self
    }

    /// Set the minimum spacing between keyframes, in seconds.
    pub fn with_min_time_gap(mut self, seconds: f64) -> Self {
        self.min_time_gap = seconds;
        self
    }

    /// Enable or disable image enhancement during rendering.
    pub fn with_image_enhancement(mut self, enabled: bool) -> Self {
        self.enable_image_enhancement = enabled;
        self
    }

    /// Set the floor on candidates kept by deduplication.
    pub fn with_min_frames_after_dedup(mut self, count: usize) -> Self {
        self.min_frames_after_dedup = count;
        self
    }

    /// Set the analysis sampling stride.
    pub fn with_frame_gap(mut self, frame_gap: u64) -> Self {
        self.frame_gap = frame_gap;
        self
    }

    /// Set the motion signal weight.
    pub fn with_motion_weight(mut self, weight: f64) -> Self {
        self.motion_weight = weight;
        self
    }

    /// Set the scene (pixel difference) signal weight.
    pub fn with_scene_weight(mut self, weight: f64) -> Self {
        self.scene_weight = weight;
        self
    }

    /// Set the colour histogram signal weight.
    pub fn with_color_weight(mut self, weight: f64) -> Self {
        self.color_weight = weight;
        self
    }

    /// Set the edge signal weight.
    pub fn with_edge_weight(mut self, weight: f64) -> Self {
        self.edge_weight = weight;
        self
    }

    /// Set the fraction of high-change candidates kept by content selection.
    pub fn with_content_frame_bar(mut self, fraction: f64) -> Self {
        self.content_frame_bar = fraction;
        self
    }

    /// Enable or disable similarity deduplication.
    pub fn with_deduplication(mut self, enabled: bool) -> Self {
        self.enable_deduplication = enabled;
        self
    }

    /// Set the structural-similarity merge threshold.
    pub fn with_similarity_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    /// Set the longest edge of analysis frame copies.
    pub fn with_maximum_dimension(mut self, pixels: u32) -> Self {
        self.maximum_dimension = pixels;
        self
    }
}

/// Operational settings for a run.
///
/// Carries the progress callback, the cancellation token, and the progress
/// cadence. None of these influence which frames are selected.
///
/// All fields have sensible defaults; a default-constructed value reports
/// nothing and is never cancelled.
#[derive(Clone)]
pub struct ExtractOptions {
    /// Progress callback. Defaults to a no-op.
    pub(crate) progress: Arc<dyn ProgressCallback>,
    /// Cancellation token. `None` means never cancelled.
    pub(crate) cancellation: Option<CancellationToken>,
    /// How often to fire the progress callback (every N items).
    pub(crate) batch_size: u64,
}

impl Debug for ExtractOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ExtractOptions")
            .field("has_cancellation", &self.cancellation.is_some())
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractOptions {
    /// Create options with no progress callback, no cancellation, and a
    /// batch size of 1.
    pub fn new() -> Self {
        Self {
            progress: Arc::new(NoOpProgress),
            cancellation: None,
            batch_size: 1,
        }
    }

    /// Attach a progress callback.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Attach a cancellation token.
    ///
    /// When the token is cancelled, the current decode loop stops and the
    /// run yields [`KeyframeError::Cancelled`].
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Set how often the progress callback fires. Clamped to at least 1.
    #[must_use]
    pub fn with_batch_size(mut self, size: u64) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Returns `true` if cancellation has been requested.
    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
    }

    /// Fail with [`KeyframeError::Cancelled`] if cancellation was requested.
    pub(crate) fn check_cancelled(&self) -> Result<(), KeyframeError> {
        if self.is_cancelled() {
            Err(KeyframeError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_table() {
        let config = ExtractionConfig::default();
        assert_eq!(config.max_frames, 12);
        assert_eq!(config.min_time_gap, 0.8);
        assert!(!config.enable_image_enhancement);
        assert_eq!(config.min_frames_after_dedup, 3);
        assert_eq!(config.frame_gap, 5);
        assert_eq!(config.motion_weight, 3.0);
        assert_eq!(config.scene_weight, 1.5);
        assert_eq!(config.color_weight, 0.5);
        assert_eq!(config.edge_weight, 2.0);
        assert_eq!(config.content_frame_bar, 0.5);
        assert!(config.enable_deduplication);
        assert_eq!(config.similarity_threshold, 0.95);
        assert_eq!(config.maximum_dimension, 480);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config =
            ExtractionConfig::from_json_str(r#"{"enable_deduplication": false, "min_time_gap": 2}"#)
                .unwrap();
        assert!(!config.enable_deduplication);
        assert_eq!(config.min_time_gap, 2.0);
        assert_eq!(config.max_frames, 12);
    }

    #[test]
    fn unknown_json_key_is_rejected() {
        let result = ExtractionConfig::from_json_str(r#"{"max_frame": 3}"#);
        assert!(matches!(result, Err(KeyframeError::ConfigurationParse(_))));
    }

    #[test]
    fn json_round_trip_preserves_values() {
        let config = ExtractionConfig::new()
            .with_max_frames(4)
            .with_similarity_threshold(0.9);
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(ExtractionConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn validate_rejects_unusable_values() {
        let cases = [
            ExtractionConfig::new().with_frame_gap(0),
            ExtractionConfig::new().with_max_frames(0),
            ExtractionConfig::new().with_maximum_dimension(0),
            ExtractionConfig::new().with_min_time_gap(-1.0),
            ExtractionConfig::new().with_min_time_gap(f64::NAN),
            ExtractionConfig::new().with_content_frame_bar(1.5),
            ExtractionConfig::new().with_similarity_threshold(f64::INFINITY),
            ExtractionConfig::new().with_edge_weight(f64::NAN),
        ];
        for config in cases {
            assert!(
                matches!(config.validate(), Err(KeyframeError::InvalidConfiguration(_))),
                "expected rejection for {config:?}"
            );
        }
    }

    #[test]
    fn options_debug_and_batch_clamp() {
        let options = ExtractOptions::new().with_batch_size(0);
        let debug = format!("{options:?}");
        assert!(debug.contains("has_cancellation: false"));
        assert!(debug.contains("batch_size: 1"));
    }

    #[test]
    fn options_observe_cancellation() {
        let token = CancellationToken::new();
        let options = ExtractOptions::new().with_cancellation(token.clone());
        assert!(options.check_cancelled().is_ok());
        token.cancel();
        assert!(matches!(
            options.check_cancelled(),
            Err(KeyframeError::Cancelled)
        ));
    }
}
