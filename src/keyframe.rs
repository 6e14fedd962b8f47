//! Extraction results.
//!
//! A run produces an [`Extraction`]: the probed [`VideoMetadata`], the
//! chronologically ordered [`Keyframe`]s, and an [`ExtractionReport`] with
//! per-stage counts.

use std::time::Duration;

use serde::Serialize;

use crate::{metadata::VideoMetadata, render::ImagePayload};

/// One selected and encoded frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Keyframe {
    pub frame_index: u64,
    /// Seconds from the start of the video.
    pub timestamp: f64,
    /// Encoded image; empty if encoding failed.
    pub payload: ImagePayload,
}

impl Keyframe {
    /// File name used when writing the keyframe to disk:
    /// `keyframe_<index>_<milliseconds>ms.<ext>`.
    pub fn file_name(&self) -> String {
        format!(
            "keyframe_{}_{}ms.{}",
            self.frame_index,
            (self.timestamp * 1000.0).round() as u64,
            self.payload.format.extension()
        )
    }
}

/// Counts from each stage of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractionReport {
    /// Number of scored samples, including the initial zero-score sample.
    pub samples_analyzed: usize,
    /// Time anchors selected.
    pub anchors: usize,
    /// Content frames selected.
    pub content_frames: usize,
    /// Candidates left after deduplication (all candidates when disabled).
    pub candidates_after_dedup: usize,
    /// Frames chosen by the final bucket stage.
    pub selected: usize,
    /// Frames successfully decoded and emitted.
    pub rendered: usize,
    /// Wall time of the whole run.
    #[serde(serialize_with = "serialize_seconds")]
    pub processing_time: Duration,
}

fn serialize_seconds<S: serde::Serializer>(
    duration: &Duration,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

/// Everything produced by one extraction run.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub metadata: VideoMetadata,
    /// Keyframes in chronological order.
    pub keyframes: Vec<Keyframe>,
    pub report: ExtractionReport,
}

impl Extraction {
    /// Timestamps of the keyframes, in order.
    pub fn timestamps(&self) -> Vec<f64> {
        self.keyframes.iter().map(|keyframe| keyframe.timestamp).collect()
    }

    pub fn keyframes_count(&self) -> usize {
        self.keyframes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keyframes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::ImageFormat;

    fn keyframe(frame_index: u64, timestamp: f64) -> Keyframe {
        Keyframe {
            frame_index,
            timestamp,
            payload: ImagePayload::unavailable(ImageFormat::Jpeg),
        }
    }

    #[test]
    fn file_name_uses_milliseconds() {
        assert_eq!(keyframe(150, 5.0).file_name(), "keyframe_150_5000ms.jpg");
        assert_eq!(keyframe(7, 0.2335).file_name(), "keyframe_7_234ms.jpg");
    }

    #[test]
    fn report_serializes_processing_time_as_seconds() {
        let report = ExtractionReport {
            processing_time: Duration::from_millis(1500),
            ..ExtractionReport::default()
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["processing_time"], 1.5);
        assert_eq!(json["samples_analyzed"], 0);
    }

    #[test]
    fn timestamps_follow_keyframe_order() {
        let extraction = Extraction {
            metadata: VideoMetadata::new(300, 30.0, 640, 360, "h264".to_string()),
            keyframes: vec![keyframe(0, 0.0), keyframe(60, 2.0), keyframe(240, 8.0)],
            report: ExtractionReport::default(),
        };
        assert_eq!(extraction.timestamps(), vec![0.0, 2.0, 8.0]);
        assert_eq!(extraction.keyframes_count(), 3);
        assert!(!extraction.is_empty());
    }
}
