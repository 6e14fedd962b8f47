//! Video metadata.
//!
//! [`VideoMetadata`] is computed once when a video is opened and never
//! changes afterwards. Every later stage derives timestamps and time
//! segments from it.

use serde::Serialize;

/// Stream properties of the video being analysed.
///
/// # Example
///
/// ```no_run
/// use keyframer::VideoProbe;
///
/// let metadata = VideoProbe::probe("input.mp4")?;
/// println!(
///     "{} frames @ {:.2} fps, {:.2}s, {}x{}",
///     metadata.total_frames, metadata.fps, metadata.duration, metadata.width, metadata.height,
/// );
/// # Ok::<(), keyframer::KeyframeError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[must_use]
pub struct VideoMetadata {
    /// Total number of frames in the stream.
    pub total_frames: u64,
    /// Frames per second (average rate for variable-frame-rate content).
    pub fps: f64,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Duration in seconds, `total_frames / fps` (0 when `fps` ≤ 0).
    pub duration: f64,
    /// Pixel count of one frame (`width × height`).
    pub resolution_quality: u64,
    /// Decoder name (e.g. `"h264"`).
    pub codec: String,
}

impl VideoMetadata {
    /// Build metadata from the raw stream properties, deriving `duration`
    /// and `resolution_quality`.
    pub fn new(total_frames: u64, fps: f64, width: u32, height: u32, codec: String) -> Self {
        let duration = if fps > 0.0 {
            total_frames as f64 / fps
        } else {
            0.0
        };
        Self {
            total_frames,
            fps,
            width,
            height,
            duration,
            resolution_quality: u64::from(width) * u64::from(height),
            codec,
        }
    }

    /// Timestamp in seconds of `frame_index`, or 0 for a stream without a
    /// usable frame rate.
    pub fn timestamp_of(&self, frame_index: u64) -> f64 {
        if self.fps > 0.0 {
            frame_index as f64 / self.fps
        } else {
            0.0
        }
    }
}
