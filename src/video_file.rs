//! Core [`VideoFile`] implementation.
//!
//! `VideoFile` owns one demuxer context and the metadata of its best video
//! stream. It is the exclusive read cursor for a pipeline stage: the value is
//! neither `Clone` nor shared, and every stage that needs to decode (the
//! analyzer, the deduplicator's frame cache, the renderer) opens its own.

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
};

use ffmpeg_next::{
    Rational, codec::context::Context as CodecContext, format::context::Input, media::Type,
};

use crate::{error::KeyframeError, metadata::VideoMetadata};

/// An opened video file with a single, exclusively owned decode cursor.
///
/// # Example
///
/// ```no_run
/// use keyframer::VideoFile;
///
/// let video = VideoFile::open("input.mp4")?;
/// println!("{:.2}s at {:.2} fps", video.metadata().duration, video.metadata().fps);
/// # Ok::<(), keyframer::KeyframeError>(())
/// ```
pub struct VideoFile {
    /// The opened FFmpeg input (demuxer) context.
    pub(crate) input_context: Input,
    /// Index of the best video stream.
    pub(crate) stream_index: usize,
    /// Time base of the video stream.
    pub(crate) time_base: Rational,
    /// First PTS of the video stream in `time_base` units (0 when unknown).
    pub(crate) start_pts: i64,
    /// Cached metadata extracted at open time.
    pub(crate) metadata: VideoMetadata,
    /// Path to the opened file (kept for error messages).
    pub(crate) file_path: PathBuf,
}

impl Debug for VideoFile {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("VideoFile")
            .field("metadata", &self.metadata)
            .field("stream_index", &self.stream_index)
            .field("start_pts", &self.start_pts)
            .field("file_path", &self.file_path)
            .finish_non_exhaustive()
    }
}

impl VideoFile {
    /// Open a video file and read the metadata of its best video stream.
    ///
    /// Initializes FFmpeg (idempotent), opens the container, and computes
    /// [`VideoMetadata`]. The frame count comes from the stream header when
    /// the container records it, and from duration × frame rate otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`KeyframeError::FileOpen`] if the file cannot be opened or
    /// its decoder parameters cannot be read, and
    /// [`KeyframeError::NoVideoStream`] if it has no video stream.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, KeyframeError> {
        let path = path.as_ref();
        let file_path = path.to_path_buf();

        log::debug!("Opening video file: {}", file_path.display());

        ffmpeg_next::init().map_err(|error| KeyframeError::FileOpen {
            path: file_path.clone(),
            reason: format!("FFmpeg initialisation failed: {error}"),
        })?;

        let input_context =
            ffmpeg_next::format::input(&path).map_err(|error| KeyframeError::FileOpen {
                path: file_path.clone(),
                reason: error.to_string(),
            })?;

        let stream = input_context
            .streams()
            .best(Type::Video)
            .ok_or(KeyframeError::NoVideoStream)?;
        let stream_index = stream.index();
        let time_base = stream.time_base();

        let decoder = CodecContext::from_parameters(stream.parameters())
            .and_then(|context| context.decoder().video())
            .map_err(|error| KeyframeError::FileOpen {
                path: file_path.clone(),
                reason: format!("Failed to create video decoder for stream {stream_index}: {error}"),
            })?;

        let fps = rational_to_f64(stream.avg_frame_rate())
            .or_else(|| rational_to_f64(stream.rate()))
            .unwrap_or(0.0);

        let start_pts = match stream.start_time() {
            ffmpeg_next::ffi::AV_NOPTS_VALUE => 0,
            pts => pts,
        };

        let duration_seconds = if stream.duration() > 0 {
            crate::conversion::pts_to_seconds(stream.duration(), time_base)
        } else if input_context.duration() > 0 {
            input_context.duration() as f64 / f64::from(ffmpeg_next::ffi::AV_TIME_BASE)
        } else {
            0.0
        };

        let total_frames = if stream.frames() > 0 {
            stream.frames() as u64
        } else {
            (duration_seconds * fps).round().max(0.0) as u64
        };

        let codec = decoder
            .codec()
            .map(|codec| codec.name().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let metadata =
            VideoMetadata::new(total_frames, fps, decoder.width(), decoder.height(), codec);

        log::info!(
            "Opened video file: {} ({} frames, {:.2} fps, {:.2}s, {}x{}, codec={})",
            file_path.display(),
            metadata.total_frames,
            metadata.fps,
            metadata.duration,
            metadata.width,
            metadata.height,
            metadata.codec,
        );

        Ok(Self {
            input_context,
            stream_index,
            time_base,
            start_pts,
            metadata,
            file_path,
        })
    }

    /// Metadata computed when the file was opened.
    pub fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    /// Path the file was opened from.
    pub fn path(&self) -> &Path {
        &self.file_path
    }
}

fn rational_to_f64(rate: Rational) -> Option<f64> {
    if rate.numerator() > 0 && rate.denominator() > 0 {
        Some(f64::from(rate.numerator()) / f64::from(rate.denominator()))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rational_rates() {
        assert_eq!(rational_to_f64(Rational::new(30, 1)), Some(30.0));
        assert_eq!(rational_to_f64(Rational::new(0, 1)), None);
        assert_eq!(rational_to_f64(Rational::new(25, 0)), None);
    }

    #[test]
    fn open_missing_file_fails() {
        let result = VideoFile::open("definitely_missing_video.mp4");
        assert!(matches!(result, Err(KeyframeError::FileOpen { .. })));
    }
}
