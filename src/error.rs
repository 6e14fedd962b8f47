//! Error types for the `keyframer` crate.
//!
//! This module defines [`KeyframeError`], the unified error type returned by
//! every fallible operation in the crate. Only failures that leave a run with
//! nothing usable (an unopenable video, no analysable samples, an invalid
//! configuration, or cancellation) travel through this type; per-frame
//! problems are contained by the stage that hits them.

use std::{io::Error as IoError, path::PathBuf};

use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use thiserror::Error;

/// The unified error type for all `keyframer` operations.
///
/// Variants carry enough context to diagnose the problem without needing
/// additional logging at the call site.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KeyframeError {
    /// The video file could not be opened.
    #[error("Failed to open video file at {path}: {reason}")]
    FileOpen {
        /// Path that was passed to [`crate::VideoFile::open`].
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The file does not contain a video stream.
    #[error("No video stream found in file")]
    NoVideoStream,

    /// A video frame could not be decoded.
    #[error("Failed to decode video frame: {0}")]
    VideoDecodeError(String),

    /// The extraction configuration cannot be used for a run.
    #[error("Invalid extraction configuration: {0}")]
    InvalidConfiguration(String),

    /// Frame analysis produced no samples (empty or undecodable video).
    #[error("Frame analysis produced no samples")]
    NoSamples,

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error from the `image` crate during frame conversion or encoding.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),

    /// A configuration document could not be parsed.
    #[error("Configuration parse error: {0}")]
    ConfigurationParse(#[from] serde_json::Error),

    /// The operation was cancelled via a [`CancellationToken`](crate::CancellationToken).
    #[error("Operation cancelled")]
    Cancelled,
}

impl From<FfmpegError> for KeyframeError {
    fn from(error: FfmpegError) -> Self {
        KeyframeError::FfmpegError(error.to_string())
    }
}
