//! Rendering selected frames to encoded image payloads.
//!
//! [`FrameRenderer`] re-reads each selected frame at full resolution,
//! optionally runs the enhancement chain, and encodes it as JPEG. A frame
//! that cannot be decoded is skipped; a frame that cannot be encoded keeps
//! its place with an empty [`ImagePayload`].

use std::{
    collections::HashMap,
    fmt::{Display, Formatter, Result as FmtResult},
};

use base64::{Engine as _, engine::general_purpose};
use image::{
    ImageError, RgbImage,
    codecs::jpeg::JpegEncoder,
    error::{ParameterError, ParameterErrorKind},
};

use crate::{
    configuration::{ExtractOptions, ExtractionConfig},
    enhance,
    error::KeyframeError,
    keyframe::Keyframe,
    progress::{OperationType, ProgressTracker},
    sample::Candidate,
    video_file::VideoFile,
};

/// JPEG quality used for every keyframe.
pub const JPEG_QUALITY: u8 = 85;

/// Encoding of an [`ImagePayload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Jpeg,
}

impl ImageFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
        }
    }
}

impl Display for ImageFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ImageFormat::Jpeg => f.write_str("jpeg"),
        }
    }
}

/// A self-describing encoded image: format plus bytes.
///
/// An empty payload means the frame was selected but could not be encoded
/// and must be treated as unavailable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub format: ImageFormat,
    pub bytes: Vec<u8>,
}

impl ImagePayload {
    /// Encode an RGB frame as JPEG at `quality` (1–100).
    ///
    /// # Errors
    ///
    /// Returns [`KeyframeError::ImageError`] if the encoder rejects the
    /// image.
    pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Self, KeyframeError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(ImageError::Parameter(ParameterError::from_kind(
                ParameterErrorKind::DimensionMismatch,
            ))
            .into());
        }
        let mut bytes = Vec::new();
        JpegEncoder::new_with_quality(&mut bytes, quality).encode_image(image)?;
        Ok(Self {
            format: ImageFormat::Jpeg,
            bytes,
        })
    }

    /// A payload standing in for a frame that could not be encoded.
    pub fn unavailable(format: ImageFormat) -> Self {
        Self {
            format,
            bytes: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Standard base64 of the encoded bytes.
    pub fn to_base64(&self) -> String {
        general_purpose::STANDARD.encode(&self.bytes)
    }

    /// `data:<mime>;base64,<…>` URI, or an empty string for an unavailable
    /// payload.
    pub fn to_data_uri(&self) -> String {
        if self.is_empty() {
            return String::new();
        }
        format!("data:{};base64,{}", self.format.mime_type(), self.to_base64())
    }
}

/// Turns selected candidates into [`Keyframe`]s.
pub struct FrameRenderer<'a> {
    config: &'a ExtractionConfig,
    options: &'a ExtractOptions,
}

impl<'a> FrameRenderer<'a> {
    pub fn new(config: &'a ExtractionConfig, options: &'a ExtractOptions) -> Self {
        Self { config, options }
    }

    /// Decode, enhance if configured, and encode every selected frame.
    /// Output order follows `selected`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyframeError::Cancelled`] if the run is cancelled, or an
    /// error if the decoder cannot be created.
    pub fn render(
        &self,
        video: &mut VideoFile,
        selected: &[Candidate],
    ) -> Result<Vec<Keyframe>, KeyframeError> {
        self.options.check_cancelled()?;
        let indices: Vec<u64> = selected.iter().map(Candidate::frame_index).collect();
        let mut tracker = ProgressTracker::new(
            self.options,
            OperationType::Rendering,
            Some(indices.len() as u64),
        );

        let mut payloads: HashMap<u64, ImagePayload> = HashMap::with_capacity(indices.len());
        video.read_frames(&indices, None, |index, image| {
            self.options.check_cancelled()?;
            payloads.insert(index, self.render_frame(index, &image));
            tracker.advance(Some(index));
            Ok(())
        })?;
        tracker.finish();

        let mut keyframes = Vec::with_capacity(selected.len());
        for candidate in selected {
            match payloads.get(&candidate.frame_index()) {
                Some(payload) => keyframes.push(Keyframe {
                    frame_index: candidate.frame_index(),
                    timestamp: candidate.timestamp(),
                    payload: payload.clone(),
                }),
                None => log::warn!(
                    "Frame {} could not be read, leaving it out",
                    candidate.frame_index()
                ),
            }
        }

        log::info!(
            "Rendered {} of {} selected frames",
            keyframes.len(),
            selected.len()
        );
        Ok(keyframes)
    }

    /// Enhance (if configured) and encode one decoded frame.
    pub fn render_frame(&self, frame_index: u64, image: &RgbImage) -> ImagePayload {
        let encoded = if self.config.enable_image_enhancement {
            ImagePayload::encode_jpeg(&enhance::enhance_frame(image), JPEG_QUALITY)
        } else {
            ImagePayload::encode_jpeg(image, JPEG_QUALITY)
        };
        encoded.unwrap_or_else(|error| {
            log::warn!("Failed to encode frame {frame_index}: {error}");
            ImagePayload::unavailable(ImageFormat::Jpeg)
        })
    }
}
