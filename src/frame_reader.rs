//! Frame decoding on top of a [`VideoFile`].
//!
//! Two access patterns are supported:
//!
//! - [`VideoFile::sequential_frames`] decodes every frame from the start in
//!   decode order, numbering frames by their position in that order. This is
//!   the single forward pass used by signal analysis.
//! - [`VideoFile::read_frames`] seeks to a sorted set of frame indices and
//!   decodes each one, numbering frames by their presentation timestamp.
//!   Deduplication and rendering use it.
//!
//! Both paths convert frames to packed RGB24 through FFmpeg's software
//! scaler, optionally shrinking them so the larger side fits a bound.

use ffmpeg_next::{
    Error as FfmpegError, Packet,
    codec::context::Context as CodecContext,
    decoder::Video as VideoDecoder,
    format::Pixel,
    frame::Video as VideoFrame,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};
use image::RgbImage;

use crate::{error::KeyframeError, imaging, video_file::VideoFile};

/// Targets closer than this many frames ahead of the cursor are reached by
/// decoding forward instead of seeking.
const FORWARD_DECODE_WINDOW: u64 = 90;

/// Decoder plus RGB conversion state for one stage.
struct FrameDecoder {
    decoder: VideoDecoder,
    scaler: ScalingContext,
    target_width: u32,
    target_height: u32,
    decoded_frame: VideoFrame,
    scaled_frame: VideoFrame,
}

impl FrameDecoder {
    fn new(video: &VideoFile, maximum_dimension: Option<u32>) -> Result<Self, KeyframeError> {
        let stream = video
            .input_context
            .stream(video.stream_index)
            .ok_or(KeyframeError::NoVideoStream)?;
        let decoder = CodecContext::from_parameters(stream.parameters())?
            .decoder()
            .video()?;

        let (target_width, target_height) = match maximum_dimension {
            Some(bound) => imaging::fit_within(decoder.width(), decoder.height(), bound),
            None => (decoder.width(), decoder.height()),
        };

        let scaler = ScalingContext::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            Pixel::RGB24,
            target_width,
            target_height,
            ScalingFlags::BILINEAR,
        )?;

        Ok(Self {
            decoder,
            scaler,
            target_width,
            target_height,
            decoded_frame: VideoFrame::empty(),
            scaled_frame: VideoFrame::empty(),
        })
    }

    fn convert_current_frame(&mut self) -> Result<RgbImage, KeyframeError> {
        self.follow_input_geometry()?;
        self.scaler.run(&self.decoded_frame, &mut self.scaled_frame)?;
        let buffer = crate::conversion::frame_to_buffer(
            &self.scaled_frame,
            self.target_width,
            self.target_height,
            3,
        );
        RgbImage::from_raw(self.target_width, self.target_height, buffer).ok_or_else(|| {
            KeyframeError::VideoDecodeError(
                "Failed to construct RGB image from decoded frame data".to_string(),
            )
        })
    }

    /// Rebuild the scaler when the stream changes size or pixel format
    /// mid-way. Output frames keep the size chosen at open time.
    fn follow_input_geometry(&mut self) -> Result<(), KeyframeError> {
        let input = self.scaler.input();
        let frame = &self.decoded_frame;
        if input.format == frame.format()
            && input.width == frame.width()
            && input.height == frame.height()
        {
            return Ok(());
        }
        log::debug!(
            "Input changed to {}x{} {:?}, rebuilding scaler",
            frame.width(),
            frame.height(),
            frame.format()
        );
        self.scaler = ScalingContext::get(
            frame.format(),
            frame.width(),
            frame.height(),
            Pixel::RGB24,
            self.target_width,
            self.target_height,
            ScalingFlags::BILINEAR,
        )?;
        Ok(())
    }
}

/// Pull-based iterator over every decoded frame of a video, in decode order.
///
/// Yields `(frame_index, image)` where `frame_index` counts decoded frames
/// from 0. A frame that fails to convert is yielded as an error and keeps
/// its index; iteration carries on with the next frame. Created by
/// [`VideoFile::sequential_frames`].
pub struct SequentialFrames<'a> {
    video: &'a mut VideoFile,
    frame_decoder: FrameDecoder,
    next_index: u64,
    eof_sent: bool,
    done: bool,
}

impl Iterator for SequentialFrames<'_> {
    type Item = Result<(u64, RgbImage), KeyframeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            if self
                .frame_decoder
                .decoder
                .receive_frame(&mut self.frame_decoder.decoded_frame)
                .is_ok()
            {
                let index = self.next_index;
                self.next_index += 1;
                return Some(
                    self.frame_decoder
                        .convert_current_frame()
                        .map(|image| (index, image)),
                );
            }

            if self.eof_sent {
                self.done = true;
                return None;
            }

            let mut packet = Packet::empty();
            match packet.read(&mut self.video.input_context) {
                Ok(()) => {
                    if packet.stream() == self.video.stream_index {
                        if let Err(error) = self.frame_decoder.decoder.send_packet(&packet) {
                            // Corrupt packets are dropped; the decoder recovers
                            // at the next keyframe.
                            log::debug!("Skipping undecodable packet: {error}");
                        }
                    }
                }
                Err(FfmpegError::Eof) => {
                    if let Err(error) = self.frame_decoder.decoder.send_eof() {
                        self.done = true;
                        return Some(Err(KeyframeError::from(error)));
                    }
                    self.eof_sent = true;
                }
                Err(error) => {
                    log::debug!("Non-fatal read error: {error}");
                }
            }
        }
    }
}

impl VideoFile {
    /// Decode the whole video from the first frame, optionally shrinking
    /// every frame so its larger side is at most `maximum_dimension`.
    ///
    /// # Errors
    ///
    /// Returns an error if the decoder or scaler cannot be created.
    pub fn sequential_frames(
        &mut self,
        maximum_dimension: Option<u32>,
    ) -> Result<SequentialFrames<'_>, KeyframeError> {
        let frame_decoder = FrameDecoder::new(self, maximum_dimension)?;
        if let Err(error) = self.input_context.seek(0, ..0) {
            log::debug!("Rewind before sequential decode failed: {error}");
        }
        Ok(SequentialFrames {
            video: self,
            frame_decoder,
            next_index: 0,
            eof_sent: false,
            done: false,
        })
    }

    /// Decode the frames at `frame_indices` and hand each to `on_frame`.
    ///
    /// Indices are visited in ascending order with duplicates removed. For
    /// each target the first decoded frame whose presentation index is at or
    /// after the target is delivered under the target's index. Targets past
    /// the end of the stream, and frames that fail to convert, are skipped
    /// with a warning. An error returned by `on_frame` stops the read and is
    /// propagated, which is how callers cancel.
    ///
    /// # Errors
    ///
    /// Returns an error if the decoder cannot be created or `on_frame`
    /// fails.
    pub fn read_frames<F>(
        &mut self,
        frame_indices: &[u64],
        maximum_dimension: Option<u32>,
        mut on_frame: F,
    ) -> Result<(), KeyframeError>
    where
        F: FnMut(u64, RgbImage) -> Result<(), KeyframeError>,
    {
        let mut targets = frame_indices.to_vec();
        targets.sort_unstable();
        targets.dedup();
        if targets.is_empty() {
            return Ok(());
        }

        let mut frame_decoder = FrameDecoder::new(self, maximum_dimension)?;
        let fps = self.metadata.fps;
        let start_seconds = crate::conversion::pts_to_seconds(self.start_pts, self.time_base);
        let mut next_target = 0;
        let mut eof_sent = false;

        self.seek_to_frame(&mut frame_decoder, targets[0], start_seconds);

        loop {
            while frame_decoder
                .decoder
                .receive_frame(&mut frame_decoder.decoded_frame)
                .is_ok()
            {
                let pts = frame_decoder
                    .decoded_frame
                    .timestamp()
                    .or_else(|| frame_decoder.decoded_frame.pts())
                    .unwrap_or(self.start_pts);
                let current =
                    crate::conversion::pts_to_frame_index(pts, self.start_pts, self.time_base, fps);

                if current < targets[next_target] {
                    continue;
                }

                match frame_decoder.convert_current_frame() {
                    Ok(image) => {
                        while next_target < targets.len() && targets[next_target] <= current {
                            on_frame(targets[next_target], image.clone())?;
                            next_target += 1;
                        }
                    }
                    Err(error) => {
                        while next_target < targets.len() && targets[next_target] <= current {
                            log::warn!(
                                "Failed to convert frame {}: {error}",
                                targets[next_target]
                            );
                            next_target += 1;
                        }
                    }
                }

                if next_target >= targets.len() {
                    return Ok(());
                }

                if targets[next_target] > current + FORWARD_DECODE_WINDOW {
                    self.seek_to_frame(&mut frame_decoder, targets[next_target], start_seconds);
                    eof_sent = false;
                }
            }

            if eof_sent {
                break;
            }

            let mut packet = Packet::empty();
            match packet.read(&mut self.input_context) {
                Ok(()) => {
                    if packet.stream() == self.stream_index {
                        if let Err(error) = frame_decoder.decoder.send_packet(&packet) {
                            log::debug!("Skipping undecodable packet: {error}");
                        }
                    }
                }
                Err(FfmpegError::Eof) => {
                    frame_decoder.decoder.send_eof()?;
                    eof_sent = true;
                }
                Err(error) => {
                    log::debug!("Non-fatal read error: {error}");
                }
            }
        }

        for &missing in &targets[next_target..] {
            log::warn!(
                "Frame {missing} could not be decoded from {}",
                self.file_path.display()
            );
        }
        Ok(())
    }

    /// Seek to the keyframe at or before `frame_index` and drop any frames
    /// still buffered in the decoder. A failed seek leaves the cursor where
    /// it was, so the caller falls back to decoding forward.
    fn seek_to_frame(&mut self, frame_decoder: &mut FrameDecoder, frame_index: u64, start: f64) {
        let timestamp = crate::conversion::frame_index_to_seek_timestamp(
            frame_index,
            self.metadata.fps,
            start,
        );
        match self.input_context.seek(timestamp, ..timestamp) {
            Ok(()) => frame_decoder.decoder.flush(),
            Err(error) => log::debug!("Seek to frame {frame_index} failed: {error}"),
        }
    }
}
