//! Per-sample signal analysis.
//!
//! [`FrameSignalAnalyzer`] makes a single forward pass over the decoded
//! frames. Every `frame_gap`-th frame is compared with the previously sampled
//! frame on four signals (motion, scene, colour, edges) and the weighted sum
//! becomes the sample's change score. The first decoded frame is always
//! recorded as a zero-score sample.
//!
//! # Example
//!
//! ```no_run
//! use keyframer::{ExtractOptions, ExtractionConfig, FrameSignalAnalyzer, VideoFile};
//!
//! let config = ExtractionConfig::default();
//! let options = ExtractOptions::new();
//! let mut video = VideoFile::open("input.mp4")?;
//! let samples = FrameSignalAnalyzer::new(&config, &options).analyze(&mut video)?;
//! println!("{} samples", samples.len());
//! # Ok::<(), keyframer::KeyframeError>(())
//! ```

use image::{GrayImage, RgbImage, imageops::FilterType};
use serde::Serialize;

use crate::{
    configuration::{ExtractOptions, ExtractionConfig},
    edges,
    error::KeyframeError,
    histogram::HueSaturationHistogram,
    imaging,
    metadata::VideoMetadata,
    optical_flow,
    progress::{OperationType, ProgressTracker},
    sample::{FrameSample, TimeSegment},
    video_file::VideoFile,
};

/// Decoded frames between "analysed N/M frames" log lines.
const LOG_INTERVAL: u64 = 100;

/// The analysis state kept for the previously sampled frame.
pub(crate) struct AnalysisFrame {
    pub(crate) gray: GrayImage,
    histogram: HueSaturationHistogram,
}

impl AnalysisFrame {
    pub(crate) fn new(image: &RgbImage) -> Self {
        Self {
            gray: imaging::to_grayscale(image),
            histogram: HueSaturationHistogram::from_image(image),
        }
    }
}

/// The four raw signals of one sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SignalScores {
    /// Mean optical-flow magnitude × 10.
    pub motion: f64,
    /// Mean absolute grayscale difference.
    pub scene: f64,
    /// Chi-square distance of hue × saturation histograms.
    pub color: f64,
    /// Edge-map difference per pixel × 100.
    pub edge: f64,
}

impl SignalScores {
    /// Score `current` against `previous`. A signal that cannot be computed
    /// contributes 0.
    pub(crate) fn between(previous: &AnalysisFrame, current: &AnalysisFrame) -> Self {
        let contained = |name: &str, value: Option<f64>| match value {
            Some(score) if score.is_finite() => score,
            _ => {
                log::debug!("{name} signal unavailable, scoring 0");
                0.0
            }
        };

        Self {
            motion: contained(
                "Motion",
                optical_flow::motion_score(&previous.gray, &current.gray),
            ),
            scene: contained(
                "Scene",
                imaging::mean_abs_difference(&previous.gray, &current.gray),
            ),
            color: contained(
                "Color",
                Some(previous.histogram.chi_square(&current.histogram)),
            ),
            edge: contained("Edge", edges::edge_score(&previous.gray, &current.gray)),
        }
    }

    /// Weighted composite change score.
    pub fn change_score(&self, config: &ExtractionConfig) -> f64 {
        self.motion * config.motion_weight
            + self.scene * config.scene_weight
            + self.color * config.color_weight
            + self.edge * config.edge_weight
    }
}

/// Single-pass analyzer producing the ordered [`FrameSample`] sequence.
pub struct FrameSignalAnalyzer<'a> {
    config: &'a ExtractionConfig,
    options: &'a ExtractOptions,
}

impl<'a> FrameSignalAnalyzer<'a> {
    pub fn new(config: &'a ExtractionConfig, options: &'a ExtractOptions) -> Self {
        Self { config, options }
    }

    /// Decode `video` from the start and score every sampled frame.
    ///
    /// Returns an empty sequence when the stream has no usable frame rate
    /// or no decodable frames.
    ///
    /// # Errors
    ///
    /// Returns [`KeyframeError::Cancelled`] if the run is cancelled, or an
    /// error if the decoder cannot be created.
    pub fn analyze(&self, video: &mut VideoFile) -> Result<Vec<FrameSample>, KeyframeError> {
        let metadata = video.metadata().clone();
        if metadata.fps <= 0.0 {
            log::warn!(
                "{} has no usable frame rate, nothing to analyse",
                video.path().display()
            );
            return Ok(Vec::new());
        }
        let frames = video.sequential_frames(Some(self.config.maximum_dimension))?;
        self.analyze_frames(frames, &metadata)
    }

    /// Score an already-decoded frame sequence in decode order.
    ///
    /// Frames larger than the configured maximum dimension are shrunk first.
    /// A frame that fails to decode is skipped.
    ///
    /// # Errors
    ///
    /// Returns [`KeyframeError::Cancelled`] if the run is cancelled.
    pub fn analyze_frames<I>(
        &self,
        frames: I,
        metadata: &VideoMetadata,
    ) -> Result<Vec<FrameSample>, KeyframeError>
    where
        I: IntoIterator<Item = Result<(u64, RgbImage), KeyframeError>>,
    {
        if metadata.fps <= 0.0 {
            return Ok(Vec::new());
        }

        let frame_gap = self.config.frame_gap.max(1);
        let total = (metadata.total_frames > 0).then_some(metadata.total_frames);
        let mut tracker = ProgressTracker::new(self.options, OperationType::FrameAnalysis, total);

        let mut samples = Vec::new();
        let mut previous: Option<AnalysisFrame> = None;

        for item in frames {
            self.options.check_cancelled()?;

            let (index, image) = match item {
                Ok(frame) => frame,
                Err(error) => {
                    log::warn!("Skipping undecodable frame during analysis: {error}");
                    continue;
                }
            };
            tracker.advance(Some(index));

            match previous.as_ref() {
                None => {
                    previous = Some(AnalysisFrame::new(&self.fit(image)));
                    samples.push(FrameSample::initial(
                        index,
                        metadata.timestamp_of(index),
                        metadata.duration,
                    ));
                }
                Some(last) if index % frame_gap == 0 => {
                    let current = AnalysisFrame::new(&self.fit(image));
                    let scores = SignalScores::between(last, &current);
                    let timestamp = metadata.timestamp_of(index);
                    samples.push(FrameSample {
                        frame_index: index,
                        timestamp,
                        change_score: scores.change_score(self.config),
                        scene_score: scores.scene,
                        motion_score: scores.motion,
                        color_score: scores.color,
                        edge_score: scores.edge,
                        time_segment: TimeSegment::classify(timestamp, metadata.duration),
                    });
                    previous = Some(current);
                }
                Some(_) => {}
            }

            if index > 0 && index % LOG_INTERVAL == 0 {
                log::info!("Analysed {index}/{} frames", metadata.total_frames);
            }
        }

        tracker.finish();
        log::info!("Frame analysis complete: {} samples", samples.len());
        Ok(samples)
    }

    /// Shrink a frame so its larger side fits the maximum dimension.
    fn fit(&self, image: RgbImage) -> RgbImage {
        let (width, height) =
            imaging::fit_within(image.width(), image.height(), self.config.maximum_dimension);
        if (width, height) == image.dimensions() {
            image
        } else {
            image::imageops::resize(&image, width, height, FilterType::Triangle)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::CancellationToken;
    use image::Rgb;

    fn metadata(total_frames: u64, fps: f64) -> VideoMetadata {
        VideoMetadata::new(total_frames, fps, 64, 48, "test".to_string())
    }

    fn solid(value: u8) -> RgbImage {
        RgbImage::from_pixel(64, 48, Rgb([value, value, value]))
    }

    fn frames(images: Vec<RgbImage>) -> impl Iterator<Item = Result<(u64, RgbImage), KeyframeError>> {
        images
            .into_iter()
            .enumerate()
            .map(|(index, image)| Ok((index as u64, image)))
    }

    #[test]
    fn static_video_samples_every_gap_with_zero_scores() {
        let config = ExtractionConfig::default().with_frame_gap(5);
        let options = ExtractOptions::new();
        let analyzer = FrameSignalAnalyzer::new(&config, &options);
        let images = (0..30).map(|_| solid(90)).collect();

        let samples = analyzer.analyze_frames(frames(images), &metadata(30, 30.0)).unwrap();

        let indices: Vec<u64> = samples.iter().map(|s| s.frame_index).collect();
        assert_eq!(indices, vec![0, 5, 10, 15, 20, 25]);
        assert!(samples.iter().all(|s| s.change_score == 0.0));
        assert_eq!(samples[0], FrameSample::initial(0, 0.0, 1.0));
        assert!((samples[3].timestamp - 0.5).abs() < 1e-12);
    }

    #[test]
    fn brightness_jump_raises_scene_score() {
        let config = ExtractionConfig::default().with_frame_gap(2);
        let options = ExtractOptions::new();
        let analyzer = FrameSignalAnalyzer::new(&config, &options);
        let images = vec![solid(10), solid(10), solid(10), solid(10), solid(200)];

        let samples = analyzer.analyze_frames(frames(images), &metadata(5, 10.0)).unwrap();

        assert_eq!(samples.len(), 3);
        assert_eq!(samples[1].scene_score, 0.0);
        assert_eq!(samples[2].frame_index, 4);
        assert_eq!(samples[2].scene_score, 190.0);
        assert!(samples[2].change_score >= 190.0 * config.scene_weight);
    }

    #[test]
    fn decode_errors_are_skipped() {
        let config = ExtractionConfig::default().with_frame_gap(1);
        let options = ExtractOptions::new();
        let analyzer = FrameSignalAnalyzer::new(&config, &options);
        let items = vec![
            Ok((0, solid(50))),
            Err(KeyframeError::VideoDecodeError("corrupt".to_string())),
            Ok((2, solid(50))),
        ];

        let samples = analyzer.analyze_frames(items, &metadata(3, 25.0)).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].frame_index, 2);
    }

    #[test]
    fn first_sample_keeps_the_index_of_the_first_good_frame() {
        let config = ExtractionConfig::default().with_frame_gap(5);
        let options = ExtractOptions::new();
        let analyzer = FrameSignalAnalyzer::new(&config, &options);
        let items = vec![
            Err(KeyframeError::VideoDecodeError("corrupt".to_string())),
            Ok((1, solid(50))),
            Ok((2, solid(60))),
            Ok((5, solid(70))),
        ];

        let samples = analyzer.analyze_frames(items, &metadata(10, 25.0)).unwrap();
        let indices: Vec<u64> = samples.iter().map(|sample| sample.frame_index).collect();
        assert_eq!(indices, vec![1, 5]);
        assert_eq!(samples[0].change_score, 0.0);
        assert!((samples[0].timestamp - 0.04).abs() < 1e-12);
    }

    #[test]
    fn zero_fps_yields_no_samples() {
        let config = ExtractionConfig::default();
        let options = ExtractOptions::new();
        let analyzer = FrameSignalAnalyzer::new(&config, &options);
        let samples = analyzer
            .analyze_frames(frames(vec![solid(1), solid(2)]), &metadata(2, 0.0))
            .unwrap();
        assert!(samples.is_empty());
    }

    #[test]
    fn cancellation_stops_the_pass() {
        let config = ExtractionConfig::default();
        let token = CancellationToken::new();
        token.cancel();
        let options = ExtractOptions::new().with_cancellation(token);
        let analyzer = FrameSignalAnalyzer::new(&config, &options);
        let result = analyzer.analyze_frames(frames(vec![solid(1)]), &metadata(1, 30.0));
        assert!(matches!(result, Err(KeyframeError::Cancelled)));
    }

    #[test]
    fn large_frames_are_downscaled() {
        let config = ExtractionConfig::default().with_maximum_dimension(32);
        let options = ExtractOptions::new();
        let analyzer = FrameSignalAnalyzer::new(&config, &options);
        let fitted = analyzer.fit(solid(0));
        assert_eq!(fitted.dimensions(), (32, 24));
    }
}
