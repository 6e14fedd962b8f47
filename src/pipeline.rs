//! End-to-end keyframe extraction.
//!
//! [`KeyframeExtractor`] runs the stages in order:
//!
//! 1. probe the video,
//! 2. score every sampled frame ([`FrameSignalAnalyzer`]),
//! 3. derive the adaptive threshold, pick time anchors and content frames,
//! 4. optionally drop near-duplicates ([`SimilarityDeduplicator`]),
//! 5. enforce the count and spacing limits ([`FinalBucketSelector`]),
//! 6. decode and encode the survivors ([`FrameRenderer`]).
//!
//! Each decoding stage opens its own [`VideoFile`], so no decode cursor is
//! shared between stages.

use std::{path::Path, time::Instant};

use crate::{
    analyzer::FrameSignalAnalyzer,
    bucket::FinalBucketSelector,
    configuration::{ExtractOptions, ExtractionConfig},
    deduplicate::SimilarityDeduplicator,
    error::KeyframeError,
    keyframe::{Extraction, ExtractionReport, Keyframe},
    render::FrameRenderer,
    selection,
    video_file::VideoFile,
};

/// Runs the full selection pipeline for one configuration.
///
/// The configuration is fixed at construction; a single extractor may be
/// reused for many videos, and several extractors may run concurrently on
/// different threads.
///
/// # Example
///
/// ```no_run
/// use keyframer::{ExtractionConfig, KeyframeExtractor};
///
/// let config = ExtractionConfig::default().with_max_frames(8);
/// let extraction = KeyframeExtractor::new(config).try_extract("input.mp4")?;
/// for keyframe in &extraction.keyframes {
///     println!("{} @ {:.2}s", keyframe.frame_index, keyframe.timestamp);
/// }
/// # Ok::<(), keyframer::KeyframeError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct KeyframeExtractor {
    config: ExtractionConfig,
    options: ExtractOptions,
}

impl KeyframeExtractor {
    pub fn new(config: ExtractionConfig) -> Self {
        Self {
            config,
            options: ExtractOptions::new(),
        }
    }

    /// Attach progress reporting and cancellation.
    #[must_use]
    pub fn with_options(mut self, options: ExtractOptions) -> Self {
        self.options = options;
        self
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Extract keyframes, surfacing run-level failures as errors.
    ///
    /// # Errors
    ///
    /// - [`KeyframeError::InvalidConfiguration`] if the configuration
    ///   cannot run.
    /// - [`KeyframeError::FileOpen`] / [`KeyframeError::NoVideoStream`] if
    ///   the video cannot be opened.
    /// - [`KeyframeError::NoSamples`] if not a single frame could be
    ///   scored.
    /// - [`KeyframeError::Cancelled`] if the cancellation token fired.
    pub fn try_extract<P: AsRef<Path>>(&self, path: P) -> Result<Extraction, KeyframeError> {
        let path = path.as_ref();
        let started = Instant::now();
        self.config.validate()?;
        self.options.check_cancelled()?;

        let mut video = VideoFile::open(path)?;
        let metadata = video.metadata().clone();
        log::info!(
            "Video info: {} frames, {:.2} fps, {}x{}, {:.2}s",
            metadata.total_frames,
            metadata.fps,
            metadata.width,
            metadata.height,
            metadata.duration
        );

        let samples = FrameSignalAnalyzer::new(&self.config, &self.options).analyze(&mut video)?;
        drop(video);
        if samples.is_empty() {
            return Err(KeyframeError::NoSamples);
        }
        log::info!("Analysed {} samples", samples.len());

        let threshold = selection::adaptive_threshold(&samples);
        let anchors = selection::select_time_anchors(&samples);
        let content = selection::select_content_frames(&samples, &anchors, threshold, &self.config);
        let mut report = ExtractionReport {
            samples_analyzed: samples.len(),
            anchors: anchors.len(),
            content_frames: content.len(),
            ..ExtractionReport::default()
        };
        log::info!(
            "Threshold {threshold:.2}: {} anchors + {} content frames = {} candidates",
            anchors.len(),
            content.len(),
            anchors.len() + content.len()
        );
        let candidates = selection::merge_candidates(anchors, content);

        let candidates = if self.config.enable_deduplication {
            SimilarityDeduplicator::new(&self.config, &self.options).deduplicate(candidates, path)?
        } else {
            candidates
        };
        report.candidates_after_dedup = candidates.len();

        let selected = FinalBucketSelector::new(&self.config).select(candidates);
        report.selected = selected.len();

        let mut video = VideoFile::open(path)?;
        let keyframes =
            FrameRenderer::new(&self.config, &self.options).render(&mut video, &selected)?;
        report.rendered = keyframes.len();
        report.processing_time = started.elapsed();

        log::info!(
            "Extracted {} keyframes from {} in {:.2}s",
            keyframes.len(),
            path.display(),
            report.processing_time.as_secs_f64()
        );

        Ok(Extraction {
            metadata,
            keyframes,
            report,
        })
    }

    /// Extract keyframes, mapping every run-level failure to an empty list.
    ///
    /// An empty result means the video could not be processed (unopenable,
    /// corrupt, zero-length) or the run was cancelled; the cause is logged.
    pub fn extract<P: AsRef<Path>>(&self, path: P) -> Vec<Keyframe> {
        let path = path.as_ref();
        match self.try_extract(path) {
            Ok(extraction) => extraction.keyframes,
            Err(error) => {
                log::error!("Keyframe extraction failed for {}: {error}", path.display());
                Vec::new()
            }
        }
    }
}

/// Extract keyframes from `path` with `config`.
///
/// Returns an empty list when extraction fails; see
/// [`KeyframeExtractor::try_extract`] for the typed error.
pub fn extract_keyframes<P: AsRef<Path>>(path: P, config: &ExtractionConfig) -> Vec<Keyframe> {
    KeyframeExtractor::new(config.clone()).extract(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::CancellationToken;

    #[test]
    fn invalid_configuration_is_rejected_before_opening() {
        let extractor = KeyframeExtractor::new(ExtractionConfig::default().with_frame_gap(0));
        let result = extractor.try_extract("does_not_exist.mp4");
        assert!(matches!(result, Err(KeyframeError::InvalidConfiguration(_))));
    }

    #[test]
    fn cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel();
        let extractor = KeyframeExtractor::default()
            .with_options(ExtractOptions::new().with_cancellation(token));
        let result = extractor.try_extract("does_not_exist.mp4");
        assert!(matches!(result, Err(KeyframeError::Cancelled)));
    }

    #[test]
    fn missing_file_gives_an_empty_list() {
        assert!(extract_keyframes("does_not_exist.mp4", &ExtractionConfig::default()).is_empty());
    }
}
