//! Similarity-based removal of redundant candidates.
//!
//! Candidates are walked in chronological order against an accepted list.
//! The first accepted frame whose structural similarity with the current
//! one exceeds the threshold decides its fate: the higher change score
//! stays. Replacing moves the newcomer to the end of the accepted list, so
//! later comparisons see the same order on every run. After the walk, the
//! result is topped up from the rejected candidates (best score first) to
//! the configured floor.

use std::{
    collections::{HashMap, HashSet},
    path::Path,
    time::{Duration, Instant},
};

use image::GrayImage;

use crate::{
    configuration::{ExtractOptions, ExtractionConfig},
    error::KeyframeError,
    sample::{self, Candidate},
};
#[cfg(not(feature = "rayon"))]
use crate::{
    imaging,
    progress::{OperationType, ProgressTracker},
    similarity,
    video_file::VideoFile,
};

/// Analysis-sized grayscale frames keyed by frame index.
pub type FrameCache = HashMap<u64, GrayImage>;

/// Minimum wall time between "still deduplicating" log lines.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Removes visually redundant candidates.
pub struct SimilarityDeduplicator<'a> {
    config: &'a ExtractionConfig,
    options: &'a ExtractOptions,
}

impl<'a> SimilarityDeduplicator<'a> {
    pub fn new(config: &'a ExtractionConfig, options: &'a ExtractOptions) -> Self {
        Self { config, options }
    }

    /// Decode every candidate from `video_path` and deduplicate them.
    ///
    /// One or zero candidates, or a video that cannot be reopened, are
    /// returned unchanged apart from chronological ordering.
    ///
    /// # Errors
    ///
    /// Returns [`KeyframeError::Cancelled`] if the run is cancelled.
    pub fn deduplicate(
        &self,
        mut candidates: Vec<Candidate>,
        video_path: &Path,
    ) -> Result<Vec<Candidate>, KeyframeError> {
        if candidates.len() <= 1 {
            return Ok(candidates);
        }
        log::info!("Starting deduplication of {} candidates", candidates.len());
        sample::sort_by_timestamp(&mut candidates);

        let indices: Vec<u64> = candidates.iter().map(Candidate::frame_index).collect();
        let cache = match self.load_frames(video_path, &indices) {
            Ok(cache) => cache,
            Err(KeyframeError::Cancelled) => return Err(KeyframeError::Cancelled),
            Err(error) => {
                log::warn!("Cannot reopen video for similarity checks, skipping: {error}");
                return Ok(candidates);
            }
        };

        self.deduplicate_frames(candidates, &cache)
    }

    #[cfg(not(feature = "rayon"))]
    fn load_frames(&self, video_path: &Path, indices: &[u64]) -> Result<FrameCache, KeyframeError> {
        self.options.check_cancelled()?;
        let mut video = VideoFile::open(video_path)?;
        let mut tracker = ProgressTracker::new(
            self.options,
            OperationType::Deduplication,
            Some(indices.len() as u64),
        );
        let mut cache = FrameCache::with_capacity(indices.len());
        video.read_frames(indices, Some(self.config.maximum_dimension), |index, image| {
            self.options.check_cancelled()?;
            cache.insert(index, imaging::to_grayscale(&image));
            tracker.advance(Some(index));
            Ok(())
        })?;
        tracker.finish();
        Ok(cache)
    }

    #[cfg(feature = "rayon")]
    fn load_frames(&self, video_path: &Path, indices: &[u64]) -> Result<FrameCache, KeyframeError> {
        self.options.check_cancelled()?;
        crate::parallel::decode_analysis_frames(
            video_path,
            indices,
            self.config.maximum_dimension,
            self.options,
        )
    }

    /// Deduplicate candidates whose frames are already decoded.
    ///
    /// Candidates missing from `frames` never enter the accepted list but
    /// stay eligible for the floor top-up.
    ///
    /// # Errors
    ///
    /// Returns [`KeyframeError::Cancelled`] if the run is cancelled.
    pub fn deduplicate_frames(
        &self,
        mut candidates: Vec<Candidate>,
        frames: &FrameCache,
    ) -> Result<Vec<Candidate>, KeyframeError> {
        if candidates.len() <= 1 {
            return Ok(candidates);
        }
        sample::sort_by_timestamp(&mut candidates);

        // Positions into `candidates`, in accepted-list order.
        let mut accepted: Vec<usize> = Vec::with_capacity(candidates.len());
        let (mut replaced, mut removed) = (0_usize, 0_usize);
        let mut last_heartbeat = Instant::now();

        for (position, candidate) in candidates.iter().enumerate() {
            self.options.check_cancelled()?;

            let Some(current) = frames.get(&candidate.frame_index()) else {
                log::debug!("Skipping uncached frame {}", candidate.frame_index());
                continue;
            };

            let (owners, accepted_frames): (Vec<usize>, Vec<&GrayImage>) = accepted
                .iter()
                .filter_map(|&other| {
                    frames
                        .get(&candidates[other].frame_index())
                        .map(|frame| (other, frame))
                })
                .unzip();

            match self.first_similar(current, &accepted_frames) {
                Some(slot) => {
                    let existing = owners[slot];
                    if candidate.change_score() > candidates[existing].change_score() {
                        log::debug!(
                            "Replacing frame: t={:.2}s -> t={:.2}s",
                            candidates[existing].timestamp(),
                            candidate.timestamp()
                        );
                        accepted.retain(|&other| other != existing);
                        accepted.push(position);
                        replaced += 1;
                    } else {
                        log::debug!("Removing similar frame: t={:.2}s", candidate.timestamp());
                        removed += 1;
                    }
                }
                None => accepted.push(position),
            }

            if last_heartbeat.elapsed() > HEARTBEAT_INTERVAL {
                log::info!("Deduplication in progress ({}/{})", position + 1, candidates.len());
                last_heartbeat = Instant::now();
            }
        }

        let floor = self.config.min_frames_after_dedup;
        if accepted.len() < floor {
            let taken: HashSet<usize> = accepted.iter().copied().collect();
            let mut pool: Vec<usize> = (0..candidates.len())
                .filter(|position| !taken.contains(position))
                .collect();
            pool.sort_by(|&a, &b| {
                candidates[b]
                    .change_score()
                    .total_cmp(&candidates[a].change_score())
            });
            let needed = floor - accepted.len();
            let added = pool.len().min(needed);
            accepted.extend(pool.into_iter().take(needed));
            log::info!(
                "Backfilled {added} frames to keep at least {floor}, total {}",
                accepted.len()
            );
        }

        let mut kept: Vec<Option<Candidate>> = candidates.into_iter().map(Some).collect();
        let mut result: Vec<Candidate> = accepted
            .into_iter()
            .filter_map(|position| kept[position].take())
            .collect();
        sample::sort_by_timestamp(&mut result);

        log::info!(
            "Deduplication complete: {} kept, {replaced} replaced, {removed} removed",
            result.len()
        );
        Ok(result)
    }

    /// Slot of the first accepted frame more similar than the threshold.
    #[cfg(not(feature = "rayon"))]
    fn first_similar(&self, current: &GrayImage, accepted: &[&GrayImage]) -> Option<usize> {
        accepted.iter().position(|existing| {
            similarity::frame_similarity(current, existing) > self.config.similarity_threshold
        })
    }

    /// Slot of the first accepted frame more similar than the threshold.
    /// All scores are computed concurrently; the earliest match still wins.
    #[cfg(feature = "rayon")]
    fn first_similar(&self, current: &GrayImage, accepted: &[&GrayImage]) -> Option<usize> {
        crate::parallel::similarity_scores(current, accepted)
            .into_iter()
            .position(|score| score > self.config.similarity_threshold)
    }
}
