//! Parallel deduplication helpers (feature `rayon`).
//!
//! Candidate frames are decoded by several workers, each with its own
//! [`VideoFile`] so no decoder is shared between threads. Similarity scores
//! of one candidate against the accepted list are computed concurrently;
//! callers still apply the first-match rule over the scores in list order.

use std::path::Path;

use ::rayon::iter::{IntoParallelIterator, IntoParallelRefIterator, ParallelIterator};
use image::GrayImage;

use crate::{
    configuration::ExtractOptions,
    deduplicate::FrameCache,
    error::KeyframeError,
    imaging,
    progress::{OperationType, ProgressTracker},
    similarity,
    video_file::VideoFile,
};

/// Frames closer than this are decoded by the same worker.
const RUN_GAP_THRESHOLD: u64 = 30;

/// Decode the analysis-sized grayscale frames at `frame_indices`.
pub(crate) fn decode_analysis_frames(
    video_path: &Path,
    frame_indices: &[u64],
    maximum_dimension: u32,
    options: &ExtractOptions,
) -> Result<FrameCache, KeyframeError> {
    let mut sorted = frame_indices.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    let runs = split_into_runs(&sorted, RUN_GAP_THRESHOLD);

    let decoded: Result<Vec<Vec<(u64, GrayImage)>>, KeyframeError> = runs
        .into_par_iter()
        .map(|run| {
            options.check_cancelled()?;
            let mut video = VideoFile::open(video_path)?;
            let mut frames = Vec::with_capacity(run.len());
            video.read_frames(&run, Some(maximum_dimension), |index, image| {
                options.check_cancelled()?;
                frames.push((index, imaging::to_grayscale(&image)));
                Ok(())
            })?;
            Ok(frames)
        })
        .collect();

    let cache: FrameCache = decoded?.into_iter().flatten().collect();
    let mut tracker =
        ProgressTracker::new(options, OperationType::Deduplication, Some(sorted.len() as u64));
    tracker.advance_by(cache.len() as u64, None);
    tracker.finish();
    Ok(cache)
}

/// Similarity of `current` with each of `accepted`, in the same order.
pub(crate) fn similarity_scores(current: &GrayImage, accepted: &[&GrayImage]) -> Vec<f64> {
    accepted
        .par_iter()
        .map(|existing| similarity::frame_similarity(current, existing))
        .collect()
}

/// Split sorted frame indices into runs whose neighbours are at most
/// `gap_threshold` apart.
fn split_into_runs(frame_indices: &[u64], gap_threshold: u64) -> Vec<Vec<u64>> {
    let mut runs: Vec<Vec<u64>> = Vec::new();
    for &index in frame_indices {
        match runs.last_mut() {
            Some(run) if run.last().is_some_and(|&last| index - last <= gap_threshold) => {
                run.push(index);
            }
            _ => runs.push(vec![index]),
        }
    }
    runs
}
