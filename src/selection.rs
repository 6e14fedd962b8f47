//! Candidate selection from the scored samples.
//!
//! - [`adaptive_threshold`] picks the "high change" bar from the score
//!   distribution of the video itself.
//! - [`select_time_anchors`] guarantees temporal coverage with the best
//!   sample of each fixed time segment.
//! - [`select_content_frames`] adds high-score samples away from the anchors,
//!   spaced at least `min_time_gap` apart.
//! - [`merge_candidates`] joins the two sets.

use crate::{
    configuration::ExtractionConfig,
    sample::{Candidate, CandidateSource, FrameSample, TimeSegment},
};

/// Threshold used when no sample has a positive change score.
pub const FALLBACK_THRESHOLD: f64 = 15.0;

/// Percentile of the positive scores used as the high-change threshold.
const THRESHOLD_PERCENTILE: f64 = 75.0;

/// Linear-interpolated percentile of `values` (sorted in place).
fn percentile(values: &mut [f64], percent: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let rank = percent / 100.0 * (values.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;
    Some(values[lower] + (values[upper] - values[lower]) * fraction)
}

/// The 75th percentile of all positive change scores, or
/// [`FALLBACK_THRESHOLD`] when there are none.
pub fn adaptive_threshold(samples: &[FrameSample]) -> f64 {
    let mut scores: Vec<f64> = samples
        .iter()
        .map(|sample| sample.change_score)
        .filter(|score| *score > 0.0)
        .collect();
    percentile(&mut scores, THRESHOLD_PERCENTILE).unwrap_or(FALLBACK_THRESHOLD)
}

/// The highest-scoring sample of every non-empty time segment, in segment
/// order. Ties go to the earliest sample.
pub fn select_time_anchors(samples: &[FrameSample]) -> Vec<Candidate> {
    TimeSegment::ANCHORED
        .iter()
        .filter_map(|segment| {
            samples
                .iter()
                .filter(|sample| sample.time_segment == *segment)
                .fold(None::<&FrameSample>, |best, sample| match best {
                    Some(current) if sample.change_score <= current.change_score => Some(current),
                    _ => Some(sample),
                })
                .map(|best| Candidate::new(best.clone(), CandidateSource::Anchor))
        })
        .collect()
}

/// High-change samples outside the anchors' neighbourhoods.
///
/// Samples within `min_time_gap` of an anchor, or scoring at or below
/// `threshold`, are dropped. The rest are ranked by score, cut to the
/// `content_frame_bar` fraction (rounded down), and accepted greedily in
/// rank order when at least `min_time_gap` away from every anchor and every
/// previously accepted sample.
pub fn select_content_frames(
    samples: &[FrameSample],
    anchors: &[Candidate],
    threshold: f64,
    config: &ExtractionConfig,
) -> Vec<Candidate> {
    let gap = config.min_time_gap;
    let near_anchor = |timestamp: f64| {
        anchors
            .iter()
            .any(|anchor| (timestamp - anchor.timestamp()).abs() < gap)
    };

    let mut ranked: Vec<&FrameSample> = samples
        .iter()
        .filter(|sample| !near_anchor(sample.timestamp) && sample.change_score > threshold)
        .collect();
    ranked.sort_by(|a, b| b.change_score.total_cmp(&a.change_score));

    let keep = ((ranked.len() as f64 * config.content_frame_bar).floor() as usize).min(ranked.len());
    ranked.truncate(keep);

    let mut selected: Vec<Candidate> = Vec::new();
    for sample in ranked {
        let spaced = selected
            .iter()
            .chain(anchors)
            .all(|other| (sample.timestamp - other.timestamp()).abs() >= gap);
        if spaced {
            selected.push(Candidate::new(sample.clone(), CandidateSource::Content));
        }
    }
    selected
}

/// Anchors followed by content frames. No deduplication happens here.
pub fn merge_candidates(anchors: Vec<Candidate>, content_frames: Vec<Candidate>) -> Vec<Candidate> {
    let mut merged = anchors;
    merged.extend(content_frames);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(frame_index: u64, fps: f64, duration: f64, score: f64) -> FrameSample {
        let timestamp = frame_index as f64 / fps;
        FrameSample {
            frame_index,
            timestamp,
            change_score: score,
            scene_score: 0.0,
            motion_score: 0.0,
            color_score: 0.0,
            edge_score: 0.0,
            time_segment: TimeSegment::classify(timestamp, duration),
        }
    }

    #[test]
    fn percentile_interpolates_like_numpy() {
        assert_eq!(percentile(&mut [1.0, 2.0, 3.0, 4.0], 75.0), Some(3.25));
        assert_eq!(percentile(&mut [5.0], 75.0), Some(5.0));
        assert_eq!(percentile(&mut [], 75.0), None);
        assert_eq!(percentile(&mut [10.0, 0.0, 20.0], 50.0), Some(10.0));
    }

    #[test]
    fn threshold_ignores_zero_scores() {
        let samples = vec![
            sample(0, 10.0, 1.0, 0.0),
            sample(1, 10.0, 1.0, 4.0),
            sample(2, 10.0, 1.0, 1.0),
            sample(3, 10.0, 1.0, 3.0),
            sample(4, 10.0, 1.0, 2.0),
        ];
        assert_eq!(adaptive_threshold(&samples), 3.25);
        assert_eq!(adaptive_threshold(&samples[..1]), FALLBACK_THRESHOLD);
        assert_eq!(adaptive_threshold(&[]), FALLBACK_THRESHOLD);
    }

    #[test]
    fn one_anchor_per_segment_first_wins_ties() {
        // 10 s at 1 fps: two samples per segment.
        let samples: Vec<FrameSample> = (0..10)
            .map(|i| sample(i, 1.0, 10.0, if i == 5 { 9.0 } else { 1.0 }))
            .collect();
        let anchors = select_time_anchors(&samples);
        let indices: Vec<u64> = anchors.iter().map(Candidate::frame_index).collect();
        assert_eq!(indices, vec![0, 2, 5, 6, 8]);
        assert!(anchors.iter().all(|a| a.source == CandidateSource::Anchor));
    }

    #[test]
    fn unknown_segment_is_never_an_anchor() {
        let samples = vec![sample(0, 1.0, 1.0, 0.0), sample(5, 1.0, 1.0, 50.0)];
        let anchors = select_time_anchors(&samples);
        assert_eq!(anchors.len(), 1);
        assert_eq!(anchors[0].frame_index(), 0);
    }

    #[test]
    fn content_frames_respect_threshold_bar_and_spacing() {
        let config = ExtractionConfig::default()
            .with_min_time_gap(1.0)
            .with_content_frame_bar(0.5);
        let samples = vec![
            sample(0, 10.0, 10.0, 0.0),
            sample(30, 10.0, 10.0, 50.0),
            sample(33, 10.0, 10.0, 60.0),
            sample(60, 10.0, 10.0, 40.0),
            sample(80, 10.0, 10.0, 45.0),
            sample(85, 10.0, 10.0, 5.0),
        ];
        let anchors = vec![Candidate::new(samples[0].clone(), CandidateSource::Anchor)];

        // Four samples exceed 20; half of them (the two best) survive the
        // bar, and 3.0 s sits within the gap of 3.3 s.
        let content = select_content_frames(&samples, &anchors, 20.0, &config);
        let indices: Vec<u64> = content.iter().map(Candidate::frame_index).collect();
        assert_eq!(indices, vec![33]);
        assert!(content.iter().all(|c| c.source == CandidateSource::Content));
    }

    #[test]
    fn samples_near_anchors_are_excluded() {
        let config = ExtractionConfig::default().with_min_time_gap(0.8).with_content_frame_bar(1.0);
        let samples = vec![sample(10, 10.0, 10.0, 30.0), sample(15, 10.0, 10.0, 90.0)];
        let anchors = vec![Candidate::new(samples[0].clone(), CandidateSource::Anchor)];
        assert!(select_content_frames(&samples, &anchors, 1.0, &config).is_empty());
    }

    #[test]
    fn empty_candidate_pool_is_handled() {
        let config = ExtractionConfig::default();
        let samples = vec![sample(0, 30.0, 1.0, 0.0)];
        assert!(select_content_frames(&samples, &[], FALLBACK_THRESHOLD, &config).is_empty());
        let merged = merge_candidates(select_time_anchors(&samples), Vec::new());
        assert_eq!(merged.len(), 1);
    }
}
