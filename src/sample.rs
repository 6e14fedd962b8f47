//! Scored frame samples and selection candidates.

use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::Serialize;

/// Fixed position of a sample relative to the video duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeSegment {
    /// `[0, 0.2)` of the duration.
    Opening,
    /// `[0.2, 0.4)`.
    Early,
    /// `[0.4, 0.6)`.
    Middle,
    /// `[0.6, 0.8)`.
    Late,
    /// `[0.8, 1.0]`.
    Ending,
    /// Past the reported duration.
    Unknown,
}

impl TimeSegment {
    /// The five segments that take part in anchor selection, in time order.
    pub const ANCHORED: [TimeSegment; 5] = [
        TimeSegment::Opening,
        TimeSegment::Early,
        TimeSegment::Middle,
        TimeSegment::Late,
        TimeSegment::Ending,
    ];

    /// Segment containing `timestamp`. A zero duration places every sample
    /// in [`TimeSegment::Opening`].
    pub fn classify(timestamp: f64, duration: f64) -> Self {
        let ratio = if duration > 0.0 {
            timestamp / duration
        } else {
            0.0
        };
        match ratio {
            r if (0.0..0.2).contains(&r) => TimeSegment::Opening,
            r if (0.2..0.4).contains(&r) => TimeSegment::Early,
            r if (0.4..0.6).contains(&r) => TimeSegment::Middle,
            r if (0.6..0.8).contains(&r) => TimeSegment::Late,
            r if (0.8..=1.0).contains(&r) => TimeSegment::Ending,
            _ => TimeSegment::Unknown,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TimeSegment::Opening => "opening",
            TimeSegment::Early => "early",
            TimeSegment::Middle => "middle",
            TimeSegment::Late => "late",
            TimeSegment::Ending => "ending",
            TimeSegment::Unknown => "unknown",
        }
    }
}

impl Display for TimeSegment {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.name())
    }
}

/// One scored observation of a sampled frame.
///
/// `change_score` is the weighted sum of the four signal scores, each of
/// which compares this frame with the previously sampled one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameSample {
    pub frame_index: u64,
    /// Seconds, `frame_index / fps`.
    pub timestamp: f64,
    pub change_score: f64,
    pub scene_score: f64,
    pub motion_score: f64,
    pub color_score: f64,
    pub edge_score: f64,
    pub time_segment: TimeSegment,
}

impl FrameSample {
    /// The zero-score sample recorded for the first decoded frame, which
    /// has no predecessor to compare against.
    pub fn initial(frame_index: u64, timestamp: f64, duration: f64) -> Self {
        Self {
            frame_index,
            timestamp,
            change_score: 0.0,
            scene_score: 0.0,
            motion_score: 0.0,
            color_score: 0.0,
            edge_score: 0.0,
            time_segment: TimeSegment::classify(timestamp, duration),
        }
    }
}

/// Which selection stage promoted a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateSource {
    /// Best sample of a time segment.
    Anchor,
    /// High-score sample outside the anchors.
    Content,
}

/// A sample promoted to keyframe candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    #[serde(flatten)]
    pub sample: FrameSample,
    pub source: CandidateSource,
}

impl Candidate {
    pub fn new(sample: FrameSample, source: CandidateSource) -> Self {
        Self { sample, source }
    }

    #[inline]
    pub fn frame_index(&self) -> u64 {
        self.sample.frame_index
    }

    #[inline]
    pub fn timestamp(&self) -> f64 {
        self.sample.timestamp
    }

    #[inline]
    pub fn change_score(&self) -> f64 {
        self.sample.change_score
    }
}

/// Sort candidates chronologically. Stable, so equal timestamps keep their
/// relative order.
pub(crate) fn sort_by_timestamp(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| a.timestamp().total_cmp(&b.timestamp()));
}

/// Sort candidates by change score, highest first. Stable.
pub(crate) fn sort_by_score_descending(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| b.change_score().total_cmp(&a.change_score()));
}
