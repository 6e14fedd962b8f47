//! Final count and spacing limits.

use crate::{
    configuration::ExtractionConfig,
    sample::{self, Candidate},
};

/// Trims the candidate set to at most `max_frames`, chronologically.
///
/// When there are more candidates than allowed, candidates within
/// `min_time_gap` of the first member of their group collapse to the
/// group's best scorer; if that is still too many, the best scorers win.
pub struct FinalBucketSelector<'a> {
    config: &'a ExtractionConfig,
}

impl<'a> FinalBucketSelector<'a> {
    pub fn new(config: &'a ExtractionConfig) -> Self {
        Self { config }
    }

    pub fn select(&self, mut candidates: Vec<Candidate>) -> Vec<Candidate> {
        sample::sort_by_timestamp(&mut candidates);
        if candidates.len() <= self.config.max_frames {
            log::info!("Final selection: keeping all {} candidates", candidates.len());
            return candidates;
        }

        let before = candidates.len();
        let mut bucketed: Vec<Candidate> = Vec::new();
        let mut remaining = candidates.into_iter().peekable();
        while let Some(first) = remaining.next() {
            let start = first.timestamp();
            let mut best = first;
            while let Some(next) =
                remaining.next_if(|next| next.timestamp() - start < self.config.min_time_gap)
            {
                // Strictly greater, so the earliest wins ties.
                if next.change_score() > best.change_score() {
                    best = next;
                }
            }
            bucketed.push(best);
        }

        if bucketed.len() > self.config.max_frames {
            sample::sort_by_score_descending(&mut bucketed);
            bucketed.truncate(self.config.max_frames);
            sample::sort_by_timestamp(&mut bucketed);
        }

        log::info!("Final selection: {before} candidates -> {}", bucketed.len());
        bucketed
    }
}
