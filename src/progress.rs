//! Progress reporting and cancellation.
//!
//! Every decoding stage of a run reports through the [`ProgressCallback`]
//! attached to its [`ExtractOptions`], tagging each [`ProgressInfo`] with the
//! [`OperationType`] of the stage. A shared [`CancellationToken`] stops the
//! run at the next frame boundary.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use keyframer::{
//!     ExtractOptions, ExtractionConfig, KeyframeExtractor, OperationType, ProgressCallback,
//!     ProgressInfo,
//! };
//!
//! struct StageLogger;
//!
//! impl ProgressCallback for StageLogger {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         match (info.operation, info.percentage) {
//!             (OperationType::FrameAnalysis, Some(done)) => println!("analysis {done:.0}%"),
//!             (operation, _) => println!("{operation:?}: {} done", info.current),
//!         }
//!     }
//! }
//!
//! let options = ExtractOptions::new()
//!     .with_progress(Arc::new(StageLogger))
//!     .with_batch_size(25);
//! let extractor = KeyframeExtractor::new(ExtractionConfig::default()).with_options(options);
//! let keyframes = extractor.extract("input.mp4");
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::configuration::ExtractOptions;

/// Pipeline stage a progress report belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum OperationType {
    /// The single forward decode that scores sampled frames.
    FrameAnalysis,
    /// Decoding candidate frames for similarity comparison.
    Deduplication,
    /// Decoding, enhancing and encoding the selected frames.
    Rendering,
}

/// Point-in-time view of one stage's progress.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    pub operation: OperationType,
    /// Frames handled so far in this stage.
    pub current: u64,
    /// Frames the stage expects to handle. `None` when the container does
    /// not report a frame count.
    pub total: Option<u64>,
    /// `current / total` as a percentage, capped at 100.
    pub percentage: Option<f32>,
    /// Time since the stage started.
    pub elapsed: Duration,
    /// Linear extrapolation of the remaining time.
    pub estimated_remaining: Option<Duration>,
    /// Index of the frame that triggered this report, if any.
    pub current_frame: Option<u64>,
}

/// Receives progress reports.
///
/// Callbacks only observe; to stop a run, cancel its [`CancellationToken`].
/// They must be `Send + Sync` since a run can execute on a worker thread.
pub trait ProgressCallback: Send + Sync {
    fn on_progress(&self, info: &ProgressInfo);
}

/// Callback used when none is configured.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Shared flag for cooperative cancellation.
///
/// Clones observe the same flag. Once cancelled, a token stays cancelled.
///
/// ```
/// use keyframer::CancellationToken;
///
/// let token = CancellationToken::new();
/// let watcher = token.clone();
/// token.cancel();
/// assert!(watcher.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every run holding a clone of this token to stop.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Counts processed frames for one stage and reports every `batch_size`.
pub(crate) struct ProgressTracker {
    callback: Arc<dyn ProgressCallback>,
    operation: OperationType,
    total: Option<u64>,
    batch_size: u64,
    processed: u64,
    last_reported: u64,
    started: Instant,
}

impl ProgressTracker {
    pub(crate) fn new(
        options: &ExtractOptions,
        operation: OperationType,
        total: Option<u64>,
    ) -> Self {
        Self {
            callback: options.progress.clone(),
            operation,
            total,
            batch_size: options.batch_size.max(1),
            processed: 0,
            last_reported: 0,
            started: Instant::now(),
        }
    }

    pub(crate) fn advance(&mut self, frame_index: Option<u64>) {
        self.advance_by(1, frame_index);
    }

    pub(crate) fn advance_by(&mut self, count: u64, frame_index: Option<u64>) {
        self.processed += count;
        if self.processed - self.last_reported >= self.batch_size {
            self.emit(frame_index);
        }
    }

    /// Final report for the stage, sent even if nothing was processed.
    pub(crate) fn finish(&mut self) {
        self.emit(None);
    }

    fn emit(&mut self, frame_index: Option<u64>) {
        self.last_reported = self.processed;
        let elapsed = self.started.elapsed();
        let total = self.total;

        let percentage = total
            .filter(|&expected| expected > 0)
            .map(|expected| (self.processed as f32 * 100.0 / expected as f32).min(100.0));
        let estimated_remaining = match total {
            Some(expected) if self.processed > 0 => {
                let left = expected.saturating_sub(self.processed);
                Some(elapsed.mul_f64(left as f64 / self.processed as f64))
            }
            _ => None,
        };

        self.callback.on_progress(&ProgressInfo {
            operation: self.operation,
            current: self.processed,
            total,
            percentage,
            elapsed,
            estimated_remaining,
            current_frame: frame_index,
        });
    }
}
