//! # keyframer
//!
//! Select a small, representative set of keyframes from a video.
//!
//! `keyframer` decodes a video once, scores every sampled frame by how much
//! it differs from its predecessor, and picks a chronologically ordered set
//! of frames that covers the whole timeline while favouring moments of high
//! visual change. Decoding is powered by FFmpeg via the
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) crate. Image work
//! builds on [`image`], with [`imageproc`] for edges and filtering and
//! [`image_compare`] for structural similarity.
//!
//! ## Quick Start
//!
//! ### Extract Keyframes
//!
//! ```no_run
//! use keyframer::{ExtractionConfig, extract_keyframes};
//!
//! let keyframes = extract_keyframes("input.mp4", &ExtractionConfig::default());
//! for keyframe in &keyframes {
//!     std::fs::write(keyframe.file_name(), &keyframe.payload.bytes).unwrap();
//! }
//! ```
//!
//! ### Typed Errors and Metrics
//!
//! ```no_run
//! use keyframer::{ExtractionConfig, KeyframeExtractor};
//!
//! let config = ExtractionConfig::default()
//!     .with_max_frames(8)
//!     .with_image_enhancement(true);
//! let extraction = KeyframeExtractor::new(config).try_extract("input.mp4")?;
//! println!(
//!     "{} keyframes at {:?} in {:.2}s",
//!     extraction.keyframes.len(),
//!     extraction.timestamps(),
//!     extraction.report.processing_time.as_secs_f64()
//! );
//! # Ok::<(), keyframer::KeyframeError>(())
//! ```
//!
//! ### Progress and Cancellation
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use keyframer::{
//!     CancellationToken, ExtractOptions, ExtractionConfig, KeyframeExtractor, ProgressCallback,
//!     ProgressInfo,
//! };
//!
//! struct Printer;
//!
//! impl ProgressCallback for Printer {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!("{:?}: {}", info.operation, info.current);
//!     }
//! }
//!
//! let token = CancellationToken::new();
//! let options = ExtractOptions::new()
//!     .with_progress(Arc::new(Printer))
//!     .with_cancellation(token.clone())
//!     .with_batch_size(50);
//! let extractor = KeyframeExtractor::new(ExtractionConfig::default()).with_options(options);
//! let keyframes = extractor.extract("input.mp4");
//! ```
//!
//! ## Pipeline
//!
//! - **Probe**: frame count, frame rate, dimensions, duration
//! - **Analyse**: motion, scene, colour and edge change per sampled frame,
//!   fused into one weighted change score
//! - **Threshold**: the 75th percentile of the video's own positive scores
//! - **Anchors**: the best frame of each of five fixed time segments
//! - **Content frames**: high-change frames away from the anchors
//! - **Deduplicate**: drop near-identical frames by structural similarity
//! - **Bucket**: enforce the frame cap and minimum spacing
//! - **Render**: re-read at full resolution, optionally enhance, encode as
//!   JPEG
//!
//! ### Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `async` | `extract_keyframes_async` runs a whole extraction on a Tokio blocking thread |
//! | `rayon` | Parallel candidate decoding and similarity scoring during deduplication |
//! | `full` | Enables all of the above |
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system.

pub mod analyzer;
pub mod bucket;
pub mod configuration;
mod conversion;
pub mod deduplicate;
pub mod edges;
pub mod enhance;
pub mod error;
pub mod ffmpeg;
mod frame_reader;
pub mod histogram;
pub mod imaging;
pub mod keyframe;
pub mod metadata;
pub mod optical_flow;
#[cfg(feature = "rayon")]
mod parallel;
pub mod pipeline;
pub mod probe;
pub mod progress;
pub mod render;
pub mod sample;
pub mod selection;
pub mod similarity;
#[cfg(feature = "async")]
pub mod stream;
pub mod video_file;

pub use analyzer::{FrameSignalAnalyzer, SignalScores};
pub use bucket::FinalBucketSelector;
pub use configuration::{ExtractOptions, ExtractionConfig};
pub use deduplicate::{FrameCache, SimilarityDeduplicator};
pub use enhance::{ClarityReport, enhance_frame};
pub use error::KeyframeError;
pub use ffmpeg::{FfmpegLogLevel, get_ffmpeg_log_level, set_ffmpeg_log_level};
pub use frame_reader::SequentialFrames;
pub use keyframe::{Extraction, ExtractionReport, Keyframe};
pub use metadata::VideoMetadata;
pub use pipeline::{KeyframeExtractor, extract_keyframes};
pub use probe::VideoProbe;
pub use progress::{CancellationToken, OperationType, ProgressCallback, ProgressInfo};
pub use render::{FrameRenderer, ImageFormat, ImagePayload, JPEG_QUALITY};
pub use sample::{Candidate, CandidateSource, FrameSample, TimeSegment};
pub use selection::{
    FALLBACK_THRESHOLD, adaptive_threshold, merge_candidates, select_content_frames,
    select_time_anchors,
};
#[cfg(feature = "async")]
pub use stream::{KeyframeFuture, extract_keyframes_async};
pub use video_file::VideoFile;
