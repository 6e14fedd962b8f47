//! Progress and cancellation integration tests.
//!
//! Tests that decode a real video require fixture files from
//! `tests/fixtures/generate_fixtures.sh`.

use std::path::Path;
use std::sync::{Arc, Mutex};

use image::{Rgb, RgbImage};

use keyframer::{
    CancellationToken, ExtractOptions, ExtractionConfig, FrameSignalAnalyzer, KeyframeError,
    KeyframeExtractor, OperationType, ProgressCallback, ProgressInfo, VideoMetadata,
};

fn sample_video_path() -> &'static str {
    "tests/fixtures/sample_video.mp4"
}

fn synthetic_frames(count: u64) -> impl Iterator<Item = Result<(u64, RgbImage), KeyframeError>> {
    (0..count).map(|index| {
        let value = (index * 9 % 256) as u8;
        Ok((index, RgbImage::from_pixel(24, 16, Rgb([value, 64, 200 - value / 2]))))
    })
}

struct RecordingProgress {
    infos: Mutex<Vec<ProgressInfo>>,
}

impl RecordingProgress {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            infos: Mutex::new(Vec::new()),
        })
    }
}

impl ProgressCallback for RecordingProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        self.infos.lock().unwrap().push(info.clone());
    }
}

/// Cancels its token on the first report it receives.
struct CancelOnFirstReport {
    token: CancellationToken,
}

impl ProgressCallback for CancelOnFirstReport {
    fn on_progress(&self, _info: &ProgressInfo) {
        self.token.cancel();
    }
}

// ── CancellationToken ──────────────────────────────────────────────

#[test]
fn cancellation_token_default_not_cancelled() {
    let token = CancellationToken::default();
    assert!(!token.is_cancelled());
}

#[test]
fn cancellation_token_clone_shares_state() {
    let token = CancellationToken::new();
    let clone = token.clone();
    assert!(!clone.is_cancelled());

    token.cancel();
    assert!(clone.is_cancelled());
}

// ── Analysis progress ──────────────────────────────────────────────

#[test]
fn analysis_reports_every_batch() {
    let recording = RecordingProgress::new();
    let config = ExtractionConfig::default();
    let options = ExtractOptions::new()
        .with_progress(recording.clone())
        .with_batch_size(5);
    let metadata = VideoMetadata::new(20, 10.0, 24, 16, "synthetic".to_string());

    let samples = FrameSignalAnalyzer::new(&config, &options)
        .analyze_frames(synthetic_frames(20), &metadata)
        .unwrap();
    assert_eq!(samples.len(), 4);

    let infos = recording.infos.lock().unwrap();
    assert_eq!(infos.len(), 5);
    assert!(
        infos
            .iter()
            .all(|info| info.operation == OperationType::FrameAnalysis)
    );
    assert_eq!(infos[0].current, 5);
    let last = infos.last().unwrap();
    assert_eq!(last.current, 20);
    assert_eq!(last.total, Some(20));
    assert_eq!(last.percentage, Some(100.0));
}

#[test]
fn cancellation_during_analysis_stops_the_run() {
    let token = CancellationToken::new();
    let config = ExtractionConfig::default();
    let options = ExtractOptions::new()
        .with_progress(Arc::new(CancelOnFirstReport {
            token: token.clone(),
        }))
        .with_cancellation(token)
        .with_batch_size(3);
    let metadata = VideoMetadata::new(50, 10.0, 24, 16, "synthetic".to_string());

    let result = FrameSignalAnalyzer::new(&config, &options)
        .analyze_frames(synthetic_frames(50), &metadata);
    assert!(matches!(result, Err(KeyframeError::Cancelled)));
}

// ── Full runs ──────────────────────────────────────────────────────

#[test]
fn cancelled_extraction_returns_error() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let token = CancellationToken::new();
    token.cancel();

    let extractor = KeyframeExtractor::new(ExtractionConfig::default())
        .with_options(ExtractOptions::new().with_cancellation(token));

    match extractor.try_extract(path) {
        Err(KeyframeError::Cancelled) => {}
        other => panic!("Expected Cancelled, got: {other:?}"),
    }
    assert!(extractor.extract(path).is_empty());
}

#[test]
fn extraction_reports_every_stage() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let recording = RecordingProgress::new();
    let extractor = KeyframeExtractor::new(ExtractionConfig::default())
        .with_options(ExtractOptions::new().with_progress(recording.clone()));
    let extraction = extractor.try_extract(path).expect("Extraction failed");
    assert!(!extraction.keyframes.is_empty());

    let infos = recording.infos.lock().unwrap();
    for operation in [
        OperationType::FrameAnalysis,
        OperationType::Deduplication,
        OperationType::Rendering,
    ] {
        assert!(
            infos.iter().any(|info| info.operation == operation),
            "no progress reported for {operation:?}"
        );
    }
}
