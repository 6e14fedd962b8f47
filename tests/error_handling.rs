//! Error handling integration tests.
//!
//! These tests verify that run-level failures surface as typed errors from
//! `try_extract` and as empty results from the infallible entry points.

use keyframer::{
    ExtractionConfig, KeyframeError, KeyframeExtractor, VideoFile, VideoProbe, extract_keyframes,
};

#[test]
fn open_nonexistent_file() {
    let result = VideoFile::open("this_file_does_not_exist.mp4");
    assert!(result.is_err());

    let error_message = result.unwrap_err().to_string();
    assert!(
        error_message.contains("Failed to open video file"),
        "Error message should mention file open failure: {error_message}",
    );
}

#[test]
fn open_invalid_file() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let invalid_file_path = temporary_directory.path().join("invalid.mp4");
    std::fs::write(&invalid_file_path, b"this is not a video file")
        .expect("Failed to write invalid file");

    let result = VideoFile::open(&invalid_file_path);
    assert!(result.is_err(), "Expected error for invalid video file");
}

#[test]
fn probe_nonexistent_file() {
    let result = VideoProbe::probe("this_file_does_not_exist.mp4");
    assert!(matches!(result, Err(KeyframeError::FileOpen { .. })));
}

#[test]
fn extraction_of_missing_file_is_empty() {
    let keyframes = extract_keyframes("this_file_does_not_exist.mp4", &ExtractionConfig::default());
    assert!(keyframes.is_empty());
}

#[test]
fn extraction_of_invalid_file_is_empty() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let invalid_file_path = temporary_directory.path().join("corrupt.mp4");
    std::fs::write(&invalid_file_path, vec![0_u8; 4096]).expect("Failed to write invalid file");

    let extractor = KeyframeExtractor::new(ExtractionConfig::default());
    assert!(extractor.try_extract(&invalid_file_path).is_err());
    assert!(extractor.extract(&invalid_file_path).is_empty());
}

#[test]
fn invalid_configuration_is_reported_before_decoding() {
    let extractor = KeyframeExtractor::new(ExtractionConfig::default().with_max_frames(0));
    let result = extractor.try_extract("this_file_does_not_exist.mp4");
    match result {
        Err(KeyframeError::InvalidConfiguration(message)) => {
            assert!(message.contains("max_frames"), "unexpected message: {message}");
        }
        other => panic!("Expected InvalidConfiguration, got: {other:?}"),
    }
}

#[test]
fn error_display_messages() {
    assert_eq!(KeyframeError::NoVideoStream.to_string(), "No video stream found in file");
    assert_eq!(KeyframeError::NoSamples.to_string(), "Frame analysis produced no samples");
    assert_eq!(KeyframeError::Cancelled.to_string(), "Operation cancelled");
}
