//! Configuration integration tests.

use keyframer::{ExtractOptions, ExtractionConfig, KeyframeError};

// ── Defaults ───────────────────────────────────────────────────────

#[test]
fn defaults_match_documented_values() {
    let config = ExtractionConfig::default();
    assert_eq!(config.max_frames, 12);
    assert_eq!(config.min_time_gap, 0.8);
    assert!(!config.enable_image_enhancement);
    assert_eq!(config.min_frames_after_dedup, 3);
    assert_eq!(config.frame_gap, 5);
    assert_eq!(config.motion_weight, 3.0);
    assert_eq!(config.scene_weight, 1.5);
    assert_eq!(config.color_weight, 0.5);
    assert_eq!(config.edge_weight, 2.0);
    assert_eq!(config.content_frame_bar, 0.5);
    assert!(config.enable_deduplication);
    assert_eq!(config.similarity_threshold, 0.95);
    assert_eq!(config.maximum_dimension, 480);
    assert!(config.validate().is_ok());
}

#[test]
fn new_equals_default() {
    assert_eq!(ExtractionConfig::new(), ExtractionConfig::default());
}

// ── Builders ───────────────────────────────────────────────────────

#[test]
fn builders_chain() {
    let config = ExtractionConfig::new()
        .with_max_frames(20)
        .with_min_time_gap(2.0)
        .with_image_enhancement(true)
        .with_min_frames_after_dedup(5)
        .with_frame_gap(3)
        .with_motion_weight(1.0)
        .with_scene_weight(2.0)
        .with_color_weight(3.0)
        .with_edge_weight(4.0)
        .with_content_frame_bar(0.25)
        .with_deduplication(false)
        .with_similarity_threshold(0.9)
        .with_maximum_dimension(320);

    assert_eq!(config.max_frames, 20);
    assert_eq!(config.min_time_gap, 2.0);
    assert!(config.enable_image_enhancement);
    assert_eq!(config.min_frames_after_dedup, 5);
    assert_eq!(config.frame_gap, 3);
    assert_eq!(config.motion_weight, 1.0);
    assert_eq!(config.scene_weight, 2.0);
    assert_eq!(config.color_weight, 3.0);
    assert_eq!(config.edge_weight, 4.0);
    assert_eq!(config.content_frame_bar, 0.25);
    assert!(!config.enable_deduplication);
    assert_eq!(config.similarity_threshold, 0.9);
    assert_eq!(config.maximum_dimension, 320);
}

// ── JSON ───────────────────────────────────────────────────────────

#[test]
fn partial_json_keeps_defaults() {
    let config = ExtractionConfig::from_json_str(r#"{"max_frames": 4, "enable_deduplication": false}"#)
        .unwrap();
    assert_eq!(config.max_frames, 4);
    assert!(!config.enable_deduplication);
    assert_eq!(config.frame_gap, 5);
}

#[test]
fn empty_json_object_is_default() {
    assert_eq!(
        ExtractionConfig::from_json_str("{}").unwrap(),
        ExtractionConfig::default()
    );
}

#[test]
fn unknown_keys_are_rejected() {
    let result = ExtractionConfig::from_json_str(r#"{"max_frame": 4}"#);
    assert!(matches!(result, Err(KeyframeError::ConfigurationParse(_))));
}

#[test]
fn json_round_trips_through_serde() {
    let config = ExtractionConfig::default().with_max_frames(7).with_min_time_gap(1.25);
    let json = serde_json::to_string(&config).unwrap();
    assert_eq!(ExtractionConfig::from_json_str(&json).unwrap(), config);
}

#[test]
fn json_file_is_loaded() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let path = temporary_directory.path().join("config.json");
    std::fs::write(&path, r#"{"similarity_threshold": 0.8}"#).expect("Failed to write config");

    let config = ExtractionConfig::from_json_file(&path).unwrap();
    assert_eq!(config.similarity_threshold, 0.8);
}

#[test]
fn missing_json_file_is_an_io_error() {
    let result = ExtractionConfig::from_json_file("no_such_config.json");
    assert!(matches!(result, Err(KeyframeError::IoError(_))));
}

// ── Validation ─────────────────────────────────────────────────────

#[test]
fn validation_rejects_unrunnable_settings() {
    let invalid = [
        ExtractionConfig::default().with_max_frames(0),
        ExtractionConfig::default().with_frame_gap(0),
        ExtractionConfig::default().with_maximum_dimension(0),
        ExtractionConfig::default().with_min_time_gap(-1.0),
        ExtractionConfig::default().with_min_time_gap(f64::NAN),
        ExtractionConfig::default().with_content_frame_bar(1.5),
        ExtractionConfig::default().with_similarity_threshold(f64::INFINITY),
        ExtractionConfig::default().with_edge_weight(f64::NAN),
    ];
    for config in invalid {
        assert!(
            matches!(config.validate(), Err(KeyframeError::InvalidConfiguration(_))),
            "expected {config:?} to be rejected"
        );
    }
}

#[test]
fn zero_gap_and_full_bar_are_valid() {
    let config = ExtractionConfig::default()
        .with_min_time_gap(0.0)
        .with_content_frame_bar(1.0);
    assert!(config.validate().is_ok());
}

// ── ExtractOptions ─────────────────────────────────────────────────

#[test]
fn options_debug_output() {
    let options = ExtractOptions::new().with_batch_size(0);
    let debug = format!("{options:?}");
    assert!(debug.contains("batch_size: 1"));
    assert!(debug.contains("has_cancellation: false"));
}
