//! FFmpeg console verbosity.
//!
//! FFmpeg writes its own diagnostics to stderr independently of the Rust
//! [`log`](https://crates.io/crates/log) facade used by this crate. Decoding
//! thousands of frames during analysis can make that output very noisy, so
//! [`set_ffmpeg_log_level`] lets callers tune it without depending on
//! `ffmpeg-next` directly.
//!
//! ```no_run
//! use keyframer::FfmpegLogLevel;
//!
//! keyframer::set_ffmpeg_log_level(FfmpegLogLevel::Error);
//! let level: FfmpegLogLevel = "warning".parse().unwrap();
//! keyframer::set_ffmpeg_log_level(level);
//! ```

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use ffmpeg_next::util::log::Level;

/// FFmpeg internal log verbosity, from silent to most verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FfmpegLogLevel {
    /// Print nothing.
    Quiet,
    /// Unrecoverable conditions that abort the process.
    Panic,
    /// Unrecoverable errors.
    Fatal,
    /// Recoverable errors.
    Error,
    /// Warnings (FFmpeg's default).
    Warning,
    /// Informational messages.
    Info,
    /// Verbose informational messages.
    Verbose,
    /// Debugging messages.
    Debug,
    /// Everything.
    Trace,
}

impl FfmpegLogLevel {
    const ALL: [(FfmpegLogLevel, &'static str, Level); 9] = [
        (FfmpegLogLevel::Quiet, "quiet", Level::Quiet),
        (FfmpegLogLevel::Panic, "panic", Level::Panic),
        (FfmpegLogLevel::Fatal, "fatal", Level::Fatal),
        (FfmpegLogLevel::Error, "error", Level::Error),
        (FfmpegLogLevel::Warning, "warning", Level::Warning),
        (FfmpegLogLevel::Info, "info", Level::Info),
        (FfmpegLogLevel::Verbose, "verbose", Level::Verbose),
        (FfmpegLogLevel::Debug, "debug", Level::Debug),
        (FfmpegLogLevel::Trace, "trace", Level::Trace),
    ];

    fn name(self) -> &'static str {
        Self::ALL
            .iter()
            .find(|(variant, _, _)| *variant == self)
            .map_or("warning", |(_, name, _)| name)
    }

    fn to_ffmpeg_level(self) -> Level {
        Self::ALL
            .iter()
            .find(|(variant, _, _)| *variant == self)
            .map_or(Level::Warning, |(_, _, level)| *level)
    }

    fn from_ffmpeg_level(level: Level) -> Option<Self> {
        Self::ALL
            .iter()
            .find(|(_, _, candidate)| *candidate == level)
            .map(|(variant, _, _)| *variant)
    }
}

impl Display for FfmpegLogLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.name())
    }
}

impl FromStr for FfmpegLogLevel {
    type Err = String;

    /// Parse a level name case-insensitively (`"warn"` is accepted for
    /// `"warning"`).
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let lowered = value.trim().to_ascii_lowercase();
        let lowered = if lowered == "warn" {
            "warning".to_string()
        } else {
            lowered
        };
        Self::ALL
            .iter()
            .find(|(_, name, _)| *name == lowered)
            .map(|(variant, _, _)| *variant)
            .ok_or_else(|| format!("unknown FFmpeg log level: {value}"))
    }
}

/// Set FFmpeg's stderr verbosity. Does not affect `log` crate output.
pub fn set_ffmpeg_log_level(level: FfmpegLogLevel) {
    ffmpeg_next::util::log::set_level(level.to_ffmpeg_level());
}

/// Current FFmpeg stderr verbosity, if it maps to a known level.
pub fn get_ffmpeg_log_level() -> Option<FfmpegLogLevel> {
    ffmpeg_next::util::log::get_level()
        .ok()
        .and_then(FfmpegLogLevel::from_ffmpeg_level)
}
