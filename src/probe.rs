//! Lightweight video probing.
//!
//! [`VideoProbe`] reads a file's [`VideoMetadata`] and closes the demuxer
//! straight away. Use it to inspect files, or to check that a video can be
//! opened before committing to a full extraction.

use std::path::Path;

use crate::{error::KeyframeError, metadata::VideoMetadata, video_file::VideoFile};

/// Stateless probe for video metadata.
///
/// # Example
///
/// ```no_run
/// use keyframer::VideoProbe;
///
/// let metadata = VideoProbe::probe("input.mp4")?;
/// println!("{:.2}s, {}x{}", metadata.duration, metadata.width, metadata.height);
/// # Ok::<(), keyframer::KeyframeError>(())
/// ```
pub struct VideoProbe;

impl VideoProbe {
    /// Open `path`, read its metadata and close it.
    ///
    /// # Errors
    ///
    /// Returns [`KeyframeError::FileOpen`] if the file cannot be opened, or
    /// [`KeyframeError::NoVideoStream`] if it contains no video.
    pub fn probe<P: AsRef<Path>>(path: P) -> Result<VideoMetadata, KeyframeError> {
        let video = VideoFile::open(path)?;
        Ok(video.metadata().clone())
    }

    /// Probe several files. One failure does not stop the others.
    pub fn probe_many<P: AsRef<Path>>(paths: &[P]) -> Vec<Result<VideoMetadata, KeyframeError>> {
        paths.iter().map(Self::probe).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::VideoProbe;

    #[test]
    fn probe_many_reports_each_file() {
        let results = VideoProbe::probe_many(&["missing_a.mp4", "missing_b.mp4"]);
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(Result::is_err));
    }
}
