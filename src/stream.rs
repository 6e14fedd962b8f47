//! Async extraction.
//!
//! [`KeyframeFuture`] runs a whole extraction on a Tokio blocking thread so
//! that CPU-heavy decoding never stalls the async runtime. The blocking task
//! opens its own decoder handles.
//!
//! # Example
//!
//! ```no_run
//! use keyframer::{ExtractOptions, ExtractionConfig, KeyframeError, extract_keyframes_async};
//!
//! # async fn example() -> Result<(), KeyframeError> {
//! let extraction = extract_keyframes_async(
//!     "input.mp4",
//!     ExtractionConfig::default(),
//!     ExtractOptions::new(),
//! )
//! .await?;
//! println!("Got {} keyframes", extraction.keyframes.len());
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::task::JoinHandle;

use crate::configuration::{ExtractOptions, ExtractionConfig};
use crate::error::KeyframeError;
use crate::keyframe::Extraction;
use crate::pipeline::KeyframeExtractor;

/// A future that resolves to the result of one extraction run.
///
/// Dropping the future does not stop the blocking task; use a
/// [`CancellationToken`](crate::CancellationToken) in the options for that.
pub struct KeyframeFuture {
    handle: JoinHandle<Result<Extraction, KeyframeError>>,
}

impl Future for KeyframeFuture {
    type Output = Result<Extraction, KeyframeError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.handle)
            .poll(cx)
            .map(|result| result.unwrap_or_else(|_| Err(KeyframeError::Cancelled)))
    }
}

/// Start an extraction of `path` on a blocking thread.
///
/// Must be called from within a Tokio runtime.
pub fn extract_keyframes_async<P: AsRef<Path>>(
    path: P,
    config: ExtractionConfig,
    options: ExtractOptions,
) -> KeyframeFuture {
    let path: PathBuf = path.as_ref().to_path_buf();
    let handle = tokio::task::spawn_blocking(move || {
        KeyframeExtractor::new(config)
            .with_options(options)
            .try_extract(&path)
    });

    KeyframeFuture { handle }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_resolves_to_error() {
        let result = extract_keyframes_async(
            "does_not_exist.mp4",
            ExtractionConfig::default(),
            ExtractOptions::new(),
        )
        .await;
        assert!(matches!(result, Err(KeyframeError::FileOpen { .. })));
    }
}
