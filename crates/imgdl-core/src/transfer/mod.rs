//! Transfer unit: download one indexed image to `{save_path}/{index}.png`.
//!
//! The actual fetch is blocking (libcurl) and runs on the tokio blocking pool so
//! it never stalls the scheduler's admission loop. Success is committed to the
//! shared [`BatchState`] only after the file has its final name.

mod error;
mod http;
pub mod source;

use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::progress::ProgressSink;
use crate::state::{BatchState, SharedState};
use crate::storage;

pub use error::TransferError;
pub use http::CurlFetcher;

/// Fetches one image to `dest`. Implementations must return promptly with
/// [`TransferError::Halted`] once `halt` is set, and must not leave a file at
/// `dest` unless they return `Ok`.
pub trait Fetcher: Send + Sync + 'static {
    /// Returns the number of bytes written.
    fn fetch(&self, index: u32, dest: &Path, halt: &AtomicBool) -> Result<u64, TransferError>;
}

/// Runs one transfer unit. On success the completed count is incremented and
/// `sink` notified atomically; on failure the error is logged and reported to
/// `sink`, and nothing is counted. Never retries.
///
/// The commit happens on the blocking thread right after the fetch, so a file
/// that reached its final name is counted even if this future is dropped.
pub async fn download<F: Fetcher>(
    index: u32,
    total: u32,
    save_path: &Path,
    fetcher: Arc<F>,
    state: SharedState,
    sink: Arc<dyn ProgressSink>,
) -> Result<u64, TransferError> {
    let dest = storage::image_path(save_path, index);
    let blocking_state = Arc::clone(&state);
    let blocking_sink = Arc::clone(&sink);
    let fetched = tokio::task::spawn_blocking(move || {
        fetch_one(
            fetcher.as_ref(),
            index,
            total,
            &dest,
            &blocking_state,
            blocking_sink.as_ref(),
        )
    })
    .await
    .map_err(|e| TransferError::Task(e.to_string()))
    .and_then(|res| res);

    match fetched {
        Ok((bytes, current)) => {
            tracing::debug!(index, bytes, current, total, "image saved");
            Ok(bytes)
        }
        Err(e) => {
            tracing::warn!(index, error = %e, "error downloading image");
            sink.on_failure(index, &e);
            Err(e)
        }
    }
}

fn fetch_one<F: Fetcher + ?Sized>(
    fetcher: &F,
    index: u32,
    total: u32,
    dest: &Path,
    state: &BatchState,
    sink: &dyn ProgressSink,
) -> Result<(u64, u32), TransferError> {
    let _fetch = state.enter_fetch();
    if state.is_halted() {
        return Err(TransferError::Halted);
    }
    let bytes = fetcher.fetch(index, dest, state.halt_flag())?;
    match state.record_success(index, total, sink) {
        Some(current) => Ok((bytes, current)),
        None => {
            // Halted between the rename and the commit.
            storage::discard(dest);
            Err(TransferError::Halted)
        }
    }
}
