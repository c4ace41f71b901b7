//! Shared mutable state of a running batch.
//!
//! The completed count, the completed indices and the `cancelled` flag live
//! behind one mutex. The cancellation token is triggered inside the same
//! critical section that flips `cancelled`, so awaiting the token and reading
//! the flag never disagree.
//!
//! `halt` is also raised under that lock, so a commit either lands before the
//! halt or sees it and is refused.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::progress::ProgressSink;

/// Shared handle to a batch state.
pub type SharedState = Arc<BatchState>;

#[derive(Debug, Default)]
struct Counters {
    downloaded: u32,
    completed: Vec<u32>,
    cancelled: bool,
}

#[derive(Debug, Default)]
pub struct BatchState {
    counters: Mutex<Counters>,
    cancel: CancellationToken,
    halt: AtomicBool,
    fetching: AtomicUsize,
}

/// Marks one fetch running on the blocking pool; released on drop.
#[derive(Debug)]
pub struct FetchGuard<'a>(&'a AtomicUsize);

impl Drop for FetchGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl BatchState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedState {
        Arc::new(Self::new())
    }

    // Poison is ignored: counters are updated before the sink runs.
    fn lock(&self) -> MutexGuard<'_, Counters> {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of successfully completed transfers.
    pub fn downloaded(&self) -> u32 {
        self.lock().downloaded
    }

    /// Indices of completed transfers, in completion order.
    pub fn completed(&self) -> Vec<u32> {
        self.lock().completed.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.lock().cancelled
    }

    /// Flip `cancelled` to true. Returns `false` if it was already set.
    pub fn cancel(&self) -> bool {
        let mut counters = self.lock();
        if counters.cancelled {
            return false;
        }
        counters.cancelled = true;
        self.cancel.cancel();
        true
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    /// Commit one successful transfer and notify `sink` with the new count
    /// while still holding the lock. Returns the new count, or `None` when the
    /// batch has been halted and nothing was recorded.
    pub fn record_success(&self, index: u32, total: u32, sink: &dyn ProgressSink) -> Option<u32> {
        let mut counters = self.lock();
        if self.is_halted() {
            return None;
        }
        counters.downloaded += 1;
        counters.completed.push(index);
        let current = counters.downloaded;
        sink.on_progress(current, total);
        Some(current)
    }

    /// Ask in-flight transfers to abort at their next I/O callback. No
    /// success is recorded after this returns.
    pub fn halt(&self) {
        let _counters = self.lock();
        self.halt.store(true, Ordering::SeqCst);
    }

    pub fn is_halted(&self) -> bool {
        self.halt.load(Ordering::SeqCst)
    }

    /// Flag handed to fetchers running on the blocking pool.
    pub fn halt_flag(&self) -> &AtomicBool {
        &self.halt
    }

    /// Count a fetch as running until the guard drops.
    pub fn enter_fetch(&self) -> FetchGuard<'_> {
        self.fetching.fetch_add(1, Ordering::SeqCst);
        FetchGuard(&self.fetching)
    }

    pub fn fetches_running(&self) -> usize {
        self.fetching.load(Ordering::SeqCst)
    }

    /// Block the calling thread until no fetch is running or `timeout`
    /// passes. Returns `true` if idle.
    pub fn wait_fetches_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.fetches_running() > 0 {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        true
    }
}
