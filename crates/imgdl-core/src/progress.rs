//! Progress reporting for a batch.
//!
//! `on_progress` is only ever invoked from [`BatchState::record_success`]
//! while the state lock is held, so calls are serialized and `current` is
//! strictly increasing.
//!
//! [`BatchState::record_success`]: crate::state::BatchState::record_success

use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

use crate::transfer::TransferError;

/// Receives aggregate progress after every successful transfer.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, current: u32, total: u32);

    /// Called once per failed transfer. Not serialized with `on_progress`.
    fn on_failure(&self, _index: u32, _error: &TransferError) {}
}

impl<F> ProgressSink for F
where
    F: Fn(u32, u32) + Send + Sync,
{
    fn on_progress(&self, current: u32, total: u32) {
        self(current, total)
    }
}

/// Single-line console renderer: each update overwrites the previous one.
pub struct ConsoleProgress<W: Write + Send> {
    out: Mutex<W>,
}

impl ConsoleProgress<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> ConsoleProgress<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn render(&self, line: std::fmt::Arguments<'_>) {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = out.write_fmt(line).and_then(|()| out.flush()) {
            tracing::debug!(error = %e, "progress render failed");
        }
    }
}

impl<W: Write + Send> ProgressSink for ConsoleProgress<W> {
    fn on_progress(&self, current: u32, total: u32) {
        self.render(format_args!("\rProgress: {current}/{total}"));
    }

    fn on_failure(&self, index: u32, error: &TransferError) {
        self.render(format_args!("\nError downloading image {index}: {error}\n"));
    }
}
