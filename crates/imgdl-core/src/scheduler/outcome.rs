//! Summary of one scheduler run.

use tokio::task::JoinError;

use crate::transfer::TransferError;

/// Result of one joined unit task: the image index and the transfer result.
pub(super) type UnitResult = (u32, Result<u64, TransferError>);

/// Counts reported when [`run`](super::run) returns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Units started.
    pub admitted: u32,
    /// Units whose image was saved and counted.
    pub succeeded: u32,
    /// Units that failed, were halted, or whose task panicked.
    pub failed: u32,
    /// Whether admission stopped because of cancellation.
    pub cancelled: bool,
}

impl BatchOutcome {
    /// True if every requested image was saved.
    pub fn is_complete(&self, total: u32) -> bool {
        !self.cancelled && self.succeeded == total
    }

    pub(super) fn record(&mut self, joined: Result<UnitResult, JoinError>) {
        match joined {
            Ok((_, Ok(_))) => self.succeeded += 1,
            // Already logged and reported by the unit itself.
            Ok((_, Err(_))) => self.failed += 1,
            Err(e) => {
                tracing::error!(error = %e, "transfer unit task failed");
                self.failed += 1;
            }
        }
    }
}
