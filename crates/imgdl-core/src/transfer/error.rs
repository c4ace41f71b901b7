//! Transfer error type.

use thiserror::Error;

/// Why a single image transfer failed. Transfers are never retried; the error
/// is logged with the image index and the batch moves on.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The expanded URL template is not a usable http(s) URL.
    #[error("invalid source URL {url}: {reason}")]
    InvalidSource { url: String, reason: String },
    /// Curl reported an error (timeout, connection, TLS, etc.).
    #[error("{0}")]
    Curl(#[from] curl::Error),
    /// HTTP response had a non-2xx status.
    #[error("HTTP {0}")]
    Http(u32),
    /// Disk write, sync or rename failed.
    #[error("storage: {0}")]
    Storage(#[from] std::io::Error),
    /// Aborted because the batch was halted after the quiesce deadline.
    #[error("transfer halted")]
    Halted,
    /// The blocking task running the transfer panicked or was cancelled.
    #[error("transfer task failed: {0}")]
    Task(String),
}
