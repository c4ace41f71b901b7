//! Logging init: file under XDG state dir, or graceful fallback to stderr.

use anyhow::Result;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,imgdl_core=debug,imgdl=debug";

/// Append-mode log file, shared by all events through one lock.
fn open_log(path: &Path) -> std::io::Result<Mutex<File>> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let file = fs::OpenOptions::new().create(true).append(true).open(path)?;
    Ok(Mutex::new(file))
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Path of the log file: `~/.local/state/imgdl/imgdl.log`.
pub fn log_file_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("imgdl")?;
    Ok(xdg_dirs.get_state_home().join("imgdl.log"))
}

/// Send structured logs to the XDG state log file. Console output (progress,
/// per-image errors) is unaffected. Errors if the file cannot be opened or a
/// subscriber is already installed; the caller falls back to stderr.
pub fn init_logging() -> Result<()> {
    let log_file_path = log_file_path()?;
    let writer = open_log(&log_file_path)?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("install subscriber: {}", e))?;

    tracing::info!("imgdl logging initialized at {}", log_file_path.display());

    Ok(())
}

/// Stderr-only logging for when the log file is unavailable.
pub fn init_logging_stderr() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();
}
