//! Removal of a cancelled batch's completed images.
//!
//! Only files the batch committed (as recorded in [`BatchState`]) are removed;
//! the save directory goes too if nothing else is left in it. Running cleanup a
//! second time finds nothing to do.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::BatchConfig;
use crate::state::BatchState;
use crate::storage;

/// What cleanup did.
#[derive(Debug, Default)]
pub struct CleanupReport {
    /// Images deleted.
    pub removed: u32,
    /// Tracked images that were already gone.
    pub missing: u32,
    /// Deletions that failed for another reason; cleanup continued past them.
    pub errors: Vec<(PathBuf, io::Error)>,
    /// Whether the save directory was removed.
    pub dir_removed: bool,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Delete every image `state` recorded as completed, then the save directory
/// if it is empty. Call only after the scheduler has quiesced.
pub fn cleanup(state: &BatchState, config: &BatchConfig) -> CleanupReport {
    let completed = state.completed();
    tracing::info!(
        tracked = completed.len(),
        save_path = %config.save_path().display(),
        "cleaning up downloaded images"
    );
    remove_images(config.save_path(), &completed)
}

/// Delete `{save_path}/{index}.png` for each index, then `save_path` if empty.
pub fn remove_images(save_path: &Path, indices: &[u32]) -> CleanupReport {
    let mut report = CleanupReport::default();
    for &index in indices {
        let path = storage::image_path(save_path, index);
        match fs::remove_file(&path) {
            Ok(()) => report.removed += 1,
            Err(e) if e.kind() == io::ErrorKind::NotFound => report.missing += 1,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "could not remove image");
                report.errors.push((path, e));
            }
        }
    }
    report.dir_removed = remove_dir_if_empty(save_path, &mut report);
    tracing::info!(
        removed = report.removed,
        missing = report.missing,
        errors = report.errors.len(),
        dir_removed = report.dir_removed,
        "cleanup completed"
    );
    report
}

fn remove_dir_if_empty(dir: &Path, report: &mut CleanupReport) -> bool {
    match fs::read_dir(dir) {
        Ok(mut entries) => {
            if entries.next().is_some() {
                tracing::debug!(path = %dir.display(), "save directory not empty; keeping it");
                return false;
            }
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => return false,
        Err(e) => {
            tracing::warn!(path = %dir.display(), error = %e, "could not list save directory");
            report.errors.push((dir.to_path_buf(), e));
            return false;
        }
    }
    match fs::remove_dir(dir) {
        Ok(()) => true,
        Err(e) if e.kind() == io::ErrorKind::NotFound => false,
        Err(e) => {
            tracing::warn!(path = %dir.display(), error = %e, "could not remove save directory");
            report.errors.push((dir.to_path_buf(), e));
            false
        }
    }
}
