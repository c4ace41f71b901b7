//! On-disk layout of a batch and the file lifecycle of one image.
//!
//! Images are written to `{index}.png.part` and renamed to `{index}.png` only
//! once the transfer succeeded, so a file with the final name is always
//! complete.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Temporary file suffix used before the rename.
pub const TEMP_SUFFIX: &str = ".part";

/// `{save_path}/{index}.png`.
pub fn image_path(save_path: &Path, index: u32) -> PathBuf {
    save_path.join(format!("{index}.png"))
}

/// Path for the temp file: appends `.part` to the final path (e.g. `3.png` → `3.png.part`).
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

/// Atomically rename the finished temp file to its final name.
pub fn finalize(temp_path: &Path, final_path: &Path) -> io::Result<()> {
    fs::rename(temp_path, final_path)
}

/// Best-effort removal of a file left behind by a failed or refused transfer.
pub fn discard(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "removed uncommitted file"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "could not remove uncommitted file")
        }
    }
}
