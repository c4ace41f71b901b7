//! Single-stream HTTP GET of one image into a `.part` file.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::config::SourceConfig;
use crate::storage;

use super::{source, Fetcher, TransferError};

/// Fetches images over libcurl according to a [`SourceConfig`].
#[derive(Debug, Clone)]
pub struct CurlFetcher {
    source: SourceConfig,
}

impl CurlFetcher {
    pub fn new(source: SourceConfig) -> Self {
        Self { source }
    }
}

impl Fetcher for CurlFetcher {
    fn fetch(&self, index: u32, dest: &Path, halt: &AtomicBool) -> Result<u64, TransferError> {
        let url = source::expand(&self.source.url_template, index)?;
        let temp = storage::temp_path(dest);
        let written = download_to(url.as_str(), &temp, self.source.timeout, halt)
            .and_then(|n| storage::finalize(&temp, dest).map(|()| n).map_err(Into::into));
        if written.is_err() {
            storage::discard(&temp);
        }
        written
    }
}

/// GET `url` and stream the body into `temp`. Returns the number of bytes written.
fn download_to(
    url: &str,
    temp: &Path,
    timeout: Duration,
    halt: &AtomicBool,
) -> Result<u64, TransferError> {
    let mut file = File::create(temp)?;
    let mut written = 0u64;
    let mut storage_error: Option<std::io::Error> = None;

    let mut easy = curl::easy::Easy::new();
    easy.url(url)?;
    easy.follow_location(true)?;
    easy.max_redirections(10)?;
    easy.connect_timeout(Duration::from_secs(30))?;
    // Abort stalled transfers: below 1 KiB/s for 30s.
    easy.low_speed_limit(1024)?;
    easy.low_speed_time(Duration::from_secs(30))?;
    easy.timeout(timeout)?;
    // Needed for the progress callback, which is how a halt reaches a quiet connection.
    easy.progress(true)?;

    let performed = {
        let mut transfer = easy.transfer();
        transfer.write_function(|data| {
            if halt.load(Ordering::Relaxed) {
                return Ok(0);
            }
            match file.write_all(data) {
                Ok(()) => {
                    written += data.len() as u64;
                    Ok(data.len())
                }
                Err(e) => {
                    storage_error = Some(e);
                    Ok(0) // abort transfer
                }
            }
        })?;
        transfer.progress_function(|_, _, _, _| !halt.load(Ordering::Relaxed))?;
        transfer.perform()
    };

    if let Err(e) = performed {
        if halt.load(Ordering::Relaxed) {
            return Err(TransferError::Halted);
        }
        if e.is_write_error() {
            if let Some(io_err) = storage_error.take() {
                return Err(TransferError::Storage(io_err));
            }
        }
        return Err(TransferError::Curl(e));
    }

    let code = easy.response_code()?;
    if !(200..300).contains(&code) {
        return Err(TransferError::Http(code));
    }

    file.sync_all()?;
    Ok(written)
}
