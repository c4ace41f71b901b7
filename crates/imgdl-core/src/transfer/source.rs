//! Expands the locator template into the URL for one image.

use url::Url;
use uuid::Uuid;

use super::TransferError;

/// Substitute `{index}` and `{nonce}` in `template` and check the result is an
/// http(s) URL. Every call yields a fresh nonce.
pub fn expand(template: &str, index: u32) -> Result<Url, TransferError> {
    let raw = template
        .replace("{index}", &index.to_string())
        .replace("{nonce}", &Uuid::new_v4().simple().to_string());
    let url = Url::parse(&raw).map_err(|e| TransferError::InvalidSource {
        url: raw.clone(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(TransferError::InvalidSource {
            url: raw,
            reason: format!("unsupported scheme {other}"),
        }),
    }
}
