//! Batch configuration.
//!
//! `BatchConfig` is the validated, immutable input of a batch run. `FileConfig`
//! is the optional `config.toml` (any subset of fields); CLI flags are layered
//! over it with [`FileConfig::merge`] and the prompt module fills whatever is
//! still missing.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::storage;

/// Save directory used when none is configured or the prompt answer is empty.
pub const DEFAULT_SAVE_PATH: &str = "./outputs";

/// Remote locator template. `{index}` and `{nonce}` are substituted per transfer.
pub const DEFAULT_URL_TEMPLATE: &str = "https://picsum.photos/200/300?random={nonce}";

const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_QUIESCE_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("count must be a positive integer")]
    ZeroCount,
    #[error("parallelism must be a positive integer")]
    ZeroParallelism,
    #[error("save path must not be empty")]
    EmptySavePath,
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("config directory lookup failed: {0}")]
    Xdg(#[from] xdg::BaseDirectoriesError),
    #[error("input closed before {0} was provided")]
    InputClosed(&'static str),
    #[error("console I/O failed: {0}")]
    Console(#[from] std::io::Error),
}

/// Where images come from and how long a single transfer may take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    pub url_template: String,
    pub timeout: Duration,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url_template: DEFAULT_URL_TEMPLATE.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Resolved parameters of one batch. Fields are private so the
/// `total_count >= 1`, `parallelism >= 1`, non-empty path invariants hold.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    total_count: u32,
    parallelism: usize,
    save_path: PathBuf,
    source: SourceConfig,
    quiesce_timeout: Duration,
}

impl BatchConfig {
    pub fn new(
        total_count: u32,
        parallelism: usize,
        save_path: impl Into<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let save_path = save_path.into();
        if total_count == 0 {
            return Err(ConfigError::ZeroCount);
        }
        if parallelism == 0 {
            return Err(ConfigError::ZeroParallelism);
        }
        if save_path.as_os_str().is_empty() {
            return Err(ConfigError::EmptySavePath);
        }
        Ok(Self {
            total_count,
            parallelism,
            save_path,
            source: SourceConfig::default(),
            quiesce_timeout: Duration::from_secs(DEFAULT_QUIESCE_TIMEOUT_SECS),
        })
    }

    pub fn with_source(mut self, source: SourceConfig) -> Self {
        self.source = source;
        self
    }

    /// How long in-flight transfers get to settle after cancellation before
    /// they are halted.
    pub fn with_quiesce_timeout(mut self, timeout: Duration) -> Self {
        self.quiesce_timeout = timeout;
        self
    }

    pub fn total_count(&self) -> u32 {
        self.total_count
    }

    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    pub fn save_path(&self) -> &Path {
        &self.save_path
    }

    pub fn source(&self) -> &SourceConfig {
        &self.source
    }

    pub fn quiesce_timeout(&self) -> Duration {
        self.quiesce_timeout
    }

    /// Destination of image `index` (`{save_path}/{index}.png`).
    pub fn image_path(&self, index: u32) -> PathBuf {
        storage::image_path(&self.save_path, index)
    }
}

/// Contents of `config.toml`. Every field is optional; missing batch fields are
/// prompted for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Number of images to download.
    pub count: Option<u32>,
    /// Maximum concurrent transfers.
    pub parallelism: Option<usize>,
    /// Directory the images are written to.
    pub save_path: Option<PathBuf>,
    /// Locator template; see [`DEFAULT_URL_TEMPLATE`].
    pub url_template: Option<String>,
    /// Per-transfer timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Grace period for in-flight transfers after cancellation, in seconds.
    pub quiesce_timeout_secs: Option<u64>,
}

impl FileConfig {
    /// Layer `overrides` on top of `self`; fields set in `overrides` win.
    pub fn merge(self, overrides: FileConfig) -> FileConfig {
        FileConfig {
            count: overrides.count.or(self.count),
            parallelism: overrides.parallelism.or(self.parallelism),
            save_path: overrides.save_path.or(self.save_path),
            url_template: overrides.url_template.or(self.url_template),
            timeout_secs: overrides.timeout_secs.or(self.timeout_secs),
            quiesce_timeout_secs: overrides.quiesce_timeout_secs.or(self.quiesce_timeout_secs),
        }
    }

    pub fn source(&self) -> SourceConfig {
        let defaults = SourceConfig::default();
        SourceConfig {
            url_template: self
                .url_template
                .clone()
                .unwrap_or(defaults.url_template),
            timeout: self
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        }
    }

    pub fn quiesce_timeout(&self) -> Duration {
        Duration::from_secs(
            self.quiesce_timeout_secs
                .unwrap_or(DEFAULT_QUIESCE_TIMEOUT_SECS),
        )
    }
}

/// `~/.config/imgdl/config.toml`, if it exists.
pub fn default_config_path() -> Result<Option<PathBuf>, ConfigError> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("imgdl")?;
    Ok(xdg_dirs.find_config_file("config.toml"))
}

pub fn load_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let data = fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ConfigError::NotFound(path.to_path_buf())
        } else {
            ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    toml::from_str(&data).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load the explicit config file if given (it must exist), else the XDG default
/// if present, else an empty config.
pub fn load(explicit: Option<&Path>) -> Result<FileConfig, ConfigError> {
    if let Some(path) = explicit {
        let cfg = load_file(path)?;
        tracing::debug!(path = %path.display(), "loaded config file");
        return Ok(cfg);
    }
    match default_config_path()? {
        Some(path) => {
            let cfg = load_file(&path)?;
            tracing::debug!(path = %path.display(), "loaded default config file");
            Ok(cfg)
        }
        None => Ok(FileConfig::default()),
    }
}
