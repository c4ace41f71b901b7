//! CLI for the imgdl batch image downloader.

mod batch;

use anyhow::{Context, Result};
use clap::Parser;
use imgdl_core::config::{self, FileConfig};
use imgdl_core::prompt;
use std::path::PathBuf;

pub use batch::run_batch;

/// Download a batch of images with a bounded number of parallel transfers.
///
/// Values not given as flags are taken from the config file, and anything
/// still missing is asked for interactively. Ctrl-C stops the batch and
/// removes the images it already saved.
#[derive(Debug, Parser)]
#[command(name = "imgdl")]
#[command(about = "imgdl: bounded-parallel batch image downloader", long_about = None)]
pub struct Cli {
    /// Number of images to download.
    #[arg(short = 'n', long, value_name = "N")]
    pub count: Option<u32>,

    /// Maximum number of parallel downloads.
    #[arg(short = 'p', long, value_name = "N")]
    pub parallelism: Option<usize>,

    /// Directory the images are saved to (default: ./outputs).
    #[arg(short = 'o', long, value_name = "DIR")]
    pub save_path: Option<PathBuf>,

    /// Config file (default: ~/.config/imgdl/config.toml when it exists).
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Image URL template; `{index}` and `{nonce}` are substituted per image.
    #[arg(long, value_name = "URL")]
    pub url_template: Option<String>,

    /// Per-image transfer timeout in seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout_secs: Option<u64>,
}

impl Cli {
    /// Flag values as a config layer that takes precedence over the file.
    pub fn overrides(&self) -> FileConfig {
        FileConfig {
            count: self.count,
            parallelism: self.parallelism,
            save_path: self.save_path.clone(),
            url_template: self.url_template.clone(),
            timeout_secs: self.timeout_secs,
            quiesce_timeout_secs: None,
        }
    }

    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let file_cfg = config::load(cli.config.as_deref()).context("load config")?;
        tracing::debug!("loaded config: {:?}", file_cfg);
        let merged = file_cfg.merge(cli.overrides());

        let batch_cfg = {
            let stdin = std::io::stdin();
            let mut input = stdin.lock();
            let mut output = std::io::stdout();
            prompt::resolve(&merged, &mut input, &mut output).context("resolve batch settings")?
        };
        tracing::debug!("resolved batch: {:?}", batch_cfg);

        run_batch(&batch_cfg).await
    }
}
