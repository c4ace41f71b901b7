//! Run one batch: signal handling, scheduler, cleanup on cancellation, and the
//! console summary.

use anyhow::{Context, Result};
use imgdl_core::cleanup::CleanupReport;
use imgdl_core::config::BatchConfig;
use imgdl_core::control::{CancelController, CancelReason, ExitGuard};
use imgdl_core::progress::{ConsoleProgress, ProgressSink};
use imgdl_core::scheduler::{self, BatchOutcome};
use imgdl_core::state::BatchState;
use imgdl_core::transfer::CurlFetcher;
use std::sync::Arc;

pub async fn run_batch(config: &BatchConfig) -> Result<()> {
    std::fs::create_dir_all(config.save_path()).with_context(|| {
        format!(
            "create save directory {}",
            config.save_path().display()
        )
    })?;

    println!(
        "Downloading {} images ({} parallel downloads at most)\n",
        config.total_count(),
        config.parallelism()
    );

    let state = BatchState::shared();
    let controller = CancelController::shared(Arc::clone(&state));
    let listener = tokio::spawn(Arc::clone(&controller).listen(|reason: CancelReason| {
        eprintln!("\n\n{}", reason.notice());
    }));

    let fetcher = Arc::new(CurlFetcher::new(config.source().clone()));
    let sink: Arc<dyn ProgressSink> = Arc::new(ConsoleProgress::stdout());

    let guard = ExitGuard::arm(&controller, config);
    let outcome = scheduler::run(config, Arc::clone(&state), fetcher, sink).await;
    guard.disarm();

    match controller.close(listener, config).await {
        Some(report) => {
            for (path, err) in &report.errors {
                eprintln!("Could not remove {}: {}", path.display(), err);
            }
            println!("{}", cleanup_line(&report));
        }
        None => println!("\n{}", summary_line(config, &outcome)),
    }

    Ok(())
}

/// Final line after a normal (not cancelled) run.
pub(crate) fn summary_line(config: &BatchConfig, outcome: &BatchOutcome) -> String {
    let mut line = format!(
        "Download completed: {}/{} images saved to {}",
        outcome.succeeded,
        config.total_count(),
        config.save_path().display()
    );
    if outcome.failed > 0 {
        line.push_str(&format!(" ({} failed)", outcome.failed));
    }
    line
}

/// Final line after cancellation.
pub(crate) fn cleanup_line(report: &CleanupReport) -> String {
    if report.is_clean() {
        format!("Cleanup completed. Removed {} image(s).", report.removed)
    } else {
        format!(
            "Cleanup completed with {} error(s). Removed {} image(s).",
            report.errors.len(),
            report.removed
        )
    }
}
