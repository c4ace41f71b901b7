//! Admission loop.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::BatchConfig;
use crate::progress::ProgressSink;
use crate::state::SharedState;
use crate::transfer::{self, Fetcher};

use super::outcome::{BatchOutcome, UnitResult};
use super::quiesce::quiesce;

/// Runs the batch described by `config`. A semaphore of `parallelism` permits
/// bounds the outstanding units; a permit is held by its unit until the unit
/// has committed (or reported) its result. Cancellation is observed before
/// every admission and wins over a free permit.
pub async fn run<F: Fetcher>(
    config: &BatchConfig,
    state: SharedState,
    fetcher: Arc<F>,
    sink: Arc<dyn ProgressSink>,
) -> BatchOutcome {
    let total = config.total_count();
    // Outstanding units never exceed `total`, and tokio caps permits.
    let width = config
        .parallelism()
        .min(total as usize)
        .min(Semaphore::MAX_PERMITS);
    let permits = Arc::new(Semaphore::new(width));
    let mut units: JoinSet<UnitResult> = JoinSet::new();
    let mut outcome = BatchOutcome::default();

    tracing::info!(
        total,
        parallelism = config.parallelism(),
        save_path = %config.save_path().display(),
        "batch started"
    );

    for index in 1..=total {
        let permit = tokio::select! {
            biased;
            _ = state.cancelled() => break,
            permit = Arc::clone(&permits).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };
        if state.is_cancelled() {
            break;
        }

        let save_path = config.save_path().to_path_buf();
        let fetcher = Arc::clone(&fetcher);
        let state = Arc::clone(&state);
        let sink = Arc::clone(&sink);
        units.spawn(async move {
            let _permit = permit;
            let res = transfer::download(index, total, &save_path, fetcher, state, sink).await;
            (index, res)
        });
        outcome.admitted += 1;

        while let Some(joined) = units.try_join_next() {
            outcome.record(joined);
        }
    }

    if outcome.admitted < total {
        tracing::info!(admitted = outcome.admitted, total, "admission stopped by cancellation");
    }

    quiesce(&mut units, &state, config.quiesce_timeout(), &mut outcome).await;
    outcome.cancelled = state.is_cancelled();

    tracing::info!(
        succeeded = outcome.succeeded,
        failed = outcome.failed,
        cancelled = outcome.cancelled,
        "batch finished"
    );
    outcome
}
