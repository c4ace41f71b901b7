//! Drain outstanding units before the scheduler returns.

use std::time::Duration;

use tokio::task::JoinSet;

use crate::state::BatchState;

use super::outcome::{BatchOutcome, UnitResult};

/// Waits for every unit in `units`. Without cancellation this is a plain drain.
/// Once the batch is cancelled the remaining units get `grace` to finish; after
/// that the state is halted, which makes fetchers abort, and the drain
/// continues until the set is empty.
pub(super) async fn quiesce(
    units: &mut JoinSet<UnitResult>,
    state: &BatchState,
    grace: Duration,
    outcome: &mut BatchOutcome,
) {
    loop {
        tokio::select! {
            biased;
            joined = units.join_next() => match joined {
                Some(joined) => outcome.record(joined),
                None => return,
            },
            _ = state.cancelled() => break,
        }
    }

    tracing::debug!(outstanding = units.len(), ?grace, "quiescing after cancellation");
    let deadline = tokio::time::sleep(grace);
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            joined = units.join_next() => match joined {
                Some(joined) => outcome.record(joined),
                None => return,
            },
            _ = &mut deadline => break,
        }
    }

    tracing::warn!(outstanding = units.len(), "quiesce deadline passed; halting transfers");
    state.halt();
    while let Some(joined) = units.join_next().await {
        outcome.record(joined);
    }
}
