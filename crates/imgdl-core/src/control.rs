//! Cancellation control: process signals, the Running → Cancelling → CleanedUp
//! state machine, and the exit guard.
//!
//! Signal handlers only call [`CancelController::trigger`]; the scheduler sees
//! the cancellation through [`BatchState`] and quiesces, and the caller then
//! runs [`CancelController::finish`] to clean up exactly once.

use std::fmt;
use std::future::Future;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;

use crate::cleanup::{self, CleanupReport};
use crate::config::BatchConfig;
use crate::state::SharedState;

/// What caused cancellation. Cleanup is identical for both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// User pressed Ctrl-C.
    Interrupt,
    /// Termination signal, or the batch exited abnormally.
    Terminate,
}

impl CancelReason {
    /// User-facing notice printed when cancellation starts.
    pub fn notice(self) -> &'static str {
        match self {
            CancelReason::Interrupt => "Download cancelled. Cleaning up...",
            CancelReason::Terminate => "Download interrupted. Cleaning up...",
        }
    }
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::Interrupt => write!(f, "interrupt"),
            CancelReason::Terminate => write!(f, "terminate"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Running,
    Cancelling(CancelReason),
    CleanedUp,
}

/// Owns the cancellation state machine for one batch.
#[derive(Debug)]
pub struct CancelController {
    state: SharedState,
    phase: Mutex<Phase>,
}

impl CancelController {
    pub fn new(state: SharedState) -> Self {
        Self {
            state,
            phase: Mutex::new(Phase::Running),
        }
    }

    pub fn shared(state: SharedState) -> Arc<Self> {
        Arc::new(Self::new(state))
    }

    fn lock(&self) -> MutexGuard<'_, Phase> {
        self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn phase(&self) -> Phase {
        *self.lock()
    }

    /// Start cancelling. Only the first call has an effect; it returns `true`.
    pub fn trigger(&self, reason: CancelReason) -> bool {
        let mut phase = self.lock();
        if *phase != Phase::Running {
            tracing::debug!(%reason, "repeated cancellation ignored");
            return false;
        }
        *phase = Phase::Cancelling(reason);
        self.state.cancel();
        tracing::info!(%reason, downloaded = self.state.downloaded(), "cancellation requested");
        true
    }

    /// Run cleanup if cancelling and move to `CleanedUp`. Returns `None` when the
    /// batch was not cancelled or cleanup already ran. Call after the scheduler
    /// has returned so no transfer can still commit.
    pub fn finish(&self, config: &BatchConfig) -> Option<CleanupReport> {
        let mut phase = self.lock();
        match *phase {
            Phase::Cancelling(_) => {
                let report = cleanup::cleanup(&self.state, config);
                *phase = Phase::CleanedUp;
                Some(report)
            }
            Phase::Running | Phase::CleanedUp => None,
        }
    }

    /// Wait for process signals and trigger cancellation on the first one.
    /// Keeps listening afterwards so later Ctrl-C presses stay suppressed
    /// instead of killing the process mid-cleanup. `on_cancel` runs once, for
    /// the signal that started cancellation.
    pub async fn listen<F>(self: Arc<Self>, on_cancel: F)
    where
        F: Fn(CancelReason) + Send + 'static,
    {
        self.listen_with(wait_for_signal, on_cancel).await
    }

    /// [`listen`](Self::listen) over an arbitrary signal source. Returns when
    /// the source fails.
    pub async fn listen_with<S, Fut, F>(self: Arc<Self>, mut next_signal: S, on_cancel: F)
    where
        S: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = io::Result<CancelReason>> + Send,
        F: Fn(CancelReason) + Send + 'static,
    {
        loop {
            match next_signal().await {
                Ok(reason) => {
                    if self.trigger(reason) {
                        on_cancel(reason);
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "signal listener stopped");
                    return;
                }
            }
        }
    }

    /// Stop `listener`, then [`finish`](Self::finish). Once the listener is
    /// gone no signal can move the batch to `Cancelling`, so a cancellation
    /// is always followed by cleanup. Installed handlers stay in place and
    /// keep suppressing the default signal behavior.
    pub async fn close(
        &self,
        listener: JoinHandle<()>,
        config: &BatchConfig,
    ) -> Option<CleanupReport> {
        listener.abort();
        if let Err(e) = listener.await {
            if e.is_panic() {
                tracing::error!(error = %e, "signal listener panicked");
            }
        }
        self.finish(config)
    }
}

/// Resolves on Ctrl-C (`Interrupt`) or, on Unix, SIGTERM/SIGHUP (`Terminate`).
/// Installing the Ctrl-C listener replaces the default terminate-on-interrupt
/// behavior for the rest of the process.
pub async fn wait_for_signal() -> std::io::Result<CancelReason> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = signal(SignalKind::terminate())?;
        let mut hup = signal(SignalKind::hangup())?;
        let reason = tokio::select! {
            res = tokio::signal::ctrl_c() => res.map(|()| CancelReason::Interrupt)?,
            _ = term.recv() => CancelReason::Terminate,
            _ = hup.recv() => CancelReason::Terminate,
        };
        return Ok(reason);
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        Ok(CancelReason::Interrupt)
    }
}

/// Armed for the duration of a batch. If dropped while still armed (an error
/// return or a panic unwinding past the batch), it cancels with
/// [`CancelReason::Terminate`], halts in-flight transfers, waits up to the
/// quiesce timeout for fetches on the blocking pool to settle and cleans up.
pub struct ExitGuard<'a> {
    controller: &'a CancelController,
    config: &'a BatchConfig,
    armed: bool,
}

impl<'a> ExitGuard<'a> {
    pub fn arm(controller: &'a CancelController, config: &'a BatchConfig) -> Self {
        Self {
            controller,
            config,
            armed: true,
        }
    }

    /// The batch returned normally; the caller handles cleanup.
    pub fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for ExitGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if self.controller.trigger(CancelReason::Terminate) {
            eprintln!("\n\n{}", CancelReason::Terminate.notice());
        }
        let state = &self.controller.state;
        state.halt();
        if !state.wait_fetches_idle(self.config.quiesce_timeout()) {
            tracing::warn!(
                running = state.fetches_running(),
                "fetches still running at cleanup"
            );
        }
        if let Some(report) = self.controller.finish(self.config) {
            tracing::warn!(
                removed = report.removed,
                errors = report.errors.len(),
                "cleaned up after abnormal exit"
            );
        }
    }
}
