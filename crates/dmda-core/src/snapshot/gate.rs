use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::{BuildCoordinator, BuildState, BuildSummary};
use crate::data_source::{SourceError, SourceErrorKind};
use crate::observability::LOG_TARGET;

/// Why a warmup call returned without a ready snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WarmupError {
    /// The build finished with an error. Every caller sees the same one.
    #[error("cache build failed: {0}")]
    Build(#[source] SourceError),
    /// The caller's token was cancelled while it waited.
    #[error("warmup cancelled")]
    Cancelled,
    #[error("warmup did not finish within {0:?}")]
    TimedOut(Duration),
}

impl WarmupError {
    pub fn is_cancellation(&self) -> bool {
        match self {
            Self::Cancelled | Self::TimedOut(_) => true,
            Self::Build(error) => error.kind() == SourceErrorKind::Cancelled,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Build(error) => error.code(),
            Self::Cancelled => "warmup.cancelled",
            Self::TimedOut(_) => "warmup.timed_out",
        }
    }
}

/// Entry point callers use to trigger the build and wait for it.
#[derive(Clone)]
pub struct WarmupGate {
    coordinator: Arc<BuildCoordinator>,
}

impl WarmupGate {
    pub fn new(coordinator: Arc<BuildCoordinator>) -> Self {
        Self { coordinator }
    }

    /// Starts the build if nobody has yet, then waits for its outcome.
    ///
    /// The build runs under a child of `cancel`, so cancelling the caller
    /// that started it also stops the fetch. Later callers join the running
    /// build and only stop waiting when their own token fires. A token that
    /// is already cancelled returns [`WarmupError::Cancelled`] without
    /// starting anything.
    pub async fn warmup(&self, cancel: CancellationToken) -> Result<BuildSummary, WarmupError> {
        if cancel.is_cancelled() {
            return Err(WarmupError::Cancelled);
        }

        if self.coordinator.start_build(cancel.child_token()) {
            tracing::debug!(target: LOG_TARGET, "warmup triggered build");
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(WarmupError::Cancelled),
            outcome = self.coordinator.wait() => outcome.map_err(WarmupError::Build),
        }
    }

    /// [`warmup`](Self::warmup) bounded by `timeout`.
    ///
    /// On expiry the token handed to the build is cancelled, so a build this
    /// call started does not keep running in the background.
    pub async fn warmup_within(&self, timeout: Duration) -> Result<BuildSummary, WarmupError> {
        let cancel = CancellationToken::new();
        match tokio::time::timeout(timeout, self.warmup(cancel.clone())).await {
            Ok(outcome) => outcome,
            Err(_) => {
                cancel.cancel();
                tracing::warn!(
                    target: LOG_TARGET,
                    timeout_ms = timeout.as_millis() as u64,
                    "warmup timed out"
                );
                Err(WarmupError::TimedOut(timeout))
            }
        }
    }

    /// Waits at most `timeout` for the build without ever cancelling it.
    ///
    /// If no build is running yet one is started under a token nobody holds,
    /// so an expired wait leaves the build to finish for later callers.
    pub async fn join_within(&self, timeout: Duration) -> Result<BuildSummary, WarmupError> {
        match tokio::time::timeout(timeout, self.warmup(CancellationToken::new())).await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::debug!(
                    target: LOG_TARGET,
                    timeout_ms = timeout.as_millis() as u64,
                    "warmup wait expired; build left running"
                );
                Err(WarmupError::TimedOut(timeout))
            }
        }
    }

    /// Starts the build under `cancel` without waiting for it.
    pub fn start_build(&self, cancel: CancellationToken) -> bool {
        self.coordinator.start_build(cancel)
    }

    pub fn status(&self) -> BuildState {
        self.coordinator.state()
    }
}
