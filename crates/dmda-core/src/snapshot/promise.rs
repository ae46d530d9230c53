use std::time::Duration;

use tokio::sync::watch;

use crate::SourceError;

/// Successful build result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildSummary {
    pub rows: usize,
    pub elapsed: Duration,
}

/// Lifecycle of the single build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildState {
    Idle,
    Building,
    Ready(BuildSummary),
    Failed(SourceError),
}

impl BuildState {
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready(_) | Self::Failed(_))
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Building => "building",
            Self::Ready(_) => "ready",
            Self::Failed(_) => "failed",
        }
    }
}

/// Single-assignment cell holding the build outcome.
///
/// The outcome is stored, not sent, so it can be observed by any number of
/// waiters, including ones that arrive after it was set. Once terminal the
/// state never changes again.
#[derive(Debug)]
pub struct BuildPromise {
    state: watch::Sender<BuildState>,
}

impl BuildPromise {
    pub fn new() -> Self {
        let (state, _) = watch::channel(BuildState::Idle);
        Self { state }
    }

    /// Moves `Idle` to `Building`. Returns `false` in any other state.
    pub fn mark_building(&self) -> bool {
        self.state.send_if_modified(|state| {
            if matches!(state, BuildState::Idle) {
                *state = BuildState::Building;
                true
            } else {
                false
            }
        })
    }

    /// Records the outcome. Only the first call has any effect.
    pub fn resolve(&self, outcome: Result<BuildSummary, SourceError>) -> bool {
        self.state.send_if_modified(|state| {
            if state.is_terminal() {
                return false;
            }
            *state = match outcome {
                Ok(summary) => BuildState::Ready(summary),
                Err(error) => BuildState::Failed(error),
            };
            true
        })
    }

    pub fn state(&self) -> BuildState {
        self.state.borrow().clone()
    }

    /// Waits until the outcome is recorded.
    pub async fn wait(&self) -> Result<BuildSummary, SourceError> {
        let mut receiver = self.state.subscribe();
        let state = match receiver.wait_for(BuildState::is_terminal).await {
            Ok(state) => state.clone(),
            // The sender lives in `self`, so it cannot close while we borrow it.
            Err(_) => return Err(SourceError::cancelled("build promise closed")),
        };

        match state {
            BuildState::Ready(summary) => Ok(summary),
            BuildState::Failed(error) => Err(error),
            BuildState::Idle | BuildState::Building => {
                Err(SourceError::cancelled("build promise closed"))
            }
        }
    }
}

impl Default for BuildPromise {
    fn default() -> Self {
        Self::new()
    }
}
