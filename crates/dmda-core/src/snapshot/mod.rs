//! # Snapshot Cache
//!
//! | Type | Role |
//! |------|------|
//! | [`SnapshotStore`] | Append-only rows behind a reader/writer lock |
//! | [`BuildPromise`] | Single-assignment build outcome, observable by any number of waiters |
//! | [`BuildCoordinator`] | Runs the one build and publishes its rows |
//! | [`WarmupGate`] | Triggers the build and waits for it, honoring caller cancellation |
//! | [`SnapshotCache`] | Wires the above to one source and query |
//!
//! Reads never wait for a build. Until a build publishes, [`SnapshotCache::snapshot`]
//! returns an empty sequence.

mod coordinator;
mod gate;
mod promise;
mod store;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

pub use coordinator::BuildCoordinator;
pub use gate::{WarmupError, WarmupGate};
pub use promise::{BuildPromise, BuildState, BuildSummary};
pub use store::SnapshotStore;

use crate::{DataSource, QuerySpec, Record};

/// Process-wide cache of one query's result.
#[derive(Clone)]
pub struct SnapshotCache {
    store: SnapshotStore,
    gate: WarmupGate,
}

impl SnapshotCache {
    pub fn new(source: Arc<dyn DataSource>, query: QuerySpec) -> Self {
        let store = SnapshotStore::new();
        let coordinator = BuildCoordinator::new(source, query, store.clone());
        Self {
            store,
            gate: WarmupGate::new(Arc::new(coordinator)),
        }
    }

    /// Current contents. Never blocks on a running build.
    pub async fn snapshot(&self) -> Arc<Vec<Record>> {
        self.store.snapshot().await
    }

    pub async fn warmup(&self, cancel: CancellationToken) -> Result<BuildSummary, WarmupError> {
        self.gate.warmup(cancel).await
    }

    pub async fn warmup_within(&self, timeout: Duration) -> Result<BuildSummary, WarmupError> {
        self.gate.warmup_within(timeout).await
    }

    /// Bounded wait for `/warmup`-style callers. Expiry never cancels the build.
    pub async fn join_within(&self, timeout: Duration) -> Result<BuildSummary, WarmupError> {
        self.gate.join_within(timeout).await
    }

    /// Starts the build under `cancel` and returns immediately.
    pub fn start_build(&self, cancel: CancellationToken) -> bool {
        self.gate.start_build(cancel)
    }

    pub fn status(&self) -> BuildState {
        self.gate.status()
    }
}
