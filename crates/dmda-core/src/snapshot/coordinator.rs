use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use super::{BuildPromise, BuildState, BuildSummary, SnapshotStore};
use crate::data_source::{DataSource, SourceError, SourceErrorKind};
use crate::observability::LOG_TARGET;
use crate::{QuerySpec, Record};

/// Runs the one build that populates a [`SnapshotStore`].
///
/// Rows are pulled into a private buffer and published with a single
/// [`SnapshotStore::append`] once the source reports end-of-sequence. A
/// failed or cancelled build publishes nothing, so the store stays empty.
pub struct BuildCoordinator {
    source: Arc<dyn DataSource>,
    query: Arc<QuerySpec>,
    store: SnapshotStore,
    promise: Arc<BuildPromise>,
    started: AtomicBool,
}

impl BuildCoordinator {
    pub fn new(source: Arc<dyn DataSource>, query: QuerySpec, store: SnapshotStore) -> Self {
        Self {
            source,
            query: Arc::new(query),
            store,
            promise: Arc::new(BuildPromise::new()),
            started: AtomicBool::new(false),
        }
    }

    /// Spawns the build task on the current Tokio runtime.
    ///
    /// Only the first call starts a build and returns `true`. Cancelling
    /// `cancel` stops the fetch at its next suspension point and records a
    /// [`SourceErrorKind::Cancelled`](crate::SourceErrorKind::Cancelled)
    /// failure.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn start_build(&self, cancel: CancellationToken) -> bool {
        if self
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        self.promise.mark_building();

        let source = Arc::clone(&self.source);
        let query = Arc::clone(&self.query);
        let store = self.store.clone();
        let promise = Arc::clone(&self.promise);

        tokio::spawn(async move {
            let started_at = Instant::now();
            tracing::info!(
                target: LOG_TARGET,
                source = source.id(),
                table = query.table(),
                "cache build started"
            );

            let fetch = tokio::spawn(fetch_all(source, query, cancel));
            let outcome = match fetch.await {
                Ok(outcome) => outcome,
                Err(error) => Err(SourceError::query_execution(format!(
                    "build task aborted: {error}"
                ))),
            };

            publish(&store, &promise, outcome, started_at).await;
        });

        true
    }

    pub fn state(&self) -> BuildState {
        self.promise.state()
    }

    /// Waits for the build outcome. Does not start a build.
    pub async fn wait(&self) -> Result<BuildSummary, SourceError> {
        self.promise.wait().await
    }
}

async fn fetch_all(
    source: Arc<dyn DataSource>,
    query: Arc<QuerySpec>,
    cancel: CancellationToken,
) -> Result<Vec<Record>, SourceError> {
    let mut cursor = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            return Err(SourceError::cancelled("build cancelled before the query returned"));
        }
        cursor = source.query(&query) => cursor?,
    };

    let mut rows = Vec::new();
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(SourceError::cancelled(format!(
                    "build cancelled after {} rows",
                    rows.len()
                )));
            }
            next = cursor.next_row() => next?,
        };

        match next {
            Some(record) => rows.push(record),
            None => return Ok(rows),
        }
    }
}

async fn publish(
    store: &SnapshotStore,
    promise: &BuildPromise,
    outcome: Result<Vec<Record>, SourceError>,
    started_at: Instant,
) {
    match outcome {
        Ok(rows) => {
            let summary = BuildSummary {
                rows: rows.len(),
                elapsed: started_at.elapsed(),
            };
            store.append(rows).await;
            promise.resolve(Ok(summary));
            tracing::info!(
                target: LOG_TARGET,
                rows = summary.rows,
                elapsed_ms = summary.elapsed.as_millis() as u64,
                "cache ready"
            );
        }
        Err(error) if error.kind() == SourceErrorKind::Cancelled => {
            tracing::info!(target: LOG_TARGET, error = %error, "cache build cancelled");
            promise.resolve(Err(error));
        }
        Err(error) => {
            tracing::error!(
                target: LOG_TARGET,
                code = error.code(),
                error = %error,
                "cache error"
            );
            promise.resolve(Err(error));
        }
    }
}
