use std::sync::Arc;

use tokio::sync::RwLock;

use crate::Record;

/// Shared, append-only row storage.
///
/// Readers get the published sequence as a reference-counted vector, so a
/// snapshot is never copied and never changes after it has been handed out.
#[derive(Debug, Clone, Default)]
pub struct SnapshotStore {
    rows: Arc<RwLock<Arc<Vec<Record>>>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current contents. Empty until a build has published.
    pub async fn snapshot(&self) -> Arc<Vec<Record>> {
        let rows = self.rows.read().await;
        Arc::clone(&rows)
    }

    /// Appends `batch` in order under the exclusive lock.
    ///
    /// Snapshots taken earlier keep their contents: when readers still hold
    /// the previous vector it is copied before being extended.
    pub async fn append(&self, batch: Vec<Record>) {
        if batch.is_empty() {
            return;
        }
        let mut rows = self.rows.write().await;
        Arc::make_mut(&mut rows).extend(batch);
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
