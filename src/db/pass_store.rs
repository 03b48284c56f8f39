use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;

use crate::models::pass::{NewPass, Pass};

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt pass record {id}: {reason}")]
    Corrupt { id: String, reason: String },
}

/// Full state of the store at one point in time.
///
/// Stores publish a fresh snapshot after every applied change; readers
/// recompute their views from it rather than patching local state.
#[derive(Debug, Clone, Default)]
pub struct PassSnapshot {
    pub version: u64,
    passes: Arc<HashMap<String, Pass>>,
}

impl PassSnapshot {
    pub fn new(version: u64, passes: HashMap<String, Pass>) -> Self {
        Self {
            version,
            passes: Arc::new(passes),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Pass> {
        self.passes.get(id)
    }

    pub fn passes(&self) -> impl Iterator<Item = &Pass> {
        self.passes.values()
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.passes.values().filter(|p| p.is_active()).count()
    }
}

/// Live pass storage. Writes are applied atomically by the backend and
/// become visible to readers through the next snapshot.
#[async_trait]
pub trait PassStore: Send + Sync {
    /// Receiver that always holds the latest snapshot
    fn subscribe(&self) -> watch::Receiver<PassSnapshot>;

    fn snapshot(&self) -> PassSnapshot {
        let rx = self.subscribe();
        let snapshot = rx.borrow().clone();
        snapshot
    }

    /// Stores a validated pass under a freshly generated id
    async fn create(&self, pass: NewPass) -> Result<Pass, StoreError>;

    /// Applies the active → returned transition. Already-returned passes are
    /// left alone and returned as stored. `None` when the id is unknown.
    async fn mark_returned(
        &self,
        id: &str,
        returned_at: DateTime<Utc>,
    ) -> Result<Option<Pass>, StoreError>;

    /// Removes a pass for good; `false` when there was nothing to delete
    async fn delete(&self, id: &str) -> Result<bool, StoreError>;

    /// Backend name for health output
    fn backend(&self) -> &'static str;

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Publishes snapshots with a monotonically increasing version
#[derive(Debug)]
pub(crate) struct SnapshotPublisher {
    tx: watch::Sender<PassSnapshot>,
}

impl SnapshotPublisher {
    pub(crate) fn new(initial: HashMap<String, Pass>) -> Self {
        let (tx, _rx) = watch::channel(PassSnapshot::new(0, initial));
        Self { tx }
    }

    pub(crate) fn publish(&self, passes: HashMap<String, Pass>) -> u64 {
        let version = self.tx.borrow().version + 1;
        self.tx.send_replace(PassSnapshot::new(version, passes));
        tracing::debug!(version, "Published pass snapshot");
        version
    }

    /// Skips the publish when nothing differs from the current snapshot,
    /// e.g. a notification for a write this instance already published.
    pub(crate) fn publish_if_changed(&self, passes: HashMap<String, Pass>) -> Option<u64> {
        if *self.tx.borrow().passes == passes {
            return None;
        }
        Some(self.publish(passes))
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<PassSnapshot> {
        self.tx.subscribe()
    }
}
