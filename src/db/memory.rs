use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::{watch, RwLock};
use uuid::Uuid;

use super::pass_store::{PassSnapshot, PassStore, SnapshotPublisher, StoreError};
use crate::models::pass::{NewPass, Pass};

/// Process-local store, used when no database is configured and in tests.
/// The write lock serialises writers, so each change lands whole.
#[derive(Debug)]
pub struct MemoryPassStore {
    passes: RwLock<HashMap<String, Pass>>,
    publisher: SnapshotPublisher,
}

impl MemoryPassStore {
    pub fn new() -> Self {
        Self::with_passes(Vec::new())
    }

    pub fn with_passes(passes: Vec<Pass>) -> Self {
        let passes: HashMap<String, Pass> =
            passes.into_iter().map(|p| (p.id.clone(), p)).collect();

        Self {
            publisher: SnapshotPublisher::new(passes.clone()),
            passes: RwLock::new(passes),
        }
    }
}

impl Default for MemoryPassStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PassStore for MemoryPassStore {
    fn subscribe(&self) -> watch::Receiver<PassSnapshot> {
        self.publisher.subscribe()
    }

    async fn create(&self, pass: NewPass) -> Result<Pass, StoreError> {
        let pass = pass.into_pass(Uuid::new_v4().to_string());

        let mut passes = self.passes.write().await;
        passes.insert(pass.id.clone(), pass.clone());
        self.publisher.publish(passes.clone());

        Ok(pass)
    }

    async fn mark_returned(
        &self,
        id: &str,
        returned_at: DateTime<Utc>,
    ) -> Result<Option<Pass>, StoreError> {
        let mut passes = self.passes.write().await;

        let Some(current) = passes.get(id).cloned() else {
            return Ok(None);
        };

        if !current.is_active() {
            return Ok(Some(current));
        }

        let returned = current.mark_returned(returned_at);
        passes.insert(returned.id.clone(), returned.clone());
        self.publisher.publish(passes.clone());

        Ok(Some(returned))
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let mut passes = self.passes.write().await;

        if passes.remove(id).is_none() {
            return Ok(false);
        }

        self.publisher.publish(passes.clone());
        Ok(true)
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
