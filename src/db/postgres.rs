use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgListener, FromRow, PgPool};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use super::pass_store::{PassSnapshot, PassStore, SnapshotPublisher, StoreError};
use crate::models::pass::{Destination, NewPass, Pass, PassStatus};

/// Channel the `passes` trigger notifies on every statement
pub const CHANGE_CHANNEL: &str = "passes_changed";

const LISTENER_RETRY_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, FromRow)]
struct PassRecord {
    id: String,
    student_name: String,
    teacher: String,
    destination: String,
    reason: Option<String>,
    created_at: DateTime<Utc>,
    returned_at: Option<DateTime<Utc>>,
    status: String,
    created_by: String,
}

impl TryFrom<PassRecord> for Pass {
    type Error = StoreError;

    fn try_from(record: PassRecord) -> Result<Self, Self::Error> {
        let status: PassStatus = record.status.parse().map_err(|reason| StoreError::Corrupt {
            id: record.id.clone(),
            reason,
        })?;

        let pass = Pass {
            id: record.id,
            student_name: record.student_name,
            teacher: record.teacher,
            destination: Destination::parse(&record.destination),
            reason: record.reason,
            created_at: record.created_at,
            returned_at: record.returned_at,
            status,
            created_by: record.created_by,
        };

        if !pass.is_consistent() {
            return Err(StoreError::Corrupt {
                id: pass.id,
                reason: "returned_at does not match status".to_string(),
            });
        }

        Ok(pass)
    }
}

/// Pass store backed by the `passes` table.
///
/// Every write reloads the table and publishes it. A background listener
/// does the same on `passes_changed`, which picks up writes made by other
/// server instances.
pub struct PgPassStore {
    pool: PgPool,
    publisher: SnapshotPublisher,
    // Held from load to publish so an older load never overwrites a newer one
    refresh_lock: Mutex<()>,
}

impl PgPassStore {
    pub async fn connect(pool: PgPool) -> Result<Arc<Self>, StoreError> {
        let passes = load_all(&pool).await?;
        tracing::info!(passes = passes.len(), "Loaded passes from database");

        Ok(Arc::new(Self {
            pool,
            publisher: SnapshotPublisher::new(passes),
            refresh_lock: Mutex::new(()),
        }))
    }

    async fn refresh(&self) -> Result<(), StoreError> {
        let _guard = self.refresh_lock.lock().await;
        let passes = load_all(&self.pool).await?;
        self.publisher.publish_if_changed(passes);
        Ok(())
    }

    /// The write is already committed; the listener catches up if this fails
    async fn refresh_after_write(&self) {
        if let Err(e) = self.refresh().await {
            tracing::warn!(error = %e, "Pass snapshot refresh failed after write");
        }
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Pass>, StoreError> {
        let record = sqlx::query_as::<_, PassRecord>(
            r#"
            SELECT * FROM passes WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        record.map(Pass::try_from).transpose()
    }

    /// Keeps the snapshot in sync with notifications from the database
    pub fn spawn_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let store = Arc::clone(self);

        tokio::spawn(async move {
            loop {
                if let Err(e) = store.listen().await {
                    tracing::warn!(error = %e, "Pass change listener failed, retrying");
                }
                tokio::time::sleep(LISTENER_RETRY_DELAY).await;
            }
        })
    }

    async fn listen(&self) -> Result<(), StoreError> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(CHANGE_CHANNEL).await?;
        tracing::info!(channel = CHANGE_CHANNEL, "Listening for pass changes");

        // Writes that landed while we were disconnected
        self.refresh().await?;

        loop {
            listener.recv().await?;
            self.refresh().await?;
        }
    }
}

async fn load_all(pool: &PgPool) -> Result<HashMap<String, Pass>, StoreError> {
    let records = sqlx::query_as::<_, PassRecord>(
        r#"
        SELECT * FROM passes ORDER BY created_at DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    records
        .into_iter()
        .map(|record| Pass::try_from(record).map(|pass| (pass.id.clone(), pass)))
        .collect()
}

#[async_trait]
impl PassStore for PgPassStore {
    fn subscribe(&self) -> watch::Receiver<PassSnapshot> {
        self.publisher.subscribe()
    }

    async fn create(&self, pass: NewPass) -> Result<Pass, StoreError> {
        let record = sqlx::query_as::<_, PassRecord>(
            r#"
            INSERT INTO passes
                (student_name, teacher, destination, reason, created_at, status, created_by)
            VALUES ($1, $2, $3, $4, $5, 'active', $6)
            RETURNING *
            "#,
        )
        .bind(&pass.student_name)
        .bind(&pass.teacher)
        .bind(pass.destination.as_str())
        .bind(&pass.reason)
        .bind(pass.created_at)
        .bind(&pass.created_by)
        .fetch_one(&self.pool)
        .await?;

        let pass = Pass::try_from(record)?;
        self.refresh_after_write().await;

        Ok(pass)
    }

    async fn mark_returned(
        &self,
        id: &str,
        returned_at: DateTime<Utc>,
    ) -> Result<Option<Pass>, StoreError> {
        // The status guard makes a second return a no-op in the database itself
        let updated = sqlx::query_as::<_, PassRecord>(
            r#"
            UPDATE passes
            SET status = 'returned', returned_at = $2
            WHERE id = $1 AND status = 'active'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(returned_at)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(record) => {
                let pass = Pass::try_from(record)?;
                self.refresh_after_write().await;
                Ok(Some(pass))
            }
            None => self.find_by_id(id).await,
        }
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM passes WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        self.refresh_after_write().await;
        Ok(true)
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
