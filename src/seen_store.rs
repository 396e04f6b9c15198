use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::retry::{with_retries, RetryPolicy};
use crate::types::{Result, ScoutError, SeenRecord};

/// Durable record of postings already processed; the only shared mutable
/// state in the system. The conditional write is what makes processing
/// exactly-once-per-posting, even under accidental overlapping runs.
#[async_trait]
pub trait SeenStore: Send + Sync {
    /// Point lookup; read-after-write consistent within a run.
    async fn has_seen(&self, posting_id: &str) -> Result<bool>;

    /// Create-if-absent. Returns whether this call created the record;
    /// an earlier or concurrent writer wins on `first_seen_at`.
    async fn mark_seen(&self, record: &SeenRecord) -> Result<bool>;
}

pub struct PgSeenStore {
    pool: PgPool,
    retry: RetryPolicy,
}

impl PgSeenStore {
    pub async fn connect(database_url: &str, retry: RetryPolicy) -> Result<Self> {
        let pool = PgPool::connect(database_url).await.map_err(store_err)?;
        Ok(Self { pool, retry })
    }

    pub async fn setup_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS seen_postings (
                posting_id TEXT PRIMARY KEY,
                first_seen_at TIMESTAMP WITH TIME ZONE NOT NULL,
                last_notified_at TIMESTAMP WITH TIME ZONE
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }
}

fn store_err(err: sqlx::Error) -> ScoutError {
    ScoutError::StoreUnavailable(err.to_string())
}

#[async_trait]
impl SeenStore for PgSeenStore {
    async fn has_seen(&self, posting_id: &str) -> Result<bool> {
        with_retries(&self.retry, "seen lookup", || async move {
            let row = sqlx::query("SELECT 1 FROM seen_postings WHERE posting_id = $1")
                .bind(posting_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(store_err)?;
            Ok(row.is_some())
        })
        .await
    }

    async fn mark_seen(&self, record: &SeenRecord) -> Result<bool> {
        // Idempotent, so retrying a lost acknowledgment is harmless.
        with_retries(&self.retry, "seen write", || async move {
            let result = sqlx::query(
                r#"
                INSERT INTO seen_postings (posting_id, first_seen_at, last_notified_at)
                VALUES ($1, $2, $3)
                ON CONFLICT (posting_id) DO NOTHING
                "#,
            )
            .bind(&record.posting_id)
            .bind(record.first_seen_at)
            .bind(record.last_notified_at)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
            Ok(result.rows_affected() > 0)
        })
        .await
    }
}

/// In-memory store with the same first-write-wins semantics. Used by the
/// test suite in place of a live database.
#[derive(Default)]
pub struct MemorySeenStore {
    records: RwLock<HashMap<String, SeenRecord>>,
}

impl MemorySeenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, posting_id: &str) -> Option<SeenRecord> {
        self.records.read().await.get(posting_id).cloned()
    }

    pub async fn count(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl SeenStore for MemorySeenStore {
    async fn has_seen(&self, posting_id: &str) -> Result<bool> {
        Ok(self.records.read().await.contains_key(posting_id))
    }

    async fn mark_seen(&self, record: &SeenRecord) -> Result<bool> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.posting_id) {
            return Ok(false);
        }
        records.insert(record.posting_id.clone(), record.clone());
        Ok(true)
    }
}
