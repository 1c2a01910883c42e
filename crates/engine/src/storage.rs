//! Model persistence
//!
//! The persistent store is the single source of truth across process
//! restarts; cached models are a performance optimization on top of it.
//! Blobs are opaque to the store: it only knows model ids, bytes, and an
//! update counter for observability.
//!
//! Storage schema (`bandit_models`):
//! - `model_id`: TEXT primary key ("global" or "user_<id>")
//! - `model_data`: BYTEA (bincode-serialized model)
//! - `n_updates`: BIGINT
//! - `updated_at`: TIMESTAMPTZ

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reverie_core::{ReverieError, Result};
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Instant;
use tracing::debug;

/// Model id of the shared global model
pub const GLOBAL_MODEL_ID: &str = "global";

/// Model id for a user's personal model
pub fn user_model_id(user_id: &str) -> String {
    format!("user_{}", user_id)
}

/// A persisted model row
#[derive(Debug, Clone)]
pub struct ModelRecord {
    pub model_id: String,
    pub blob: Vec<u8>,
    pub n_updates: u64,
    pub updated_at: DateTime<Utc>,
}

/// Key-value persistence seam for serialized models
#[async_trait]
pub trait ModelStore: Send + Sync {
    /// Fetch a model blob; `None` when the id has never been persisted
    async fn get(&self, model_id: &str) -> Result<Option<ModelRecord>>;

    /// Upsert a model blob
    async fn put(
        &self,
        model_id: &str,
        blob: &[u8],
        n_updates: u64,
        updated_at: DateTime<Utc>,
    ) -> Result<()>;
}

/// PostgreSQL-backed model store
pub struct PostgresModelStore {
    pool: PgPool,
}

impl PostgresModelStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ModelStore for PostgresModelStore {
    async fn get(&self, model_id: &str) -> Result<Option<ModelRecord>> {
        let start = Instant::now();

        let row = sqlx::query(
            r#"
            SELECT model_id, model_data, n_updates, updated_at
            FROM bandit_models
            WHERE model_id = $1
            "#,
        )
        .bind(model_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ReverieError::persistence(format!("failed to query model {}: {}", model_id, e)))?;

        let record = match row {
            Some(row) => {
                let blob: Vec<u8> = row
                    .try_get("model_data")
                    .map_err(|e| ReverieError::persistence(e.to_string()))?;
                let n_updates: i64 = row
                    .try_get("n_updates")
                    .map_err(|e| ReverieError::persistence(e.to_string()))?;
                let updated_at: DateTime<Utc> = row
                    .try_get("updated_at")
                    .map_err(|e| ReverieError::persistence(e.to_string()))?;

                debug!(
                    "Loaded model {} in {:?} ({} bytes)",
                    model_id,
                    start.elapsed(),
                    blob.len()
                );

                Some(ModelRecord {
                    model_id: model_id.to_string(),
                    blob,
                    n_updates: n_updates.max(0) as u64,
                    updated_at,
                })
            }
            None => None,
        };

        Ok(record)
    }

    async fn put(
        &self,
        model_id: &str,
        blob: &[u8],
        n_updates: u64,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let start = Instant::now();

        sqlx::query(
            r#"
            INSERT INTO bandit_models (model_id, model_data, n_updates, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (model_id)
            DO UPDATE SET model_data = EXCLUDED.model_data,
                          n_updates = EXCLUDED.n_updates,
                          updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(model_id)
        .bind(blob)
        .bind(n_updates as i64)
        .bind(updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| ReverieError::persistence(format!("failed to save model {}: {}", model_id, e)))?;

        debug!(
            "Saved model {} in {:?} ({} bytes, {} updates)",
            model_id,
            start.elapsed(),
            blob.len(),
            n_updates
        );

        Ok(())
    }
}

/// In-memory model store for tests and local runs
///
/// Writes can be toggled to fail, to exercise the dirty-retry paths.
#[derive(Default)]
pub struct InMemoryModelStore {
    records: Mutex<HashMap<String, ModelRecord>>,
    fail_writes: AtomicBool,
}

impl InMemoryModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `put` calls fail until switched back
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of persisted models
    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of a stored record, if present
    pub fn record(&self, model_id: &str) -> Option<ModelRecord> {
        self.records.lock().unwrap().get(model_id).cloned()
    }
}

#[async_trait]
impl ModelStore for InMemoryModelStore {
    async fn get(&self, model_id: &str) -> Result<Option<ModelRecord>> {
        Ok(self.records.lock().unwrap().get(model_id).cloned())
    }

    async fn put(
        &self,
        model_id: &str,
        blob: &[u8],
        n_updates: u64,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ReverieError::persistence("in-memory store: writes disabled"));
        }
        self.records.lock().unwrap().insert(
            model_id.to_string(),
            ModelRecord {
                model_id: model_id.to_string(),
                blob: blob.to_vec(),
                n_updates,
                updated_at,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_id_keys() {
        assert_eq!(GLOBAL_MODEL_ID, "global");
        assert_eq!(user_model_id("alice"), "user_alice");
    }

    #[tokio::test]
    async fn test_in_memory_round_trip() {
        let store = InMemoryModelStore::new();
        assert!(store.get("global").await.unwrap().is_none());

        store
            .put("global", &[1, 2, 3], 5, Utc::now())
            .await
            .unwrap();
        let record = store.get("global").await.unwrap().unwrap();
        assert_eq!(record.blob, vec![1, 2, 3]);
        assert_eq!(record.n_updates, 5);
    }

    #[tokio::test]
    async fn test_in_memory_upsert_replaces() {
        let store = InMemoryModelStore::new();
        store.put("user_a", &[1], 1, Utc::now()).await.unwrap();
        store.put("user_a", &[2, 2], 2, Utc::now()).await.unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.record("user_a").unwrap().blob, vec![2, 2]);
    }

    #[tokio::test]
    async fn test_in_memory_write_failure_toggle() {
        let store = InMemoryModelStore::new();
        store.set_fail_writes(true);
        assert!(store.put("user_a", &[1], 1, Utc::now()).await.is_err());
        store.set_fail_writes(false);
        assert!(store.put("user_a", &[1], 1, Utc::now()).await.is_ok());
    }
}
