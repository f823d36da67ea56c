//! Document store abstraction for the intent ledger and habit records.
//!
//! Provides a `DocumentStore` trait with implementations for:
//! - **Postgres** — production storage via `sqlx`
//! - **Memory** — in-process tables behind one async mutex
//!
//! Both implementations must honour the same contract: `upsert_intent` is a
//! single atomic increment-or-insert, and `insert_habit` fails with
//! `AriaError::DuplicateKey` when a habit already exists for the key.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::{AriaConfig, StorageBackend};
use crate::error::Result;
use crate::models::{
    HabitFilter, HabitPatch, HabitRecord, IntentFilter, IntentKey, IntentPatch, IntentRecord,
    NewHabit, NewIntent,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Values written by one observation of an intent.
#[derive(Debug, Clone)]
pub struct IntentUpsert {
    pub key: IntentKey,
    pub confidence: f64,
    pub entities: serde_json::Value,
    pub seen_at: DateTime<Utc>,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Atomically insert the key with `count = 1` or increment its count by one,
    /// overwriting confidence, entities and last-seen. Returns the post-update row.
    async fn upsert_intent(&self, upsert: &IntentUpsert) -> Result<IntentRecord>;

    /// Insert a ledger row with an explicit count. Fails with `DuplicateKey` if the key exists.
    async fn insert_intent(&self, intent: &NewIntent) -> Result<IntentRecord>;

    async fn get_intent(&self, id: Uuid) -> Result<Option<IntentRecord>>;

    /// Intents matching the filter, highest count first.
    async fn list_intents(&self, filter: &IntentFilter) -> Result<Vec<IntentRecord>>;

    async fn update_intent(&self, id: Uuid, patch: &IntentPatch) -> Result<Option<IntentRecord>>;

    /// Returns true if the intent existed and was deleted.
    async fn delete_intent(&self, id: Uuid) -> Result<bool>;

    async fn find_habit(&self, key: &IntentKey) -> Result<Option<HabitRecord>>;

    /// Insert a habit. Fails with `DuplicateKey` if one exists for the key.
    async fn insert_habit(&self, habit: &NewHabit) -> Result<HabitRecord>;

    async fn get_habit(&self, id: Uuid) -> Result<Option<HabitRecord>>;

    /// Habits matching the filter, highest confidence first.
    async fn list_habits(&self, filter: &HabitFilter) -> Result<Vec<HabitRecord>>;

    async fn update_habit(&self, id: Uuid, patch: &HabitPatch) -> Result<Option<HabitRecord>>;

    async fn delete_habit(&self, id: Uuid) -> Result<bool>;

    /// Short description of the backing store, e.g. the server version.
    async fn health(&self) -> Result<String>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

/// Build the configured store. The pool is returned alongside for the
/// Postgres-only CRUD surface; it is `None` for the memory backend.
pub async fn create_store(
    config: &AriaConfig,
) -> Result<(Arc<dyn DocumentStore>, Option<PgPool>)> {
    match config.storage.backend {
        StorageBackend::Postgres => {
            let pool = crate::db::create_pool(&config.database).await?;
            crate::db::ensure_schema(&pool).await?;
            let store: Arc<dyn DocumentStore> = Arc::new(PgStore::new(pool.clone()));
            Ok((store, Some(pool)))
        }
        StorageBackend::Memory => Ok((Arc::new(MemoryStore::new()), None)),
    }
}
