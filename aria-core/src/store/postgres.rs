use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{DocumentStore, IntentUpsert};
use crate::error::{AriaError, Result};
use crate::models::{
    HabitFilter, HabitPatch, HabitRecord, IntentFilter, IntentKey, IntentPatch, IntentRecord,
    NewHabit, NewIntent, PromotionSource,
};

const INTENT_COLUMNS: &str =
    "id, user_id, intent, count, confidence, entities, last_seen, created_at, updated_at";

const HABIT_COLUMNS: &str = "id, user_id, intent, confidence, trigger_pattern, notes, active, \
     frequency, promoted_from, created_at, updated_at";

/// `DocumentStore` backed by the `intents` and `habits` tables.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[derive(sqlx::FromRow)]
struct HabitRow {
    id: Uuid,
    user_id: Option<String>,
    intent: String,
    confidence: f64,
    trigger_pattern: String,
    notes: String,
    active: bool,
    frequency: i64,
    promoted_from: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<HabitRow> for HabitRecord {
    type Error = AriaError;

    fn try_from(row: HabitRow) -> Result<Self> {
        let promoted_from: PromotionSource = row.promoted_from.parse().map_err(AriaError::Other)?;
        Ok(HabitRecord {
            id: row.id,
            user_id: row.user_id,
            intent: row.intent,
            confidence: row.confidence,
            trigger_pattern: row.trigger_pattern,
            notes: row.notes,
            active: row.active,
            frequency: row.frequency,
            promoted_from,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Translate a unique-constraint violation into `DuplicateKey`.
fn map_write_error(err: sqlx::Error, key: &IntentKey) -> AriaError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => AriaError::DuplicateKey {
            user_id: key.user_id.clone(),
            intent: key.intent.clone(),
        },
        _ => AriaError::Database(err),
    }
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn upsert_intent(&self, upsert: &IntentUpsert) -> Result<IntentRecord> {
        let query = format!(
            r#"
            INSERT INTO intents (user_id, intent, count, confidence, entities, last_seen)
            VALUES ($1, $2, 1, $3, $4, $5)
            ON CONFLICT ON CONSTRAINT intents_user_intent_key
            DO UPDATE SET
                count = intents.count + 1,
                confidence = EXCLUDED.confidence,
                entities = EXCLUDED.entities,
                last_seen = EXCLUDED.last_seen,
                updated_at = now()
            RETURNING {}
            "#,
            INTENT_COLUMNS
        );

        let record = sqlx::query_as::<_, IntentRecord>(&query)
            .bind(&upsert.key.user_id)
            .bind(&upsert.key.intent)
            .bind(upsert.confidence)
            .bind(&upsert.entities)
            .bind(upsert.seen_at)
            .fetch_one(&self.pool)
            .await?;

        Ok(record)
    }

    async fn insert_intent(&self, intent: &NewIntent) -> Result<IntentRecord> {
        let query = format!(
            r#"
            INSERT INTO intents (user_id, intent, count, confidence, entities, last_seen)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            INTENT_COLUMNS
        );

        sqlx::query_as::<_, IntentRecord>(&query)
            .bind(&intent.key.user_id)
            .bind(&intent.key.intent)
            .bind(intent.count)
            .bind(intent.confidence)
            .bind(&intent.entities)
            .bind(intent.last_seen)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_write_error(e, &intent.key))
    }

    async fn get_intent(&self, id: Uuid) -> Result<Option<IntentRecord>> {
        let query = format!("SELECT {} FROM intents WHERE id = $1", INTENT_COLUMNS);
        let record = sqlx::query_as::<_, IntentRecord>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    async fn list_intents(&self, filter: &IntentFilter) -> Result<Vec<IntentRecord>> {
        let query = format!(
            r#"
            SELECT {}
            FROM intents
            WHERE ($1::text IS NULL OR user_id = $1)
              AND ($2::bigint IS NULL OR count >= $2)
            ORDER BY count DESC, last_seen DESC
            LIMIT $3
            "#,
            INTENT_COLUMNS
        );

        let rows = sqlx::query_as::<_, IntentRecord>(&query)
            .bind(&filter.user_id)
            .bind(filter.min_count)
            .bind(filter.limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn update_intent(&self, id: Uuid, patch: &IntentPatch) -> Result<Option<IntentRecord>> {
        let Some(existing) = self.get_intent(id).await? else {
            return Ok(None);
        };

        let query = format!(
            r#"
            UPDATE intents
            SET intent = COALESCE($2, intent),
                confidence = COALESCE($3, confidence),
                entities = COALESCE($4, entities),
                updated_at = now()
            WHERE id = $1
            RETURNING {}
            "#,
            INTENT_COLUMNS
        );

        let key = IntentKey::new(
            existing.user_id,
            patch.intent.as_deref().map(str::trim).map_or(existing.intent, str::to_string),
        );
        sqlx::query_as::<_, IntentRecord>(&query)
            .bind(id)
            .bind(patch.intent.as_deref().map(str::trim))
            .bind(patch.confidence)
            .bind(&patch.entities)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_write_error(e, &key))
    }

    async fn delete_intent(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM intents WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_habit(&self, key: &IntentKey) -> Result<Option<HabitRecord>> {
        let query = format!(
            "SELECT {} FROM habits WHERE user_key = COALESCE($1, '') AND intent = $2",
            HABIT_COLUMNS
        );
        let row = sqlx::query_as::<_, HabitRow>(&query)
            .bind(&key.user_id)
            .bind(&key.intent)
            .fetch_optional(&self.pool)
            .await?;
        row.map(HabitRecord::try_from).transpose()
    }

    async fn insert_habit(&self, habit: &NewHabit) -> Result<HabitRecord> {
        let query = format!(
            r#"
            INSERT INTO habits (
                user_id, intent, confidence, trigger_pattern, notes,
                active, frequency, promoted_from
            ) VALUES ($1, $2, $3, $4, $5, true, $6, $7)
            RETURNING {}
            "#,
            HABIT_COLUMNS
        );

        let row = sqlx::query_as::<_, HabitRow>(&query)
            .bind(&habit.key.user_id)
            .bind(&habit.key.intent)
            .bind(habit.confidence)
            .bind(&habit.trigger_pattern)
            .bind(&habit.notes)
            .bind(habit.frequency)
            .bind(habit.promoted_from.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_write_error(e, &habit.key))?;

        HabitRecord::try_from(row)
    }

    async fn get_habit(&self, id: Uuid) -> Result<Option<HabitRecord>> {
        let query = format!("SELECT {} FROM habits WHERE id = $1", HABIT_COLUMNS);
        let row = sqlx::query_as::<_, HabitRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(HabitRecord::try_from).transpose()
    }

    async fn list_habits(&self, filter: &HabitFilter) -> Result<Vec<HabitRecord>> {
        let query = format!(
            r#"
            SELECT {}
            FROM habits
            WHERE ($1::text IS NULL OR user_id = $1)
              AND ($2::boolean IS NULL OR active = $2)
            ORDER BY confidence DESC, created_at DESC
            LIMIT $3
            "#,
            HABIT_COLUMNS
        );

        let rows = sqlx::query_as::<_, HabitRow>(&query)
            .bind(&filter.user_id)
            .bind(filter.active)
            .bind(filter.limit)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(HabitRecord::try_from).collect()
    }

    async fn update_habit(&self, id: Uuid, patch: &HabitPatch) -> Result<Option<HabitRecord>> {
        let Some(existing) = self.get_habit(id).await? else {
            return Ok(None);
        };

        let query = format!(
            r#"
            UPDATE habits
            SET intent = COALESCE($2, intent),
                confidence = COALESCE($3, confidence),
                trigger_pattern = COALESCE($4, trigger_pattern),
                notes = COALESCE($5, notes),
                active = COALESCE($6, active),
                frequency = COALESCE($7, frequency),
                updated_at = now()
            WHERE id = $1
            RETURNING {}
            "#,
            HABIT_COLUMNS
        );

        let key = IntentKey::new(
            existing.user_id,
            patch.intent.as_deref().map(str::trim).map_or(existing.intent, str::to_string),
        );
        let row = sqlx::query_as::<_, HabitRow>(&query)
            .bind(id)
            .bind(patch.intent.as_deref().map(str::trim))
            .bind(patch.confidence)
            .bind(&patch.trigger_pattern)
            .bind(&patch.notes)
            .bind(patch.active)
            .bind(patch.frequency)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_write_error(e, &key))?;
        row.map(HabitRecord::try_from).transpose()
    }

    async fn delete_habit(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM habits WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn health(&self) -> Result<String> {
        Ok(crate::db::health_check(&self.pool).await?)
    }

    fn name(&self) -> &str {
        "postgres"
    }
}
