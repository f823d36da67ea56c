use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use aria_core::error::{AriaError, Result};
use aria_core::models::memory::{MEMORY_ROLES, MEMORY_TYPES};
use aria_core::models::MemoryRecord;

const MEMORY_COLUMNS: &str =
    "id, user_id, role, content, intent, entities, memory_type, timestamp, created_at";

const LIST_LIMIT: i64 = 200;
const CONTEXT_LIMIT: i64 = 5;

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MemoryQuery {
    pub user_id: Option<String>,
    #[serde(rename = "type")]
    pub memory_type: Option<String>,
    pub intent: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CreateMemory {
    pub user_id: Option<String>,
    pub role: Option<String>,
    pub content: Option<String>,
    pub intent: Option<String>,
    pub entities: Option<Vec<String>>,
    pub memory_type: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MemoryPatch {
    pub content: Option<String>,
    pub intent: Option<String>,
    pub entities: Option<Vec<String>>,
    pub memory_type: Option<String>,
}

fn check_allowed(field: &str, value: Option<&str>, allowed: &[&str]) -> Result<()> {
    match value {
        Some(v) if !allowed.contains(&v) => Err(AriaError::validation(format!(
            "{} must be one of {}",
            field,
            allowed.join(", ")
        ))),
        _ => Ok(()),
    }
}

/// Escape LIKE wildcards so the filter is a literal substring match.
pub fn like_pattern(fragment: &str) -> String {
    let escaped = fragment
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

pub async fn list_memories(pool: &PgPool, q: &MemoryQuery) -> Result<Vec<MemoryRecord>> {
    check_allowed("type", q.memory_type.as_deref(), &MEMORY_TYPES)?;

    let query = format!(
        r#"
        SELECT {}
        FROM memories
        WHERE ($1::text IS NULL OR user_id = $1)
          AND ($2::text IS NULL OR memory_type = $2)
          AND ($3::text IS NULL OR intent ILIKE $3)
        ORDER BY timestamp DESC
        LIMIT $4
        "#,
        MEMORY_COLUMNS
    );

    Ok(sqlx::query_as::<_, MemoryRecord>(&query)
        .bind(&q.user_id)
        .bind(&q.memory_type)
        .bind(q.intent.as_deref().map(like_pattern))
        .bind(LIST_LIMIT)
        .fetch_all(pool)
        .await?)
}

/// Most recent memories for a user, used as conversational context.
pub async fn context_memories(
    pool: &PgPool,
    user_id: &str,
    memory_type: Option<&str>,
) -> Result<Vec<MemoryRecord>> {
    check_allowed("type", memory_type, &MEMORY_TYPES)?;

    let query = format!(
        r#"
        SELECT {}
        FROM memories
        WHERE user_id = $1
          AND ($2::text IS NULL OR memory_type = $2)
        ORDER BY timestamp DESC
        LIMIT $3
        "#,
        MEMORY_COLUMNS
    );

    Ok(sqlx::query_as::<_, MemoryRecord>(&query)
        .bind(user_id)
        .bind(memory_type)
        .bind(CONTEXT_LIMIT)
        .fetch_all(pool)
        .await?)
}

pub async fn get_memory(pool: &PgPool, id: Uuid) -> Result<Option<MemoryRecord>> {
    let query = format!("SELECT {} FROM memories WHERE id = $1", MEMORY_COLUMNS);
    Ok(sqlx::query_as::<_, MemoryRecord>(&query)
        .bind(id)
        .fetch_optional(pool)
        .await?)
}

pub async fn create_memory(pool: &PgPool, req: CreateMemory) -> Result<MemoryRecord> {
    let (user_id, content) = match (req.user_id.as_deref(), req.content.as_deref()) {
        (Some(u), Some(c)) if !u.trim().is_empty() && !c.trim().is_empty() => (u, c),
        _ => return Err(AriaError::validation("userId + content required")),
    };
    check_allowed("role", req.role.as_deref(), &MEMORY_ROLES)?;
    check_allowed("memoryType", req.memory_type.as_deref(), &MEMORY_TYPES)?;

    let query = format!(
        r#"
        INSERT INTO memories (user_id, role, content, intent, entities, memory_type)
        VALUES ($1, COALESCE($2, 'user'), $3, COALESCE($4, ''), $5, COALESCE($6, 'short-term'))
        RETURNING {}
        "#,
        MEMORY_COLUMNS
    );

    let memory = sqlx::query_as::<_, MemoryRecord>(&query)
        .bind(user_id)
        .bind(&req.role)
        .bind(content)
        .bind(&req.intent)
        .bind(req.entities.clone().unwrap_or_default())
        .bind(&req.memory_type)
        .fetch_one(pool)
        .await?;

    super::users::touch_user(pool, user_id).await;
    Ok(memory)
}

pub async fn update_memory(
    pool: &PgPool,
    id: Uuid,
    patch: MemoryPatch,
) -> Result<Option<MemoryRecord>> {
    check_allowed("memoryType", patch.memory_type.as_deref(), &MEMORY_TYPES)?;

    let query = format!(
        r#"
        UPDATE memories
        SET content = COALESCE($2, content),
            intent = COALESCE($3, intent),
            entities = COALESCE($4, entities),
            memory_type = COALESCE($5, memory_type)
        WHERE id = $1
        RETURNING {}
        "#,
        MEMORY_COLUMNS
    );

    Ok(sqlx::query_as::<_, MemoryRecord>(&query)
        .bind(id)
        .bind(patch.content)
        .bind(patch.intent)
        .bind(patch.entities)
        .bind(patch.memory_type)
        .fetch_optional(pool)
        .await?)
}

pub async fn delete_memory(pool: &PgPool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM memories WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Delete every memory of one user. Returns the number of rows removed.
pub async fn delete_user_memories(pool: &PgPool, user_id: &str) -> Result<u64> {
    let result = sqlx::query("DELETE FROM memories WHERE user_id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
