use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use aria_core::error::{AriaError, Result};
use aria_core::models::task::{TASK_PRIORITIES, TASK_STATUSES};
use aria_core::models::TaskRecord;

const TASK_COLUMNS: &str = "id, user_id, title, description, status, priority, due_date, tags, \
     created_at, updated_at";

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TaskQuery {
    pub user_id: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CreateTask {
    pub user_id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub tags: Option<Vec<String>>,
}

fn check_status_priority(status: Option<&str>, priority: Option<&str>) -> Result<()> {
    if let Some(s) = status {
        if !TASK_STATUSES.contains(&s) {
            return Err(AriaError::validation(format!(
                "status must be one of {}",
                TASK_STATUSES.join(", ")
            )));
        }
    }
    if let Some(p) = priority {
        if !TASK_PRIORITIES.contains(&p) {
            return Err(AriaError::validation(format!(
                "priority must be one of {}",
                TASK_PRIORITIES.join(", ")
            )));
        }
    }
    Ok(())
}

pub async fn list_tasks(pool: &PgPool, q: &TaskQuery) -> Result<Vec<TaskRecord>> {
    let query = format!(
        r#"
        SELECT {}
        FROM tasks
        WHERE ($1::text IS NULL OR user_id = $1)
          AND ($2::text IS NULL OR status = $2)
        ORDER BY created_at DESC
        "#,
        TASK_COLUMNS
    );

    Ok(sqlx::query_as::<_, TaskRecord>(&query)
        .bind(&q.user_id)
        .bind(&q.status)
        .fetch_all(pool)
        .await?)
}

/// Newest tasks for a user that are not completed.
pub async fn open_tasks(pool: &PgPool, user_id: &str, limit: i64) -> Result<Vec<TaskRecord>> {
    let query = format!(
        r#"
        SELECT {}
        FROM tasks
        WHERE user_id = $1 AND status <> 'completed'
        ORDER BY created_at DESC
        LIMIT $2
        "#,
        TASK_COLUMNS
    );

    Ok(sqlx::query_as::<_, TaskRecord>(&query)
        .bind(user_id)
        .bind(limit)
        .fetch_all(pool)
        .await?)
}

pub async fn create_task(pool: &PgPool, req: CreateTask) -> Result<TaskRecord> {
    let title = req
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AriaError::validation("title required"))?;
    check_status_priority(req.status.as_deref(), req.priority.as_deref())?;

    let query = format!(
        r#"
        INSERT INTO tasks (user_id, title, description, status, priority, due_date, tags)
        VALUES ($1, $2, COALESCE($3, ''), COALESCE($4, 'pending'), COALESCE($5, 'medium'), $6, $7)
        RETURNING {}
        "#,
        TASK_COLUMNS
    );

    Ok(sqlx::query_as::<_, TaskRecord>(&query)
        .bind(&req.user_id)
        .bind(title)
        .bind(&req.description)
        .bind(&req.status)
        .bind(&req.priority)
        .bind(req.due_date)
        .bind(req.tags.clone().unwrap_or_default())
        .fetch_one(pool)
        .await?)
}

pub async fn update_task(pool: &PgPool, id: Uuid, patch: TaskPatch) -> Result<Option<TaskRecord>> {
    check_status_priority(patch.status.as_deref(), patch.priority.as_deref())?;

    let query = format!(
        r#"
        UPDATE tasks
        SET title = COALESCE($2, title),
            description = COALESCE($3, description),
            status = COALESCE($4, status),
            priority = COALESCE($5, priority),
            due_date = COALESCE($6, due_date),
            tags = COALESCE($7, tags),
            updated_at = now()
        WHERE id = $1
        RETURNING {}
        "#,
        TASK_COLUMNS
    );

    Ok(sqlx::query_as::<_, TaskRecord>(&query)
        .bind(id)
        .bind(patch.title)
        .bind(patch.description)
        .bind(patch.status)
        .bind(patch.priority)
        .bind(patch.due_date)
        .bind(patch.tags)
        .fetch_optional(pool)
        .await?)
}

pub async fn delete_task(pool: &PgPool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_and_priority_validation() {
        assert!(check_status_priority(None, None).is_ok());
        assert!(check_status_priority(Some("in-progress"), Some("high")).is_ok());
        assert!(check_status_priority(Some("done"), None).is_err());
        assert!(check_status_priority(None, Some("urgent")).is_err());
    }
}
