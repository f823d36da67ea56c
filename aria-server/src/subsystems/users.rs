use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use aria_core::error::{AriaError, Result};
use aria_core::models::UserProfile;

const USER_COLUMNS: &str =
    "id, username, name, email, preferences, session_count, last_active, created_at, updated_at";

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CreateUser {
    pub username: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub preferences: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub preferences: Option<serde_json::Value>,
    pub session_count: Option<i32>,
    pub last_active: Option<chrono::DateTime<chrono::Utc>>,
}

fn map_username_conflict(err: sqlx::Error) -> AriaError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AriaError::Conflict("Username already exists".to_string())
        }
        _ => AriaError::Database(err),
    }
}

pub async fn list_users(pool: &PgPool) -> Result<Vec<UserProfile>> {
    let query = format!("SELECT {} FROM users ORDER BY created_at DESC", USER_COLUMNS);
    Ok(sqlx::query_as::<_, UserProfile>(&query).fetch_all(pool).await?)
}

pub async fn get_user(pool: &PgPool, id: Uuid) -> Result<Option<UserProfile>> {
    let query = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
    Ok(sqlx::query_as::<_, UserProfile>(&query)
        .bind(id)
        .fetch_optional(pool)
        .await?)
}

pub async fn create_user(pool: &PgPool, req: CreateUser) -> Result<UserProfile> {
    let username = req
        .username
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| AriaError::validation("username required"))?;

    let query = format!(
        r#"
        INSERT INTO users (username, name, email, preferences)
        VALUES ($1, $2, $3, $4)
        RETURNING {}
        "#,
        USER_COLUMNS
    );

    let user = sqlx::query_as::<_, UserProfile>(&query)
        .bind(username)
        .bind(req.name.unwrap_or_default())
        .bind(req.email.unwrap_or_default())
        .bind(req.preferences.unwrap_or_else(|| serde_json::json!({})))
        .fetch_one(pool)
        .await
        .map_err(map_username_conflict)?;

    tracing::info!("User created: {}", user.username);
    Ok(user)
}

pub async fn update_user(pool: &PgPool, id: Uuid, patch: UserPatch) -> Result<Option<UserProfile>> {
    let query = format!(
        r#"
        UPDATE users
        SET name = COALESCE($2, name),
            email = COALESCE($3, email),
            preferences = COALESCE($4, preferences),
            session_count = COALESCE($5, session_count),
            last_active = COALESCE($6, last_active),
            updated_at = now()
        WHERE id = $1
        RETURNING {}
        "#,
        USER_COLUMNS
    );

    Ok(sqlx::query_as::<_, UserProfile>(&query)
        .bind(id)
        .bind(patch.name)
        .bind(patch.email)
        .bind(patch.preferences)
        .bind(patch.session_count)
        .bind(patch.last_active)
        .fetch_optional(pool)
        .await?)
}

pub async fn delete_user(pool: &PgPool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Bump `last_active` for a user referenced by a memory. Ids that are not
/// user UUIDs are ignored.
pub async fn touch_user(pool: &PgPool, user_id: &str) {
    let Ok(id) = Uuid::parse_str(user_id) else {
        return;
    };
    if let Err(e) = sqlx::query("UPDATE users SET last_active = now() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
    {
        tracing::debug!("Failed to touch user {}: {}", user_id, e);
    }
}
