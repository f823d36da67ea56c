//! Users, memories, tasks and the dashboard/context/analytics aggregates.
//!
//! These are direct pass-throughs to Postgres. Without a pool (memory
//! backend) every route answers 503.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use sqlx::PgPool;

use super::{
    error_body, error_response, non_blank, parse_id, respond, respond_deleted, respond_found,
    respond_list, HttpResponse, HttpState,
};
use crate::subsystems::memories::{self, CreateMemory, MemoryPatch, MemoryQuery};
use crate::subsystems::tasks::{self, CreateTask, TaskPatch, TaskQuery};
use crate::subsystems::users::{self, CreateUser, UserPatch};
use crate::subsystems::dashboard;

pub fn routes() -> Router<Arc<HttpState>> {
    Router::new()
        .route("/api/users", get(list_users_handler).post(create_user_handler))
        .route(
            "/api/users/:id",
            get(get_user_handler)
                .put(update_user_handler)
                .delete(delete_user_handler),
        )
        .route(
            "/api/memories",
            get(list_memories_handler)
                .post(create_memory_handler)
                .delete(delete_user_memories_handler),
        )
        .route("/api/memories/context/:user_id", get(memory_context_handler))
        .route(
            "/api/memories/:id",
            get(get_memory_handler)
                .put(update_memory_handler)
                .delete(delete_memory_handler),
        )
        .route("/api/tasks", get(list_tasks_handler).post(create_task_handler))
        .route(
            "/api/tasks/:id",
            axum::routing::put(update_task_handler).delete(delete_task_handler),
        )
        .route("/api/dashboard", get(dashboard_handler))
        .route("/api/context/:user_id", get(user_context_handler))
        .route("/api/analytics/intent-summary", get(intent_summary_handler))
}

#[derive(Debug, Deserialize, Default)]
pub struct MemoryTypeQuery {
    #[serde(rename = "type")]
    pub memory_type: Option<String>,
}

/// The Postgres pool, or a 503 for the memory backend.
pub fn require_pool(state: &HttpState) -> Result<&PgPool, HttpResponse> {
    state.pool.as_ref().ok_or_else(|| {
        error_body(
            StatusCode::SERVICE_UNAVAILABLE,
            "this endpoint requires the postgres storage backend",
        )
    })
}

macro_rules! pool_or_return {
    ($state:expr) => {
        match require_pool($state) {
            Ok(pool) => pool,
            Err(resp) => return resp,
        }
    };
}

macro_rules! id_or_return {
    ($raw:expr) => {
        match parse_id($raw) {
            Ok(id) => id,
            Err(resp) => return resp,
        }
    };
}

// ============================================================================
// Users
// ============================================================================

pub async fn list_users_inner(state: &HttpState) -> HttpResponse {
    let pool = pool_or_return!(state);
    respond_list("users", users::list_users(pool).await)
}

pub async fn get_user_inner(state: &HttpState, id: &str) -> HttpResponse {
    let pool = pool_or_return!(state);
    let id = id_or_return!(id);
    respond_found(users::get_user(pool, id).await, "User")
}

pub async fn create_user_inner(state: &HttpState, req: CreateUser) -> HttpResponse {
    let pool = pool_or_return!(state);
    respond(StatusCode::CREATED, users::create_user(pool, req).await)
}

pub async fn update_user_inner(state: &HttpState, id: &str, patch: UserPatch) -> HttpResponse {
    let pool = pool_or_return!(state);
    let id = id_or_return!(id);
    respond_found(users::update_user(pool, id, patch).await, "User")
}

pub async fn delete_user_inner(state: &HttpState, id: &str) -> HttpResponse {
    let pool = pool_or_return!(state);
    let id = id_or_return!(id);
    respond_deleted(users::delete_user(pool, id).await, "User")
}

// ============================================================================
// Memories
// ============================================================================

pub async fn list_memories_inner(state: &HttpState, mut query: MemoryQuery) -> HttpResponse {
    let pool = pool_or_return!(state);
    query.user_id = non_blank(query.user_id);
    query.memory_type = non_blank(query.memory_type);
    query.intent = non_blank(query.intent);
    respond_list("memories", memories::list_memories(pool, &query).await)
}

pub async fn memory_context_inner(
    state: &HttpState,
    user_id: &str,
    query: MemoryTypeQuery,
) -> HttpResponse {
    let pool = pool_or_return!(state);
    let memory_type = non_blank(query.memory_type);
    respond(
        StatusCode::OK,
        memories::context_memories(pool, user_id, memory_type.as_deref()).await,
    )
}

pub async fn get_memory_inner(state: &HttpState, id: &str) -> HttpResponse {
    let pool = pool_or_return!(state);
    let id = id_or_return!(id);
    respond_found(memories::get_memory(pool, id).await, "Memory")
}

pub async fn create_memory_inner(state: &HttpState, req: CreateMemory) -> HttpResponse {
    let pool = pool_or_return!(state);
    respond(StatusCode::CREATED, memories::create_memory(pool, req).await)
}

pub async fn update_memory_inner(state: &HttpState, id: &str, patch: MemoryPatch) -> HttpResponse {
    let pool = pool_or_return!(state);
    let id = id_or_return!(id);
    respond_found(memories::update_memory(pool, id, patch).await, "Memory")
}

pub async fn delete_memory_inner(state: &HttpState, id: &str) -> HttpResponse {
    let pool = pool_or_return!(state);
    let id = id_or_return!(id);
    respond_deleted(memories::delete_memory(pool, id).await, "Memory")
}

/// Bulk delete of one user's memories. `userId` is mandatory.
pub async fn delete_user_memories_inner(state: &HttpState, scope: super::UserScope) -> HttpResponse {
    let pool = pool_or_return!(state);
    let Some(user_id) = non_blank(scope.user_id) else {
        return error_body(StatusCode::BAD_REQUEST, "userId required");
    };
    match memories::delete_user_memories(pool, &user_id).await {
        Ok(deleted) => (
            StatusCode::OK,
            serde_json::json!({ "message": "Memories cleared", "deletedCount": deleted }),
        ),
        Err(e) => error_response(&e),
    }
}

// ============================================================================
// Tasks
// ============================================================================

pub async fn list_tasks_inner(state: &HttpState, mut query: TaskQuery) -> HttpResponse {
    let pool = pool_or_return!(state);
    query.user_id = non_blank(query.user_id);
    query.status = non_blank(query.status);
    respond_list("tasks", tasks::list_tasks(pool, &query).await)
}

pub async fn create_task_inner(state: &HttpState, req: CreateTask) -> HttpResponse {
    let pool = pool_or_return!(state);
    respond(StatusCode::CREATED, tasks::create_task(pool, req).await)
}

pub async fn update_task_inner(state: &HttpState, id: &str, patch: TaskPatch) -> HttpResponse {
    let pool = pool_or_return!(state);
    let id = id_or_return!(id);
    respond_found(tasks::update_task(pool, id, patch).await, "Task")
}

pub async fn delete_task_inner(state: &HttpState, id: &str) -> HttpResponse {
    let pool = pool_or_return!(state);
    let id = id_or_return!(id);
    respond_deleted(tasks::delete_task(pool, id).await, "Task")
}

// ============================================================================
// Aggregates
// ============================================================================

pub async fn dashboard_inner(state: &HttpState) -> HttpResponse {
    let pool = pool_or_return!(state);
    respond(
        StatusCode::OK,
        dashboard::dashboard(pool, state.engine.store()).await,
    )
}

pub async fn user_context_inner(state: &HttpState, user_id: &str) -> HttpResponse {
    let pool = pool_or_return!(state);
    respond(
        StatusCode::OK,
        dashboard::user_context(pool, state.engine.store(), user_id).await,
    )
}

pub async fn intent_summary_inner(state: &HttpState) -> HttpResponse {
    let pool = pool_or_return!(state);
    respond(StatusCode::OK, dashboard::intent_summary(pool).await)
}

// ============================================================================
// Axum handler wrappers
// ============================================================================

pub async fn list_users_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = list_users_inner(&state).await;
    (status, Json(body))
}

pub async fn get_user_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let (status, body) = get_user_inner(&state, &id).await;
    (status, Json(body))
}

pub async fn create_user_handler(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<CreateUser>,
) -> impl IntoResponse {
    let (status, body) = create_user_inner(&state, req).await;
    (status, Json(body))
}

pub async fn update_user_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<String>,
    Json(patch): Json<UserPatch>,
) -> impl IntoResponse {
    let (status, body) = update_user_inner(&state, &id, patch).await;
    (status, Json(body))
}

pub async fn delete_user_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let (status, body) = delete_user_inner(&state, &id).await;
    (status, Json(body))
}

pub async fn list_memories_handler(
    State(state): State<Arc<HttpState>>,
    Query(query): Query<MemoryQuery>,
) -> impl IntoResponse {
    let (status, body) = list_memories_inner(&state, query).await;
    (status, Json(body))
}

pub async fn memory_context_handler(
    State(state): State<Arc<HttpState>>,
    Path(user_id): Path<String>,
    Query(query): Query<MemoryTypeQuery>,
) -> impl IntoResponse {
    let (status, body) = memory_context_inner(&state, &user_id, query).await;
    (status, Json(body))
}

pub async fn get_memory_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let (status, body) = get_memory_inner(&state, &id).await;
    (status, Json(body))
}

pub async fn create_memory_handler(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<CreateMemory>,
) -> impl IntoResponse {
    let (status, body) = create_memory_inner(&state, req).await;
    (status, Json(body))
}

pub async fn update_memory_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<String>,
    Json(patch): Json<MemoryPatch>,
) -> impl IntoResponse {
    let (status, body) = update_memory_inner(&state, &id, patch).await;
    (status, Json(body))
}

pub async fn delete_memory_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let (status, body) = delete_memory_inner(&state, &id).await;
    (status, Json(body))
}

pub async fn delete_user_memories_handler(
    State(state): State<Arc<HttpState>>,
    Query(scope): Query<super::UserScope>,
) -> impl IntoResponse {
    let (status, body) = delete_user_memories_inner(&state, scope).await;
    (status, Json(body))
}

pub async fn list_tasks_handler(
    State(state): State<Arc<HttpState>>,
    Query(query): Query<TaskQuery>,
) -> impl IntoResponse {
    let (status, body) = list_tasks_inner(&state, query).await;
    (status, Json(body))
}

pub async fn create_task_handler(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<CreateTask>,
) -> impl IntoResponse {
    let (status, body) = create_task_inner(&state, req).await;
    (status, Json(body))
}

pub async fn update_task_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<String>,
    Json(patch): Json<TaskPatch>,
) -> impl IntoResponse {
    let (status, body) = update_task_inner(&state, &id, patch).await;
    (status, Json(body))
}

pub async fn delete_task_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let (status, body) = delete_task_inner(&state, &id).await;
    (status, Json(body))
}

pub async fn dashboard_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = dashboard_inner(&state).await;
    (status, Json(body))
}

pub async fn user_context_handler(
    State(state): State<Arc<HttpState>>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    let (status, body) = user_context_inner(&state, &user_id).await;
    (status, Json(body))
}

pub async fn intent_summary_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = intent_summary_inner(&state).await;
    (status, Json(body))
}
