//! ARIA HTTP REST API
//!
//! Axum-based HTTP server exposing the intent ledger, habit promotion and the
//! CRUD/aggregation surface for users, memories and tasks.
//!
//! Each endpoint has a thin axum handler that delegates to an inner function
//! returning `(StatusCode, serde_json::Value)`. The inner functions are called
//! directly from unit tests.
//!
//! Core endpoints:
//! - GET  /health, /api/health — health check with store status
//! - GET  /version             — server version info
//! - POST /api/intents         — observe an intent, promote on threshold
//! - GET  /api/intents         — `{total, intents}`, highest count first
//! - GET|PUT|DELETE /api/intents/:id
//! - GET  /api/habits/detect   — batch promotion sweep
//! - GET|POST /api/habits, GET|PUT|DELETE /api/habits/:id
//!
//! Resource endpoints (Postgres backend only) live in [`resources`].

pub mod resources;

use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use aria_core::error::AriaError;
use aria_core::ledger::normalize_key;
use aria_core::models::{HabitFilter, HabitPatch, IntentFilter, IntentPatch, NewHabit, PromotionSource};
use aria_core::{AriaConfig, HabitEngine, Observation};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Confidence given to manually created habits when the request has none.
pub const MANUAL_HABIT_CONFIDENCE: f64 = 0.85;

/// Shared state for all HTTP handlers
#[derive(Clone)]
pub struct HttpState {
    pub engine: HabitEngine,
    /// Present only with the Postgres backend.
    pub pool: Option<PgPool>,
    pub config: AriaConfig,
}

pub type HttpResponse = (StatusCode, serde_json::Value);

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/api/intents", get(list_intents_handler).post(log_intent_handler))
        .route(
            "/api/intents/:id",
            get(get_intent_handler)
                .put(update_intent_handler)
                .delete(delete_intent_handler),
        )
        .route("/api/habits/detect", get(detect_habits_handler))
        .route("/api/habits", get(list_habits_handler).post(create_habit_handler))
        .route(
            "/api/habits/:id",
            get(get_habit_handler)
                .put(update_habit_handler)
                .delete(delete_habit_handler),
        )
        .merge(resources::routes())
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    engine: HabitEngine,
    pool: Option<PgPool>,
    config: AriaConfig,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", config.http.host, config.http.port);
    let state = Arc::new(HttpState {
        engine,
        pool,
        config,
    });

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("ARIA HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request / Response DTOs
// ============================================================================

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UserScope {
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DetectQuery {
    pub threshold: Option<i64>,
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct HabitQuery {
    pub user_id: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CreateHabitRequest {
    pub user_id: Option<String>,
    pub intent: Option<String>,
    pub confidence: Option<f64>,
    pub trigger_pattern: Option<String>,
    pub notes: Option<String>,
    pub frequency: Option<i64>,
}

/// Standard HTTP error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub status: String,
}

impl ErrorResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            error: msg.into(),
            status: "error".to_string(),
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

pub fn error_body(status: StatusCode, msg: impl Into<String>) -> HttpResponse {
    let body = serde_json::to_value(ErrorResponse::new(msg))
        .unwrap_or_else(|_| serde_json::json!({ "status": "error" }));
    (status, body)
}

/// Map a domain error onto a status code and error body.
pub fn error_response(err: &AriaError) -> HttpResponse {
    match err {
        AriaError::Validation(msg) => error_body(StatusCode::BAD_REQUEST, msg.clone()),
        AriaError::DuplicateKey { .. } => error_body(StatusCode::CONFLICT, err.to_string()),
        AriaError::Conflict(msg) => error_body(StatusCode::CONFLICT, msg.clone()),
        AriaError::NotFound(msg) => error_body(StatusCode::NOT_FOUND, msg.clone()),
        other => {
            tracing::error!(error = %other, "request failed");
            error_body(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
        }
    }
}

/// Serialize a successful result, or map its error.
pub fn respond<T: Serialize>(status: StatusCode, result: aria_core::Result<T>) -> HttpResponse {
    match result {
        Ok(value) => match serde_json::to_value(value) {
            Ok(body) => (status, body),
            Err(e) => error_body(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        },
        Err(e) => error_response(&e),
    }
}

/// Like [`respond`], with `None` answered as 404.
pub fn respond_found<T: Serialize>(
    result: aria_core::Result<Option<T>>,
    what: &str,
) -> HttpResponse {
    match result {
        Ok(Some(value)) => respond(StatusCode::OK, Ok(value)),
        Ok(None) => error_body(StatusCode::NOT_FOUND, format!("{} not found", what)),
        Err(e) => error_response(&e),
    }
}

/// List responses are wrapped as `{"total": n, "<field>": [...]}`.
pub fn respond_list<T: Serialize>(field: &str, result: aria_core::Result<Vec<T>>) -> HttpResponse {
    match result {
        Ok(rows) => {
            let total = rows.len();
            match serde_json::to_value(rows) {
                Ok(list) => {
                    let mut body = serde_json::Map::new();
                    body.insert("total".to_string(), total.into());
                    body.insert(field.to_string(), list);
                    (StatusCode::OK, body.into())
                }
                Err(e) => error_body(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            }
        }
        Err(e) => error_response(&e),
    }
}

pub fn respond_deleted(result: aria_core::Result<bool>, what: &str) -> HttpResponse {
    match result {
        Ok(true) => (
            StatusCode::OK,
            serde_json::json!({ "message": format!("{} deleted", what) }),
        ),
        Ok(false) => error_body(StatusCode::NOT_FOUND, format!("{} not found", what)),
        Err(e) => error_response(&e),
    }
}

pub fn parse_id(raw: &str) -> std::result::Result<Uuid, HttpResponse> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| error_body(StatusCode::BAD_REQUEST, format!("invalid id '{}'", raw)))
}

/// Blank query values count as absent.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn check_confidence(confidence: Option<f64>) -> aria_core::Result<()> {
    match confidence {
        Some(c) if !c.is_finite() || !(0.0..=1.0).contains(&c) => Err(AriaError::validation(
            format!("confidence must be between 0 and 1, got {}", c),
        )),
        _ => Ok(()),
    }
}

/// Trim a renamed intent the same way observations are keyed; it must stay non-empty.
fn normalize_patch(intent: &mut Option<String>, confidence: Option<f64>) -> aria_core::Result<()> {
    if let Some(name) = intent.as_mut() {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(AriaError::validation("intent must not be empty"));
        }
        *name = trimmed.to_string();
    }
    check_confidence(confidence)
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

pub async fn health_inner(state: &HttpState) -> HttpResponse {
    let store = state.engine.store();
    match store.health().await {
        Ok(detail) => (
            StatusCode::OK,
            serde_json::json!({
                "status": "healthy",
                "version": env!("CARGO_PKG_VERSION"),
                "storage": store.name(),
                "detail": detail,
            }),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            serde_json::json!({
                "status": "unhealthy",
                "storage": store.name(),
                "error": e.to_string(),
            }),
        ),
    }
}

/// Inner version — returns version info (pure, no IO).
pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": "aria/1",
    })
}

/// Observe one intent; the response carries the ledger row and `autoPromoted`.
pub async fn log_intent_inner(state: &HttpState, observation: Observation) -> HttpResponse {
    respond(StatusCode::CREATED, state.engine.log_intent(observation).await)
}

pub async fn list_intents_inner(state: &HttpState, scope: UserScope) -> HttpResponse {
    let filter = IntentFilter {
        user_id: non_blank(scope.user_id),
        ..Default::default()
    };
    respond_list("intents", state.engine.store().list_intents(&filter).await)
}

pub async fn get_intent_inner(state: &HttpState, id: &str) -> HttpResponse {
    let id = match parse_id(id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    respond_found(state.engine.store().get_intent(id).await, "Intent")
}

pub async fn update_intent_inner(state: &HttpState, id: &str, mut patch: IntentPatch) -> HttpResponse {
    let id = match parse_id(id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    if let Err(e) = normalize_patch(&mut patch.intent, patch.confidence) {
        return error_response(&e);
    }
    respond_found(state.engine.store().update_intent(id, &patch).await, "Intent")
}

pub async fn delete_intent_inner(state: &HttpState, id: &str) -> HttpResponse {
    let id = match parse_id(id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    respond_deleted(state.engine.store().delete_intent(id).await, "Intent")
}

/// Sweep the ledger and promote every qualifying intent that has no habit yet.
pub async fn detect_habits_inner(state: &HttpState, query: DetectQuery) -> HttpResponse {
    let user_id = non_blank(query.user_id);
    let report = match state
        .engine
        .detect(query.threshold, user_id.as_deref(), PromotionSource::AutoDetect)
        .await
    {
        Ok(report) => report,
        Err(e) => return error_response(&e),
    };

    (
        StatusCode::OK,
        serde_json::json!({
            "promotedCount": report.promoted.len(),
            "habits": report.promoted,
            "checkedCount": report.checked,
        }),
    )
}

pub async fn list_habits_inner(state: &HttpState, query: HabitQuery) -> HttpResponse {
    let filter = HabitFilter {
        user_id: non_blank(query.user_id),
        active: query.active,
        limit: None,
    };
    respond_list("habits", state.engine.store().list_habits(&filter).await)
}

/// Administrative habit creation. A habit that already exists for the key is a 409.
pub async fn create_habit_inner(state: &HttpState, req: CreateHabitRequest) -> HttpResponse {
    let key = match normalize_key(req.user_id.as_deref(), req.intent.as_deref()) {
        Ok(key) => key,
        Err(e) => return error_response(&e),
    };
    if let Err(e) = check_confidence(req.confidence) {
        return error_response(&e);
    }

    let habit = NewHabit {
        key,
        confidence: req.confidence.unwrap_or(MANUAL_HABIT_CONFIDENCE),
        trigger_pattern: req.trigger_pattern.unwrap_or_default(),
        notes: req.notes.unwrap_or_default(),
        frequency: req.frequency.unwrap_or(0),
        promoted_from: PromotionSource::Manual,
    };

    let result = state.engine.store().insert_habit(&habit).await;
    if let Ok(created) = &result {
        tracing::info!(pathway = "manual", intent = %created.intent, "habit created");
    }
    respond(StatusCode::CREATED, result)
}

pub async fn get_habit_inner(state: &HttpState, id: &str) -> HttpResponse {
    let id = match parse_id(id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    respond_found(state.engine.store().get_habit(id).await, "Habit")
}

pub async fn update_habit_inner(state: &HttpState, id: &str, mut patch: HabitPatch) -> HttpResponse {
    let id = match parse_id(id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    if let Err(e) = normalize_patch(&mut patch.intent, patch.confidence) {
        return error_response(&e);
    }
    respond_found(state.engine.store().update_habit(id, &patch).await, "Habit")
}

pub async fn delete_habit_inner(state: &HttpState, id: &str) -> HttpResponse {
    let id = match parse_id(id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    respond_deleted(state.engine.store().delete_habit(id).await, "Habit")
}

// ============================================================================
// Axum handler wrappers (thin — delegate to inner functions)
// ============================================================================

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = health_inner(&state).await;
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

pub async fn log_intent_handler(
    State(state): State<Arc<HttpState>>,
    Json(observation): Json<Observation>,
) -> impl IntoResponse {
    let (status, body) = log_intent_inner(&state, observation).await;
    (status, Json(body))
}

pub async fn list_intents_handler(
    State(state): State<Arc<HttpState>>,
    Query(scope): Query<UserScope>,
) -> impl IntoResponse {
    let (status, body) = list_intents_inner(&state, scope).await;
    (status, Json(body))
}

pub async fn get_intent_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let (status, body) = get_intent_inner(&state, &id).await;
    (status, Json(body))
}

pub async fn update_intent_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<String>,
    Json(patch): Json<IntentPatch>,
) -> impl IntoResponse {
    let (status, body) = update_intent_inner(&state, &id, patch).await;
    (status, Json(body))
}

pub async fn delete_intent_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let (status, body) = delete_intent_inner(&state, &id).await;
    (status, Json(body))
}

pub async fn detect_habits_handler(
    State(state): State<Arc<HttpState>>,
    Query(query): Query<DetectQuery>,
) -> impl IntoResponse {
    let (status, body) = detect_habits_inner(&state, query).await;
    (status, Json(body))
}

pub async fn list_habits_handler(
    State(state): State<Arc<HttpState>>,
    Query(query): Query<HabitQuery>,
) -> impl IntoResponse {
    let (status, body) = list_habits_inner(&state, query).await;
    (status, Json(body))
}

pub async fn create_habit_handler(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<CreateHabitRequest>,
) -> impl IntoResponse {
    let (status, body) = create_habit_inner(&state, req).await;
    (status, Json(body))
}

pub async fn get_habit_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let (status, body) = get_habit_inner(&state, &id).await;
    (status, Json(body))
}

pub async fn update_habit_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<String>,
    Json(patch): Json<HabitPatch>,
) -> impl IntoResponse {
    let (status, body) = update_habit_inner(&state, &id, patch).await;
    (status, Json(body))
}

pub async fn delete_habit_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let (status, body) = delete_habit_inner(&state, &id).await;
    (status, Json(body))
}

// ============================================================================
// Unit Tests — call inner functions directly
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use aria_core::config::HabitConfig;
    use aria_core::MemoryStore;

    fn make_state() -> HttpState {
        let engine = HabitEngine::new(Arc::new(MemoryStore::new()), &HabitConfig::default());
        HttpState {
            engine,
            pool: None,
            config: AriaConfig::in_memory(),
        }
    }

    fn observe(user: &str, intent: &str) -> Observation {
        Observation::new(Some(user), intent)
    }

    #[test]
    fn test_version_inner_pure() {
        let v = version_inner();
        assert!(v["version"].is_string());
        assert_eq!(v["protocol"], "aria/1");
    }

    #[test]
    fn test_error_response_status_mapping() {
        let (status, body) = error_response(&AriaError::validation("intent required"));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "intent required");
        assert_eq!(body["status"], "error");

        let dup = AriaError::DuplicateKey {
            user_id: None,
            intent: "greet".to_string(),
        };
        assert_eq!(error_response(&dup).0, StatusCode::CONFLICT);
        assert_eq!(
            error_response(&AriaError::NotFound("Habit not found".into())).0,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            error_response(&AriaError::Other("boom".into())).0,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_non_blank_and_parse_id() {
        assert_eq!(non_blank(Some("  ".into())), None);
        assert_eq!(non_blank(Some(" u1 ".into())), Some("u1".to_string()));
        assert!(parse_id("not-a-uuid").is_err());
        assert!(parse_id(&Uuid::new_v4().to_string()).is_ok());
    }

    #[tokio::test]
    async fn test_health_inner_memory_store() {
        let state = make_state();
        let (status, body) = health_inner(&state).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["storage"], "memory");
    }

    #[tokio::test]
    async fn test_log_intent_promotes_on_third_observation() {
        let state = make_state();

        let (status, first) = log_intent_inner(&state, observe("u1", "set_study_reminder")).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(first["count"], 1);
        assert_eq!(first["autoPromoted"], false);

        log_intent_inner(&state, observe("u1", "set_study_reminder")).await;
        let (_, third) = log_intent_inner(&state, observe("u1", "set_study_reminder")).await;
        assert_eq!(third["count"], 3);
        assert_eq!(third["confidence"], 0.9);
        assert_eq!(third["autoPromoted"], true);

        let (_, fourth) = log_intent_inner(&state, observe("u1", "set_study_reminder")).await;
        assert_eq!(fourth["count"], 4);
        assert_eq!(fourth["autoPromoted"], false);

        let (_, habits) = list_habits_inner(
            &state,
            HabitQuery {
                user_id: Some("u1".into()),
                active: None,
            },
        )
        .await;
        assert_eq!(habits["total"], 1);
        let habits = habits["habits"].as_array().unwrap();
        assert_eq!(habits[0]["frequency"], 3);
        assert_eq!(habits[0]["promotedFrom"], "auto");
        assert_eq!(habits[0]["triggerPattern"], "detected by frequency");
    }

    #[tokio::test]
    async fn test_log_intent_missing_intent_is_400() {
        let state = make_state();
        let (status, body) = log_intent_inner(&state, Observation::default()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");

        let (_, intents) = list_intents_inner(&state, UserScope::default()).await;
        assert_eq!(intents["total"], 0);
        assert!(intents["intents"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_detect_reports_checked_and_promoted() {
        let state = make_state();
        for (intent, n) in [("a", 2), ("b", 5), ("c", 7)] {
            for _ in 0..n {
                // Ledger writes only, no reactive promotion.
                state
                    .engine
                    .store()
                    .upsert_intent(&aria_core::store::IntentUpsert {
                        key: aria_core::models::IntentKey::new(Some("u2".into()), intent),
                        confidence: 0.9,
                        entities: serde_json::json!({}),
                        seen_at: chrono::Utc::now(),
                    })
                    .await
                    .unwrap();
            }
        }

        let (status, body) = detect_habits_inner(
            &state,
            DetectQuery {
                threshold: Some(5),
                user_id: Some("u2".into()),
            },
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["checkedCount"], 2);
        assert_eq!(body["promotedCount"], 2);
        assert_eq!(body["habits"][0]["promotedFrom"], "auto-detect");

        let (_, again) = detect_habits_inner(
            &state,
            DetectQuery {
                threshold: Some(5),
                user_id: None,
            },
        )
        .await;
        assert_eq!(again["checkedCount"], 2);
        assert_eq!(again["promotedCount"], 0);
    }

    #[tokio::test]
    async fn test_detect_rejects_zero_threshold() {
        let state = make_state();
        let (status, _) = detect_habits_inner(
            &state,
            DetectQuery {
                threshold: Some(0),
                user_id: None,
            },
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_manual_habit_create_and_duplicate() {
        let state = make_state();
        let req = || CreateHabitRequest {
            user_id: Some("u3".into()),
            intent: Some("morning_news".into()),
            ..Default::default()
        };

        let (status, body) = create_habit_inner(&state, req()).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["promotedFrom"], "manual");
        assert_eq!(body["confidence"], MANUAL_HABIT_CONFIDENCE);
        assert_eq!(body["active"], true);

        let (status, body) = create_habit_inner(&state, req()).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn test_deactivated_habit_blocks_reactive_promotion() {
        let state = make_state();
        let (_, created) = create_habit_inner(
            &state,
            CreateHabitRequest {
                user_id: Some("u4".into()),
                intent: Some("play_music".into()),
                ..Default::default()
            },
        )
        .await;
        let id = created["id"].as_str().unwrap().to_string();

        let (status, updated) = update_habit_inner(
            &state,
            &id,
            HabitPatch {
                active: Some(false),
                ..Default::default()
            },
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["active"], false);

        for _ in 0..3 {
            let (_, body) = log_intent_inner(&state, observe("u4", "play_music")).await;
            assert_eq!(body["autoPromoted"], false);
        }
    }

    #[tokio::test]
    async fn test_habit_crud_not_found_paths() {
        let state = make_state();
        let missing = Uuid::new_v4().to_string();

        assert_eq!(get_habit_inner(&state, &missing).await.0, StatusCode::NOT_FOUND);
        assert_eq!(delete_habit_inner(&state, &missing).await.0, StatusCode::NOT_FOUND);
        assert_eq!(get_intent_inner(&state, &missing).await.0, StatusCode::NOT_FOUND);
        assert_eq!(get_habit_inner(&state, "xyz").await.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_intent_update_and_delete() {
        let state = make_state();
        let (_, logged) = log_intent_inner(&state, observe("u5", "weather")).await;
        let id = logged["id"].as_str().unwrap().to_string();

        let (status, updated) = update_intent_inner(
            &state,
            &id,
            IntentPatch {
                confidence: Some(0.4),
                ..Default::default()
            },
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["confidence"], 0.4);
        assert_eq!(updated["count"], 1);

        let (status, _) = update_intent_inner(
            &state,
            &id,
            IntentPatch {
                confidence: Some(1.5),
                ..Default::default()
            },
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        assert_eq!(delete_intent_inner(&state, &id).await.0, StatusCode::OK);
        assert_eq!(get_intent_inner(&state, &id).await.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_habit_rename_is_trimmed_and_keeps_blocking_promotion() {
        let state = make_state();
        let (_, created) = create_habit_inner(
            &state,
            CreateHabitRequest {
                user_id: Some("u7".into()),
                intent: Some("morning_news".into()),
                ..Default::default()
            },
        )
        .await;
        let id = created["id"].as_str().unwrap().to_string();

        let (status, renamed) = update_habit_inner(
            &state,
            &id,
            HabitPatch {
                intent: Some("  play_music ".into()),
                ..Default::default()
            },
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(renamed["intent"], "play_music");

        for _ in 0..3 {
            let (_, body) = log_intent_inner(&state, observe("u7", "play_music")).await;
            assert_eq!(body["autoPromoted"], false);
        }

        let filter = HabitQuery {
            user_id: Some("u7".into()),
            ..Default::default()
        };
        let (_, habits) = list_habits_inner(&state, filter).await;
        assert_eq!(habits["total"], 1);
    }

    #[tokio::test]
    async fn test_intent_rename_is_trimmed_and_blank_rejected() {
        let state = make_state();
        let (_, logged) = log_intent_inner(&state, observe("u8", "wether")).await;
        let id = logged["id"].as_str().unwrap().to_string();

        let (status, renamed) = update_intent_inner(
            &state,
            &id,
            IntentPatch {
                intent: Some(" weather\t".into()),
                ..Default::default()
            },
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(renamed["intent"], "weather");

        let (_, body) = log_intent_inner(&state, observe("u8", "weather")).await;
        assert_eq!(body["id"], id.as_str());
        assert_eq!(body["count"], 2);

        let (status, _) = update_intent_inner(
            &state,
            &id,
            IntentPatch {
                intent: Some("   ".into()),
                ..Default::default()
            },
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
