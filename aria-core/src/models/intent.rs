use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ledger identity of an intent. `user_id = None` is a global intent and is a
/// key value of its own, never a wildcard.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentKey {
    pub user_id: Option<String>,
    pub intent: String,
}

impl IntentKey {
    pub fn new(user_id: Option<String>, intent: impl Into<String>) -> Self {
        Self {
            user_id,
            intent: intent.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct IntentRecord {
    pub id: Uuid,
    pub user_id: Option<String>,
    pub intent: String,
    pub count: i64,
    pub confidence: f64,
    pub entities: serde_json::Value,
    pub last_seen: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IntentRecord {
    pub fn key(&self) -> IntentKey {
        IntentKey::new(self.user_id.clone(), self.intent.clone())
    }
}

/// A ledger row written with an explicit count (bulk loads).
#[derive(Debug, Clone)]
pub struct NewIntent {
    pub key: IntentKey,
    pub count: i64,
    pub confidence: f64,
    pub entities: serde_json::Value,
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentPatch {
    pub intent: Option<String>,
    pub confidence: Option<f64>,
    pub entities: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default)]
pub struct IntentFilter {
    pub user_id: Option<String>,
    pub min_count: Option<i64>,
    pub limit: Option<i64>,
}
