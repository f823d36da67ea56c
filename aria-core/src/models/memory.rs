use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MEMORY_ROLES: [&str; 3] = ["user", "assistant", "system"];
pub const MEMORY_TYPES: [&str; 2] = ["short-term", "long-term"];

/// One conversational message kept for context retrieval.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MemoryRecord {
    pub id: Uuid,
    pub user_id: String,
    pub role: String,
    pub content: String,
    pub intent: String,
    pub entities: Vec<String>,
    pub memory_type: String,
    pub timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
