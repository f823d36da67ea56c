//! Read-only aggregation for dashboards: counts, per-user context and the
//! intent frequency summary.

use chrono::{Local, TimeZone, Utc};
use serde::Serialize;
use sqlx::PgPool;
use std::sync::Arc;

use aria_core::error::Result;
use aria_core::models::{
    HabitFilter, HabitRecord, IntentFilter, IntentRecord, MemoryRecord, TaskRecord,
};
use aria_core::DocumentStore;

const MEMORIES_PER_CONVERSATION: i64 = 5;
const SUMMARY_LIMIT: i64 = 20;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopIntent {
    pub intent: String,
    pub count: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopHabit {
    pub intent: String,
    pub confidence: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub users: i64,
    pub memories: i64,
    pub intents: i64,
    pub habits: i64,
    pub conversations: i64,
    pub today_messages: i64,
    pub top_intents: Vec<TopIntent>,
    pub active_habits: Vec<TopHabit>,
    pub recent_memories: Vec<MemoryRecord>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserContext {
    pub user_id: String,
    pub memories: Vec<MemoryRecord>,
    pub habits: Vec<HabitRecord>,
    pub intents: Vec<IntentRecord>,
    pub tasks: Vec<TaskRecord>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct IntentSummaryRow {
    pub intent: String,
    pub total_count: i64,
    pub user_count: i64,
    pub avg_confidence: f64,
    pub max_count: i64,
    pub min_count: i64,
    #[sqlx(skip)]
    pub frequency: &'static str,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LedgerAnalytics {
    pub total_intents: i64,
    pub total_occurrences: i64,
    pub unique_user_count: i64,
    pub avg_confidence: f64,
    #[sqlx(skip)]
    pub top_intent: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentSummary {
    pub total: usize,
    pub summary: Vec<IntentSummaryRow>,
    pub analytics: LedgerAnalytics,
}

/// Coarse label for how often an intent occurs across all users.
pub fn frequency_band(total_count: i64) -> &'static str {
    match total_count {
        n if n >= 10 => "Very High",
        n if n >= 5 => "High",
        n if n >= 3 => "Medium",
        n if n >= 2 => "Low",
        _ => "Very Low",
    }
}

/// Memories are grouped into conversations of five messages.
pub fn conversation_count(memories: i64) -> i64 {
    (memories + MEMORIES_PER_CONVERSATION - 1) / MEMORIES_PER_CONVERSATION
}

async fn count(pool: &PgPool, sql: &str) -> Result<i64> {
    let n: i64 = sqlx::query_scalar(sql).fetch_one(pool).await?;
    Ok(n)
}

pub async fn dashboard(pool: &PgPool, store: &Arc<dyn DocumentStore>) -> Result<DashboardStats> {
    let start_of_day = Local::now()
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| Local.from_local_datetime(&midnight).earliest())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    let today_query = async {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*)::bigint FROM memories WHERE timestamp >= $1")
            .bind(start_of_day)
            .fetch_one(pool)
            .await?;
        Ok::<_, aria_core::AriaError>(n)
    };

    let recent_query = async {
        let rows = sqlx::query_as::<_, MemoryRecord>(
            "SELECT id, user_id, role, content, intent, entities, memory_type, timestamp, created_at \
             FROM memories ORDER BY timestamp DESC LIMIT 5",
        )
        .fetch_all(pool)
        .await?;
        Ok::<_, aria_core::AriaError>(rows)
    };

    let top_intents = IntentFilter {
        limit: Some(5),
        ..Default::default()
    };
    let active_habits = HabitFilter {
        active: Some(true),
        limit: Some(5),
        ..Default::default()
    };

    let (users, memories, intents, habits, today_messages, top, active, recent) = tokio::try_join!(
        count(pool, "SELECT COUNT(*)::bigint FROM users"),
        count(pool, "SELECT COUNT(*)::bigint FROM memories"),
        count(pool, "SELECT COUNT(*)::bigint FROM intents"),
        count(pool, "SELECT COUNT(*)::bigint FROM habits"),
        today_query,
        store.list_intents(&top_intents),
        store.list_habits(&active_habits),
        recent_query,
    )?;

    Ok(DashboardStats {
        users,
        memories,
        intents,
        habits,
        conversations: conversation_count(memories),
        today_messages,
        top_intents: top
            .into_iter()
            .map(|i| TopIntent {
                intent: i.intent,
                count: i.count,
            })
            .collect(),
        active_habits: active
            .into_iter()
            .map(|h| TopHabit {
                intent: h.intent,
                confidence: h.confidence,
            })
            .collect(),
        recent_memories: recent,
    })
}

pub async fn user_context(
    pool: &PgPool,
    store: &Arc<dyn DocumentStore>,
    user_id: &str,
) -> Result<UserContext> {
    let memories_query = async {
        let rows = sqlx::query_as::<_, MemoryRecord>(
            "SELECT id, user_id, role, content, intent, entities, memory_type, timestamp, created_at \
             FROM memories WHERE user_id = $1 ORDER BY timestamp DESC LIMIT 10",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;
        Ok::<_, aria_core::AriaError>(rows)
    };

    let habits = HabitFilter {
        user_id: Some(user_id.to_string()),
        active: Some(true),
        limit: None,
    };
    let intents = IntentFilter {
        user_id: Some(user_id.to_string()),
        min_count: None,
        limit: Some(10),
    };

    let (memories, habits, intents, tasks) = tokio::try_join!(
        memories_query,
        store.list_habits(&habits),
        store.list_intents(&intents),
        super::tasks::open_tasks(pool, user_id, 5),
    )?;

    Ok(UserContext {
        user_id: user_id.to_string(),
        memories,
        habits,
        intents,
        tasks,
    })
}

pub async fn intent_summary(pool: &PgPool) -> Result<IntentSummary> {
    let mut summary = sqlx::query_as::<_, IntentSummaryRow>(
        r#"
        SELECT
            intent,
            SUM(count)::bigint AS total_count,
            COUNT(DISTINCT user_id)::bigint AS user_count,
            ROUND(AVG(confidence)::numeric, 2)::float8 AS avg_confidence,
            MAX(count) AS max_count,
            MIN(count) AS min_count
        FROM intents
        GROUP BY intent
        ORDER BY total_count DESC, intent ASC
        LIMIT $1
        "#,
    )
    .bind(SUMMARY_LIMIT)
    .fetch_all(pool)
    .await?;

    for row in summary.iter_mut() {
        row.frequency = frequency_band(row.total_count);
    }

    let mut analytics = sqlx::query_as::<_, LedgerAnalytics>(
        r#"
        SELECT
            COUNT(*)::bigint AS total_intents,
            COALESCE(SUM(count), 0)::bigint AS total_occurrences,
            COUNT(DISTINCT user_id)::bigint AS unique_user_count,
            COALESCE(ROUND(AVG(confidence)::numeric, 3), 0)::float8 AS avg_confidence
        FROM intents
        "#,
    )
    .fetch_one(pool)
    .await?;
    analytics.top_intent = summary.first().map(|row| row.intent.clone());

    Ok(IntentSummary {
        total: summary.len(),
        summary,
        analytics,
    })
}
