//! Demo data: three users with a short conversation trail each, ledger rows
//! with preset counts, then a promotion sweep tagged `seed-script`.
//!
//! Users and memories need Postgres. With the memory backend only the ledger
//! and habits are seeded and the demo usernames stand in for user ids.

use chrono::{Duration, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use aria_core::error::Result;
use aria_core::models::{HabitFilter, IntentFilter, IntentKey, NewIntent, PromotionSource};
use aria_core::HabitEngine;

struct DemoUser {
    username: &'static str,
    name: &'static str,
    email: &'static str,
    role: &'static str,
}

struct DemoMemory {
    user: usize,
    role: &'static str,
    content: &'static str,
    intent: &'static str,
    entities: &'static [&'static str],
    memory_type: &'static str,
    age_days: i64,
}

struct DemoIntent {
    user: usize,
    intent: &'static str,
    count: i64,
    confidence: f64,
    entities: &'static [(&'static str, &'static str)],
}

const USERS: [DemoUser; 3] = [
    DemoUser {
        username: "demo_admin",
        name: "Demo Admin",
        email: "admin@example.com",
        role: "admin",
    },
    DemoUser {
        username: "knowledge_worker",
        name: "Knowledge Worker",
        email: "knowledge@example.com",
        role: "analyst",
    },
    DemoUser {
        username: "student_demo",
        name: "Student Demo",
        email: "student@example.com",
        role: "student",
    },
];

const MEMORIES: [DemoMemory; 8] = [
    DemoMemory {
        user: 0,
        role: "user",
        content: "Set a standup reminder every weekday at 9am.",
        intent: "set_standup_reminder",
        entities: &["time:09:00", "recurrence:weekday"],
        memory_type: "short-term",
        age_days: 0,
    },
    DemoMemory {
        user: 0,
        role: "assistant",
        content: "I have scheduled a daily standup reminder at 9am.",
        intent: "confirm_reminder",
        entities: &["time:09:00"],
        memory_type: "short-term",
        age_days: 0,
    },
    DemoMemory {
        user: 1,
        role: "user",
        content: "Track weekly report for marketing metrics.",
        intent: "track_report",
        entities: &["department:marketing", "frequency:weekly"],
        memory_type: "long-term",
        age_days: 7,
    },
    DemoMemory {
        user: 1,
        role: "user",
        content: "Show me the top performing campaigns this month.",
        intent: "query_campaigns",
        entities: &["timeframe:this_month"],
        memory_type: "short-term",
        age_days: 1,
    },
    DemoMemory {
        user: 1,
        role: "assistant",
        content: "Here are the top three campaigns ranked by conversions.",
        intent: "answer_campaigns",
        entities: &["metric:conversions"],
        memory_type: "short-term",
        age_days: 1,
    },
    DemoMemory {
        user: 2,
        role: "user",
        content: "Remind me to study algorithms every evening at 7pm.",
        intent: "set_study_reminder",
        entities: &["topic:algorithms", "time:19:00"],
        memory_type: "long-term",
        age_days: 7,
    },
    DemoMemory {
        user: 2,
        role: "user",
        content: "Add a task to review database notes tomorrow.",
        intent: "add_task",
        entities: &["topic:databases", "time:tomorrow"],
        memory_type: "short-term",
        age_days: 1,
    },
    DemoMemory {
        user: 2,
        role: "assistant",
        content: "I have scheduled your algorithms study reminder.",
        intent: "confirm_study_reminder",
        entities: &["topic:algorithms"],
        memory_type: "short-term",
        age_days: 0,
    },
];

const INTENTS: [DemoIntent; 6] = [
    DemoIntent {
        user: 0,
        intent: "set_standup_reminder",
        count: 5,
        confidence: 0.95,
        entities: &[("time", "09:00"), ("recurrence", "weekday")],
    },
    DemoIntent {
        user: 0,
        intent: "check_today_agenda",
        count: 2,
        confidence: 0.9,
        entities: &[("timeframe", "today")],
    },
    DemoIntent {
        user: 1,
        intent: "track_report",
        count: 4,
        confidence: 0.92,
        entities: &[("department", "marketing"), ("frequency", "weekly")],
    },
    DemoIntent {
        user: 1,
        intent: "query_campaigns",
        count: 3,
        confidence: 0.9,
        entities: &[("timeframe", "this_month")],
    },
    DemoIntent {
        user: 2,
        intent: "set_study_reminder",
        count: 6,
        confidence: 0.96,
        entities: &[("topic", "algorithms"), ("time", "19:00")],
    },
    DemoIntent {
        user: 2,
        intent: "add_task",
        count: 2,
        confidence: 0.88,
        entities: &[("type", "study_task")],
    },
];

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedReport {
    pub users: usize,
    pub memories: usize,
    pub intents: usize,
    pub habits: usize,
}

fn entity_object(pairs: &[(&str, &str)]) -> serde_json::Value {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), serde_json::Value::from(*v)))
        .collect::<serde_json::Map<_, _>>()
        .into()
}

/// Create the demo users if missing and return their ids in seed order.
async fn upsert_users(pool: &PgPool) -> Result<Vec<String>> {
    let mut ids = Vec::with_capacity(USERS.len());
    for user in &USERS {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO users (username, name, email, preferences)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (username) DO UPDATE SET username = EXCLUDED.username
            RETURNING id
            "#,
        )
        .bind(user.username)
        .bind(user.name)
        .bind(user.email)
        .bind(serde_json::json!({ "theme": "dark", "language": "en", "role": user.role }))
        .fetch_one(pool)
        .await?;
        ids.push(id.to_string());
    }
    Ok(ids)
}

async fn insert_memories(pool: &PgPool, user_ids: &[String]) -> Result<usize> {
    sqlx::query("DELETE FROM memories").execute(pool).await?;

    let now = Utc::now();
    for memory in &MEMORIES {
        let entities: Vec<String> = memory.entities.iter().map(|e| e.to_string()).collect();
        sqlx::query(
            r#"
            INSERT INTO memories (user_id, role, content, intent, entities, memory_type, timestamp)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&user_ids[memory.user])
        .bind(memory.role)
        .bind(memory.content)
        .bind(memory.intent)
        .bind(&entities)
        .bind(memory.memory_type)
        .bind(now - Duration::days(memory.age_days))
        .execute(pool)
        .await?;
    }
    Ok(MEMORIES.len())
}

/// Remove every ledger row and habit so the sweep starts from a clean slate.
async fn clear_ledger(engine: &HabitEngine) -> Result<()> {
    let store = engine.store();
    for habit in store.list_habits(&HabitFilter::default()).await? {
        store.delete_habit(habit.id).await?;
    }
    for intent in store.list_intents(&IntentFilter::default()).await? {
        store.delete_intent(intent.id).await?;
    }
    Ok(())
}

pub async fn seed(engine: &HabitEngine, pool: Option<&PgPool>) -> Result<SeedReport> {
    let mut report = SeedReport::default();

    let user_ids = match pool {
        Some(pool) => {
            let ids = upsert_users(pool).await?;
            report.users = ids.len();
            tracing::info!(users = ?ids, "demo users ready");
            report.memories = insert_memories(pool, &ids).await?;
            ids
        }
        None => {
            tracing::warn!("no database pool: seeding ledger and habits only");
            USERS.iter().map(|u| u.username.to_string()).collect()
        }
    };

    clear_ledger(engine).await?;

    let now = Utc::now();
    for demo in &INTENTS {
        let intent = NewIntent {
            key: IntentKey::new(Some(user_ids[demo.user].clone()), demo.intent),
            count: demo.count,
            confidence: demo.confidence,
            entities: entity_object(demo.entities),
            last_seen: now,
        };
        engine.store().insert_intent(&intent).await?;
        report.intents += 1;
    }

    let sweep = engine
        .detect(None, None, PromotionSource::SeedScript)
        .await?;
    report.habits = sweep.promoted.len();

    tracing::info!(
        users = report.users,
        memories = report.memories,
        intents = report.intents,
        habits = report.habits,
        "seed complete"
    );
    Ok(report)
}
