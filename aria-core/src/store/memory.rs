use async_trait::async_trait;
use chrono::Utc;
use std::cmp::Ordering;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{DocumentStore, IntentUpsert};
use crate::error::{AriaError, Result};
use crate::models::{
    HabitFilter, HabitPatch, HabitRecord, IntentFilter, IntentKey, IntentPatch, IntentRecord,
    NewHabit, NewIntent,
};

#[derive(Default)]
struct Tables {
    intents: HashMap<Uuid, IntentRecord>,
    intent_keys: HashMap<IntentKey, Uuid>,
    habits: HashMap<Uuid, HabitRecord>,
    habit_keys: HashMap<IntentKey, Uuid>,
}

/// In-process `DocumentStore`. Every operation holds the table lock for its
/// whole duration, which makes upserts and unique inserts atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn apply_limit<T>(mut rows: Vec<T>, limit: Option<i64>) -> Vec<T> {
    if let Some(limit) = limit {
        rows.truncate(limit.max(0) as usize);
    }
    rows
}

fn by_desc(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn upsert_intent(&self, upsert: &IntentUpsert) -> Result<IntentRecord> {
        let mut tables = self.tables.lock().await;

        if let Some(id) = tables.intent_keys.get(&upsert.key).copied() {
            if let Some(record) = tables.intents.get_mut(&id) {
                record.count += 1;
                record.confidence = upsert.confidence;
                record.entities = upsert.entities.clone();
                record.last_seen = upsert.seen_at;
                record.updated_at = Utc::now();
                return Ok(record.clone());
            }
        }

        let now = Utc::now();
        let record = IntentRecord {
            id: Uuid::new_v4(),
            user_id: upsert.key.user_id.clone(),
            intent: upsert.key.intent.clone(),
            count: 1,
            confidence: upsert.confidence,
            entities: upsert.entities.clone(),
            last_seen: upsert.seen_at,
            created_at: now,
            updated_at: now,
        };
        tables.intent_keys.insert(upsert.key.clone(), record.id);
        tables.intents.insert(record.id, record.clone());
        Ok(record)
    }

    async fn insert_intent(&self, intent: &NewIntent) -> Result<IntentRecord> {
        let mut tables = self.tables.lock().await;
        if tables.intent_keys.contains_key(&intent.key) {
            return Err(AriaError::DuplicateKey {
                user_id: intent.key.user_id.clone(),
                intent: intent.key.intent.clone(),
            });
        }

        let now = Utc::now();
        let record = IntentRecord {
            id: Uuid::new_v4(),
            user_id: intent.key.user_id.clone(),
            intent: intent.key.intent.clone(),
            count: intent.count,
            confidence: intent.confidence,
            entities: intent.entities.clone(),
            last_seen: intent.last_seen,
            created_at: now,
            updated_at: now,
        };
        tables.intent_keys.insert(intent.key.clone(), record.id);
        tables.intents.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_intent(&self, id: Uuid) -> Result<Option<IntentRecord>> {
        Ok(self.tables.lock().await.intents.get(&id).cloned())
    }

    async fn list_intents(&self, filter: &IntentFilter) -> Result<Vec<IntentRecord>> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<IntentRecord> = tables
            .intents
            .values()
            .filter(|r| filter.user_id.is_none() || r.user_id == filter.user_id)
            .filter(|r| filter.min_count.map_or(true, |min| r.count >= min))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.count.cmp(&a.count).then(b.last_seen.cmp(&a.last_seen)));
        Ok(apply_limit(rows, filter.limit))
    }

    async fn update_intent(&self, id: Uuid, patch: &IntentPatch) -> Result<Option<IntentRecord>> {
        let mut tables = self.tables.lock().await;
        let Some(current) = tables.intents.get(&id).cloned() else {
            return Ok(None);
        };

        let old_key = current.key();
        let new_key = IntentKey::new(
            current.user_id.clone(),
            patch
                .intent
                .as_deref()
                .map_or_else(|| current.intent.clone(), |i| i.trim().to_string()),
        );
        if new_key != old_key && tables.intent_keys.contains_key(&new_key) {
            return Err(AriaError::DuplicateKey {
                user_id: new_key.user_id,
                intent: new_key.intent,
            });
        }

        let mut updated = current;
        updated.intent = new_key.intent.clone();
        if let Some(confidence) = patch.confidence {
            updated.confidence = confidence;
        }
        if let Some(entities) = &patch.entities {
            updated.entities = entities.clone();
        }
        updated.updated_at = Utc::now();

        tables.intent_keys.remove(&old_key);
        tables.intent_keys.insert(new_key, id);
        tables.intents.insert(id, updated.clone());
        Ok(Some(updated))
    }

    async fn delete_intent(&self, id: Uuid) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        match tables.intents.remove(&id) {
            Some(record) => {
                tables.intent_keys.remove(&record.key());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find_habit(&self, key: &IntentKey) -> Result<Option<HabitRecord>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .habit_keys
            .get(key)
            .and_then(|id| tables.habits.get(id))
            .cloned())
    }

    async fn insert_habit(&self, habit: &NewHabit) -> Result<HabitRecord> {
        let mut tables = self.tables.lock().await;
        if tables.habit_keys.contains_key(&habit.key) {
            return Err(AriaError::DuplicateKey {
                user_id: habit.key.user_id.clone(),
                intent: habit.key.intent.clone(),
            });
        }

        let now = Utc::now();
        let record = HabitRecord {
            id: Uuid::new_v4(),
            user_id: habit.key.user_id.clone(),
            intent: habit.key.intent.clone(),
            confidence: habit.confidence,
            trigger_pattern: habit.trigger_pattern.clone(),
            notes: habit.notes.clone(),
            active: true,
            frequency: habit.frequency,
            promoted_from: habit.promoted_from,
            created_at: now,
            updated_at: now,
        };
        tables.habit_keys.insert(habit.key.clone(), record.id);
        tables.habits.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_habit(&self, id: Uuid) -> Result<Option<HabitRecord>> {
        Ok(self.tables.lock().await.habits.get(&id).cloned())
    }

    async fn list_habits(&self, filter: &HabitFilter) -> Result<Vec<HabitRecord>> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<HabitRecord> = tables
            .habits
            .values()
            .filter(|h| filter.user_id.is_none() || h.user_id == filter.user_id)
            .filter(|h| filter.active.map_or(true, |active| h.active == active))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            by_desc(a.confidence, b.confidence).then(b.created_at.cmp(&a.created_at))
        });
        Ok(apply_limit(rows, filter.limit))
    }

    async fn update_habit(&self, id: Uuid, patch: &HabitPatch) -> Result<Option<HabitRecord>> {
        let mut tables = self.tables.lock().await;
        let Some(current) = tables.habits.get(&id).cloned() else {
            return Ok(None);
        };

        let old_key = current.key();
        let new_key = IntentKey::new(
            current.user_id.clone(),
            patch
                .intent
                .as_deref()
                .map_or_else(|| current.intent.clone(), |i| i.trim().to_string()),
        );
        if new_key != old_key && tables.habit_keys.contains_key(&new_key) {
            return Err(AriaError::DuplicateKey {
                user_id: new_key.user_id,
                intent: new_key.intent,
            });
        }

        let mut updated = current;
        updated.intent = new_key.intent.clone();
        if let Some(confidence) = patch.confidence {
            updated.confidence = confidence;
        }
        if let Some(trigger_pattern) = &patch.trigger_pattern {
            updated.trigger_pattern = trigger_pattern.clone();
        }
        if let Some(notes) = &patch.notes {
            updated.notes = notes.clone();
        }
        if let Some(active) = patch.active {
            updated.active = active;
        }
        if let Some(frequency) = patch.frequency {
            updated.frequency = frequency;
        }
        updated.updated_at = Utc::now();

        tables.habit_keys.remove(&old_key);
        tables.habit_keys.insert(new_key, id);
        tables.habits.insert(id, updated.clone());
        Ok(Some(updated))
    }

    async fn delete_habit(&self, id: Uuid) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        match tables.habits.remove(&id) {
            Some(habit) => {
                tables.habit_keys.remove(&habit.key());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn health(&self) -> Result<String> {
        let tables = self.tables.lock().await;
        Ok(format!(
            "in-memory ({} intents, {} habits)",
            tables.intents.len(),
            tables.habits.len()
        ))
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn upsert(user: Option<&str>, intent: &str) -> IntentUpsert {
        IntentUpsert {
            key: IntentKey::new(user.map(str::to_string), intent),
            confidence: 0.9,
            entities: serde_json::json!({}),
            seen_at: Utc::now(),
        }
    }

    fn new_habit(user: Option<&str>, intent: &str) -> NewHabit {
        NewHabit {
            key: IntentKey::new(user.map(str::to_string), intent),
            confidence: 0.5,
            trigger_pattern: String::new(),
            notes: String::new(),
            frequency: 5,
            promoted_from: crate::models::PromotionSource::Manual,
        }
    }

    #[tokio::test]
    async fn test_global_and_user_keys_are_distinct() {
        let store = MemoryStore::new();
        store.upsert_intent(&upsert(None, "greet")).await.unwrap();
        store.upsert_intent(&upsert(Some("u1"), "greet")).await.unwrap();
        let global = store.upsert_intent(&upsert(None, "greet")).await.unwrap();

        assert_eq!(global.count, 2);
        assert_eq!(global.user_id, None);

        let all = store.list_intents(&IntentFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_insert_habit_rejects_duplicate_key() {
        let store = MemoryStore::new();
        store.insert_habit(&new_habit(Some("u1"), "greet")).await.unwrap();

        let err = store
            .insert_habit(&new_habit(Some("u1"), "greet"))
            .await
            .unwrap_err();
        assert!(err.is_duplicate());

        // Same intent for a different user is a different key
        store.insert_habit(&new_habit(Some("u2"), "greet")).await.unwrap();
    }

    #[tokio::test]
    async fn test_habit_rename_into_existing_key_rejected() {
        let store = MemoryStore::new();
        store.insert_habit(&new_habit(Some("u1"), "a")).await.unwrap();
        let b = store.insert_habit(&new_habit(Some("u1"), "b")).await.unwrap();

        let patch = HabitPatch {
            intent: Some("a".to_string()),
            ..Default::default()
        };
        assert!(store.update_habit(b.id, &patch).await.unwrap_err().is_duplicate());
    }

    #[tokio::test]
    async fn test_list_habits_filters_and_sorts() {
        let store = MemoryStore::new();
        let mut low = new_habit(Some("u1"), "low");
        low.confidence = 0.3;
        let mut high = new_habit(Some("u1"), "high");
        high.confidence = 0.9;
        store.insert_habit(&low).await.unwrap();
        let high = store.insert_habit(&high).await.unwrap();
        store.insert_habit(&new_habit(Some("u2"), "other")).await.unwrap();

        let patch = HabitPatch {
            active: Some(false),
            ..Default::default()
        };
        store.update_habit(high.id, &patch).await.unwrap();

        let u1 = store
            .list_habits(&HabitFilter {
                user_id: Some("u1".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(u1.len(), 2);
        assert_eq!(u1[0].intent, "high");

        let active = store
            .list_habits(&HabitFilter {
                user_id: Some("u1".to_string()),
                active: Some(true),
                limit: None,
            })
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].intent, "low");
    }

    #[tokio::test]
    async fn test_delete_intent_frees_key() {
        let store = MemoryStore::new();
        let first = store.upsert_intent(&upsert(Some("u1"), "greet")).await.unwrap();
        assert!(store.delete_intent(first.id).await.unwrap());
        assert!(!store.delete_intent(first.id).await.unwrap());

        let again = store.upsert_intent(&upsert(Some("u1"), "greet")).await.unwrap();
        assert_eq!(again.count, 1);
        assert_ne!(again.id, first.id);
    }
}
