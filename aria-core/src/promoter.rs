//! Habit Promoter — at-most-once promotion of ledger keys to habits.
//!
//! Promotion rule:
//! - count < threshold → nothing happens, the store is not touched
//! - a habit already exists for the key (active or not) → already promoted
//! - otherwise insert one habit with `confidence = min(0.99, count / 10)`
//!
//! A unique-key violation on insert means a concurrent caller promoted the
//! same key first; it is reported as `AlreadyPromoted`, not as an error.

use serde::Serialize;
use std::sync::Arc;

use crate::error::{AriaError, Result};
use crate::models::{HabitRecord, IntentFilter, IntentKey, NewHabit, PromotionSource};
use crate::store::DocumentStore;

pub const DEFAULT_THRESHOLD: i64 = 3;

/// Upper bound for a promoted habit's confidence.
pub const MAX_CONFIDENCE: f64 = 0.99;

/// Trigger pattern recorded by the reactive (per-observation) pathway.
pub const REACTIVE_TRIGGER: &str = "detected by frequency";

/// Outcome of a single promotion attempt.
#[derive(Debug, Clone)]
pub enum Promotion {
    Promoted(HabitRecord),
    AlreadyPromoted,
    BelowThreshold,
}

impl Promotion {
    pub fn promoted(&self) -> bool {
        matches!(self, Self::Promoted(_))
    }

    pub fn habit(&self) -> Option<&HabitRecord> {
        match self {
            Self::Promoted(habit) => Some(habit),
            _ => None,
        }
    }
}

/// Result of a batch sweep over the ledger.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    /// Ledger rows at or above the threshold.
    pub checked: usize,
    /// Habits created by this sweep.
    pub promoted: Vec<HabitRecord>,
}

/// Confidence assigned at promotion time: linear in the count, capped at 0.99.
pub fn promotion_confidence(count: i64) -> f64 {
    (count as f64 / 10.0).clamp(0.0, MAX_CONFIDENCE)
}

/// Trigger pattern for sweep-style promotions.
pub fn frequency_trigger(count: i64) -> String {
    format!("frequency: {}x", count)
}

#[derive(Clone)]
pub struct HabitPromoter {
    store: Arc<dyn DocumentStore>,
    threshold: i64,
}

impl HabitPromoter {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_threshold(store, DEFAULT_THRESHOLD)
    }

    pub fn with_threshold(store: Arc<dyn DocumentStore>, threshold: i64) -> Self {
        Self { store, threshold }
    }

    pub fn threshold(&self) -> i64 {
        self.threshold
    }

    /// Reactive promotion right after an observation, using the configured threshold.
    pub async fn try_promote(&self, key: &IntentKey, count: i64) -> Result<Promotion> {
        self.try_promote_at(key, count, self.threshold).await
    }

    pub async fn try_promote_at(
        &self,
        key: &IntentKey,
        count: i64,
        threshold: i64,
    ) -> Result<Promotion> {
        if count < threshold {
            return Ok(Promotion::BelowThreshold);
        }
        self.promote(key, count, PromotionSource::Auto, REACTIVE_TRIGGER.to_string())
            .await
    }

    /// Sweep the whole ledger (or one user's part of it) with the configured threshold.
    pub async fn sweep_and_promote(&self, user_id: Option<&str>) -> Result<SweepReport> {
        self.sweep_at(self.threshold, user_id, PromotionSource::AutoDetect)
            .await
    }

    /// Sweep every ledger row with `count >= threshold`, promoting those without a habit.
    pub async fn sweep_at(
        &self,
        threshold: i64,
        user_id: Option<&str>,
        source: PromotionSource,
    ) -> Result<SweepReport> {
        if threshold < 1 {
            return Err(AriaError::validation(format!(
                "threshold must be at least 1, got {}",
                threshold
            )));
        }

        let filter = IntentFilter {
            user_id: user_id.map(str::to_string),
            min_count: Some(threshold),
            limit: None,
        };
        let candidates = self.store.list_intents(&filter).await?;

        let mut report = SweepReport {
            checked: candidates.len(),
            promoted: Vec::new(),
        };

        for candidate in candidates {
            let key = candidate.key();
            let trigger = frequency_trigger(candidate.count);
            if let Promotion::Promoted(habit) =
                self.promote(&key, candidate.count, source, trigger).await?
            {
                report.promoted.push(habit);
            }
        }

        tracing::info!(
            threshold,
            checked = report.checked,
            promoted = report.promoted.len(),
            pathway = %source,
            "habit sweep complete"
        );

        Ok(report)
    }

    async fn promote(
        &self,
        key: &IntentKey,
        count: i64,
        source: PromotionSource,
        trigger_pattern: String,
    ) -> Result<Promotion> {
        if self.store.find_habit(key).await?.is_some() {
            return Ok(Promotion::AlreadyPromoted);
        }

        let habit = NewHabit {
            key: key.clone(),
            confidence: promotion_confidence(count),
            trigger_pattern,
            notes: String::new(),
            frequency: count,
            promoted_from: source,
        };

        match self.store.insert_habit(&habit).await {
            Ok(record) => {
                tracing::info!(
                    intent = %record.intent,
                    user_id = ?record.user_id,
                    count,
                    pathway = %source,
                    "intent promoted to habit"
                );
                Ok(Promotion::Promoted(record))
            }
            Err(e) if e.is_duplicate() => Ok(Promotion::AlreadyPromoted),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HabitPatch, NewIntent};
    use crate::store::MemoryStore;
    use chrono::Utc;
    use futures::future::join_all;

    fn key(user: &str, intent: &str) -> IntentKey {
        IntentKey::new(Some(user.to_string()), intent)
    }

    async fn seed_count(store: &MemoryStore, user: &str, intent: &str, count: i64) {
        store
            .insert_intent(&NewIntent {
                key: key(user, intent),
                count,
                confidence: 0.9,
                entities: serde_json::json!({}),
                last_seen: Utc::now(),
            })
            .await
            .unwrap();
    }

    #[test]
    fn test_confidence_is_linear_and_capped() {
        assert!((promotion_confidence(3) - 0.3).abs() < 1e-9);
        assert!((promotion_confidence(7) - 0.7).abs() < 1e-9);
        assert_eq!(promotion_confidence(10), MAX_CONFIDENCE);
        assert_eq!(promotion_confidence(250), MAX_CONFIDENCE);
    }

    #[test]
    fn test_frequency_trigger_format() {
        assert_eq!(frequency_trigger(5), "frequency: 5x");
    }

    #[tokio::test]
    async fn test_below_threshold_never_creates_habit() {
        let store = Arc::new(MemoryStore::new());
        let promoter = HabitPromoter::new(store.clone());

        let outcome = promoter
            .try_promote(&key("u1", "add_task"), DEFAULT_THRESHOLD - 1)
            .await
            .unwrap();
        assert!(matches!(outcome, Promotion::BelowThreshold));
        assert!(store.find_habit(&key("u1", "add_task")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_promotes_at_threshold_with_snapshot() {
        let store = Arc::new(MemoryStore::new());
        let promoter = HabitPromoter::new(store.clone());

        let outcome = promoter
            .try_promote(&key("u1", "set_study_reminder"), 3)
            .await
            .unwrap();
        let habit = outcome.habit().expect("should promote").clone();

        assert_eq!(habit.frequency, 3);
        assert!(habit.active);
        assert_eq!(habit.promoted_from, PromotionSource::Auto);
        assert_eq!(habit.trigger_pattern, REACTIVE_TRIGGER);
        assert!((habit.confidence - 0.3).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_repeat_promotion_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let promoter = HabitPromoter::new(store.clone());
        let k = key("u1", "track_report");

        let first = promoter.try_promote(&k, 4).await.unwrap();
        assert!(first.promoted());

        for count in [4, 5, 9, 40] {
            let again = promoter.try_promote(&k, count).await.unwrap();
            assert!(matches!(again, Promotion::AlreadyPromoted));
        }

        let habit = store.find_habit(&k).await.unwrap().unwrap();
        assert_eq!(habit.frequency, 4);
        assert!((habit.confidence - 0.4).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_deactivated_habit_still_blocks_promotion() {
        let store = Arc::new(MemoryStore::new());
        let promoter = HabitPromoter::new(store.clone());
        let k = key("u1", "query_campaigns");

        let habit = promoter.try_promote(&k, 3).await.unwrap().habit().unwrap().clone();
        store
            .update_habit(
                habit.id,
                &HabitPatch {
                    active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let outcome = promoter.try_promote(&k, 12).await.unwrap();
        assert!(matches!(outcome, Promotion::AlreadyPromoted));
    }

    #[tokio::test]
    async fn test_concurrent_promotions_create_one_habit() {
        let store = Arc::new(MemoryStore::new());
        let promoter = HabitPromoter::new(store.clone());
        let k = key("u1", "set_standup_reminder");

        let attempts = (0..32).map(|_| {
            let promoter = promoter.clone();
            let k = k.clone();
            tokio::spawn(async move { promoter.try_promote(&k, 5).await })
        });

        let promoted = join_all(attempts)
            .await
            .into_iter()
            .map(|r| r.unwrap().unwrap())
            .filter(Promotion::promoted)
            .count();
        assert_eq!(promoted, 1);

        let habits = store.list_habits(&Default::default()).await.unwrap();
        assert_eq!(habits.len(), 1);
    }

    #[tokio::test]
    async fn test_sweep_checks_only_rows_at_threshold() {
        let store = Arc::new(MemoryStore::new());
        seed_count(&store, "u1", "a", 2).await;
        seed_count(&store, "u1", "b", 5).await;
        seed_count(&store, "u2", "c", 7).await;
        let promoter = HabitPromoter::new(store.clone());

        let report = promoter
            .sweep_at(5, None, PromotionSource::AutoDetect)
            .await
            .unwrap();
        assert_eq!(report.checked, 2);
        assert_eq!(report.promoted.len(), 2);
        assert!(report
            .promoted
            .iter()
            .all(|h| h.promoted_from == PromotionSource::AutoDetect));

        let c = store.find_habit(&key("u2", "c")).await.unwrap().unwrap();
        assert_eq!(c.trigger_pattern, "frequency: 7x");
        assert_eq!(c.frequency, 7);

        // Second sweep examines the same rows but promotes nothing new
        let again = promoter
            .sweep_at(5, None, PromotionSource::AutoDetect)
            .await
            .unwrap();
        assert_eq!(again.checked, 2);
        assert!(again.promoted.is_empty());
    }

    #[tokio::test]
    async fn test_sweep_skips_pre_existing_habits() {
        let store = Arc::new(MemoryStore::new());
        seed_count(&store, "u1", "b", 5).await;
        seed_count(&store, "u1", "c", 7).await;
        let promoter = HabitPromoter::new(store.clone());
        promoter.try_promote(&key("u1", "c"), 7).await.unwrap();

        let report = promoter
            .sweep_at(5, None, PromotionSource::AutoDetect)
            .await
            .unwrap();
        assert_eq!(report.checked, 2);
        assert_eq!(report.promoted.len(), 1);
        assert_eq!(report.promoted[0].intent, "b");
    }

    #[tokio::test]
    async fn test_sweep_user_filter() {
        let store = Arc::new(MemoryStore::new());
        seed_count(&store, "u1", "a", 3).await;
        seed_count(&store, "u2", "a", 3).await;
        let promoter = HabitPromoter::new(store.clone());

        let report = promoter.sweep_and_promote(Some("u2")).await.unwrap();
        assert_eq!(report.checked, 1);
        assert_eq!(report.promoted[0].user_id.as_deref(), Some("u2"));
        assert!(store.find_habit(&key("u1", "a")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sweep_rejects_zero_threshold() {
        let promoter = HabitPromoter::new(Arc::new(MemoryStore::new()));
        let err = promoter
            .sweep_at(0, None, PromotionSource::AutoDetect)
            .await
            .unwrap_err();
        assert!(matches!(err, AriaError::Validation(_)));
    }
}
