//! Frequency Ledger — per (user, intent) occurrence counters.
//!
//! Every observation is one atomic increment-or-insert in the store; the
//! ledger itself keeps no state. Validation runs before any store access.

use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

use crate::error::{AriaError, Result};
use crate::models::{IntentKey, IntentRecord};
use crate::store::{DocumentStore, IntentUpsert};

/// Confidence recorded when the caller supplies none.
pub const DEFAULT_CONFIDENCE: f64 = 0.9;

/// One intent observation as received from a caller.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub user_id: Option<String>,
    pub intent: Option<String>,
    pub confidence: Option<f64>,
    pub entities: Option<serde_json::Value>,
}

impl Observation {
    pub fn new(user_id: Option<&str>, intent: &str) -> Self {
        Self {
            user_id: user_id.map(str::to_string),
            intent: Some(intent.to_string()),
            ..Default::default()
        }
    }
}

#[derive(Clone)]
pub struct FrequencyLedger {
    store: Arc<dyn DocumentStore>,
    default_confidence: f64,
}

impl FrequencyLedger {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_default_confidence(store, DEFAULT_CONFIDENCE)
    }

    pub fn with_default_confidence(store: Arc<dyn DocumentStore>, default_confidence: f64) -> Self {
        Self {
            store,
            default_confidence,
        }
    }

    /// Record one observation and return the post-increment ledger row.
    pub async fn observe(&self, observation: Observation) -> Result<IntentRecord> {
        let upsert = self.prepare(observation)?;
        let record = self.store.upsert_intent(&upsert).await?;

        tracing::debug!(
            intent = %record.intent,
            user_id = ?record.user_id,
            count = record.count,
            "intent observed"
        );

        Ok(record)
    }

    fn prepare(&self, observation: Observation) -> Result<IntentUpsert> {
        let key = normalize_key(observation.user_id.as_deref(), observation.intent.as_deref())?;

        let confidence = match observation.confidence {
            Some(c) if !c.is_finite() || !(0.0..=1.0).contains(&c) => {
                return Err(AriaError::validation(format!(
                    "confidence must be between 0 and 1, got {}",
                    c
                )));
            }
            Some(c) => c,
            None => self.default_confidence,
        };

        let entities = match observation.entities {
            None | Some(serde_json::Value::Null) => serde_json::json!({}),
            Some(v @ serde_json::Value::Object(_)) => v,
            Some(_) => return Err(AriaError::validation("entities must be a JSON object")),
        };

        Ok(IntentUpsert {
            key,
            confidence,
            entities,
            seen_at: Utc::now(),
        })
    }
}

/// Build a ledger key: the intent name is required, a blank user id means "no user".
pub fn normalize_key(user_id: Option<&str>, intent: Option<&str>) -> Result<IntentKey> {
    let intent = intent.map(str::trim).unwrap_or_default();
    if intent.is_empty() {
        return Err(AriaError::validation("intent required"));
    }

    let user_id = user_id
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .map(str::to_string);

    Ok(IntentKey::new(user_id, intent))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use futures::future::join_all;

    fn ledger() -> FrequencyLedger {
        FrequencyLedger::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_first_observation_starts_at_one() {
        let ledger = ledger();
        let record = ledger
            .observe(Observation::new(Some("u1"), "set_study_reminder"))
            .await
            .unwrap();

        assert_eq!(record.count, 1);
        assert_eq!(record.confidence, DEFAULT_CONFIDENCE);
        assert_eq!(record.entities, serde_json::json!({}));
        assert_eq!(record.user_id.as_deref(), Some("u1"));
    }

    #[tokio::test]
    async fn test_observations_increment_and_overwrite() {
        let ledger = ledger();
        ledger
            .observe(Observation {
                user_id: Some("u1".to_string()),
                intent: Some("track_report".to_string()),
                confidence: Some(0.5),
                entities: Some(serde_json::json!({"department": "marketing"})),
            })
            .await
            .unwrap();

        let second = ledger
            .observe(Observation {
                user_id: Some("u1".to_string()),
                intent: Some("track_report".to_string()),
                confidence: Some(0.7),
                entities: Some(serde_json::json!({"frequency": "weekly"})),
            })
            .await
            .unwrap();

        assert_eq!(second.count, 2);
        assert_eq!(second.confidence, 0.7);
        // Replaced, not merged
        assert_eq!(second.entities, serde_json::json!({"frequency": "weekly"}));

        let third = ledger
            .observe(Observation::new(Some("u1"), "track_report"))
            .await
            .unwrap();
        assert_eq!(third.count, 3);
        assert_eq!(third.confidence, DEFAULT_CONFIDENCE);
        assert_eq!(third.entities, serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_missing_user_is_its_own_key() {
        let ledger = ledger();
        ledger.observe(Observation::new(None, "greet")).await.unwrap();
        ledger.observe(Observation::new(Some("u1"), "greet")).await.unwrap();
        let global = ledger.observe(Observation::new(Some("  "), "greet")).await.unwrap();

        assert_eq!(global.user_id, None);
        assert_eq!(global.count, 2);
    }

    #[tokio::test]
    async fn test_blank_intent_rejected() {
        let ledger = ledger();
        for intent in [None, Some(""), Some("   ")] {
            let err = ledger
                .observe(Observation {
                    user_id: Some("u1".to_string()),
                    intent: intent.map(str::to_string),
                    ..Default::default()
                })
                .await
                .unwrap_err();
            assert!(matches!(err, AriaError::Validation(_)), "got {:?}", err);
        }
    }

    #[tokio::test]
    async fn test_invalid_confidence_and_entities_rejected() {
        let ledger = ledger();
        let mut obs = Observation::new(Some("u1"), "greet");
        obs.confidence = Some(1.5);
        assert!(matches!(
            ledger.observe(obs).await,
            Err(AriaError::Validation(_))
        ));

        let mut obs = Observation::new(Some("u1"), "greet");
        obs.entities = Some(serde_json::json!(["not", "an", "object"]));
        assert!(matches!(
            ledger.observe(obs).await,
            Err(AriaError::Validation(_))
        ));

        // Nothing was written by the rejected calls
        let first = ledger.observe(Observation::new(Some("u1"), "greet")).await.unwrap();
        assert_eq!(first.count, 1);
    }

    #[tokio::test]
    async fn test_concurrent_observations_lose_no_increments() {
        let ledger = ledger();
        let calls = (0..64).map(|_| {
            let ledger = ledger.clone();
            tokio::spawn(async move {
                ledger
                    .observe(Observation::new(Some("u1"), "check_today_agenda"))
                    .await
            })
        });

        let results = join_all(calls).await;
        assert!(results.iter().all(|r| matches!(r, Ok(Ok(_)))));

        let last = ledger
            .observe(Observation::new(Some("u1"), "check_today_agenda"))
            .await
            .unwrap();
        assert_eq!(last.count, 65);
    }

    #[test]
    fn test_normalize_key_trims() {
        let key = normalize_key(Some(" u1 "), Some(" greet ")).unwrap();
        assert_eq!(key, IntentKey::new(Some("u1".to_string()), "greet"));
    }
}
