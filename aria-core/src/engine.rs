//! Ledger + promoter wired together: the reactive intent-log pathway and the
//! sweep pathway share one store and one threshold.

use serde::Serialize;
use std::sync::Arc;

use crate::config::HabitConfig;
use crate::error::Result;
use crate::ledger::{FrequencyLedger, Observation};
use crate::models::{HabitRecord, IntentRecord, PromotionSource};
use crate::promoter::{HabitPromoter, Promotion, SweepReport};
use crate::store::DocumentStore;

/// An observation's ledger row plus whether it triggered a promotion.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggedIntent {
    #[serde(flatten)]
    pub record: IntentRecord,
    pub auto_promoted: bool,
    #[serde(skip)]
    pub habit: Option<HabitRecord>,
}

#[derive(Clone)]
pub struct HabitEngine {
    store: Arc<dyn DocumentStore>,
    ledger: FrequencyLedger,
    promoter: HabitPromoter,
}

impl HabitEngine {
    pub fn new(store: Arc<dyn DocumentStore>, config: &HabitConfig) -> Self {
        Self {
            ledger: FrequencyLedger::with_default_confidence(
                store.clone(),
                config.default_confidence,
            ),
            promoter: HabitPromoter::with_threshold(store.clone(), config.threshold),
            store,
        }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn threshold(&self) -> i64 {
        self.promoter.threshold()
    }

    /// Observe an intent, then promote it if the new count reaches the threshold.
    pub async fn log_intent(&self, observation: Observation) -> Result<LoggedIntent> {
        let record = self.ledger.observe(observation).await?;
        let promotion = self.promoter.try_promote(&record.key(), record.count).await?;

        let habit = match promotion {
            Promotion::Promoted(habit) => Some(habit),
            Promotion::AlreadyPromoted | Promotion::BelowThreshold => None,
        };

        Ok(LoggedIntent {
            auto_promoted: habit.is_some(),
            habit,
            record,
        })
    }

    /// Batch detection over the ledger. `threshold` falls back to the configured one.
    pub async fn detect(
        &self,
        threshold: Option<i64>,
        user_id: Option<&str>,
        source: PromotionSource,
    ) -> Result<SweepReport> {
        let threshold = threshold.unwrap_or_else(|| self.promoter.threshold());
        self.promoter.sweep_at(threshold, user_id, source).await
    }
}
