use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::intent::IntentKey;

/// Which pathway created a habit. Provenance only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PromotionSource {
    #[default]
    Manual,
    Auto,
    AutoDetect,
    SeedScript,
}

impl PromotionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Auto => "auto",
            Self::AutoDetect => "auto-detect",
            Self::SeedScript => "seed-script",
        }
    }
}

impl fmt::Display for PromotionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PromotionSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(Self::Manual),
            "auto" => Ok(Self::Auto),
            "auto-detect" => Ok(Self::AutoDetect),
            "seed-script" => Ok(Self::SeedScript),
            other => Err(format!("unknown promotion source '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitRecord {
    pub id: Uuid,
    pub user_id: Option<String>,
    pub intent: String,
    pub confidence: f64,
    pub trigger_pattern: String,
    pub notes: String,
    pub active: bool,
    /// Occurrence count at promotion time. Not linked to the ledger afterwards.
    pub frequency: i64,
    pub promoted_from: PromotionSource,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl HabitRecord {
    pub fn key(&self) -> IntentKey {
        IntentKey::new(self.user_id.clone(), self.intent.clone())
    }
}

#[derive(Debug, Clone)]
pub struct NewHabit {
    pub key: IntentKey,
    pub confidence: f64,
    pub trigger_pattern: String,
    pub notes: String,
    pub frequency: i64,
    pub promoted_from: PromotionSource,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitPatch {
    pub intent: Option<String>,
    pub confidence: Option<f64>,
    pub trigger_pattern: Option<String>,
    pub notes: Option<String>,
    pub active: Option<bool>,
    pub frequency: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct HabitFilter {
    pub user_id: Option<String>,
    pub active: Option<bool>,
    pub limit: Option<i64>,
}
