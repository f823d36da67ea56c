//! Replay a JSON-lines file of observations through the ledger and the
//! reactive promotion rule, exactly as `POST /api/intents` would.
//!
//! One observation per line: `{"userId": "...", "intent": "...", "confidence": 0.8}`.
//! Blank lines and lines starting with `#` are ignored. Malformed or invalid
//! lines are skipped with a warning; storage errors abort the replay.

use serde::Serialize;
use std::path::Path;

use aria_core::error::{AriaError, Result};
use aria_core::{HabitEngine, Observation};

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayReport {
    pub observed: usize,
    pub promoted: usize,
    pub skipped: usize,
}

pub async fn replay_lines(engine: &HabitEngine, input: &str) -> Result<ReplayReport> {
    let mut report = ReplayReport::default();

    for (idx, line) in input.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let observation: Observation = match serde_json::from_str(line) {
            Ok(o) => o,
            Err(e) => {
                tracing::warn!(line = idx + 1, error = %e, "skipping malformed observation");
                report.skipped += 1;
                continue;
            }
        };

        match engine.log_intent(observation).await {
            Ok(logged) => {
                report.observed += 1;
                if logged.auto_promoted {
                    report.promoted += 1;
                }
            }
            Err(AriaError::Validation(msg)) => {
                tracing::warn!(line = idx + 1, error = %msg, "skipping invalid observation");
                report.skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }

    Ok(report)
}

pub async fn replay_file(engine: &HabitEngine, path: impl AsRef<Path>) -> Result<ReplayReport> {
    let path = path.as_ref();
    let input = tokio::fs::read_to_string(path).await?;
    let report = replay_lines(engine, &input).await?;

    tracing::info!(
        file = %path.display(),
        observed = report.observed,
        promoted = report.promoted,
        skipped = report.skipped,
        "replay complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aria_core::config::HabitConfig;
    use aria_core::models::IntentFilter;
    use aria_core::MemoryStore;
    use std::io::Write;
    use std::sync::Arc;

    fn engine() -> HabitEngine {
        HabitEngine::new(Arc::new(MemoryStore::new()), &HabitConfig::default())
    }

    #[tokio::test]
    async fn test_replay_counts_and_promotes_once() {
        let engine = engine();
        let input = r#"
# morning routine
{"userId": "u1", "intent": "weather"}
{"userId": "u1", "intent": "weather", "confidence": 0.7}

{"userId": "u1", "intent": "weather", "entities": {"city": "Oslo"}}
{"userId": "u1", "intent": "weather"}
"#;

        let report = replay_lines(&engine, input).await.unwrap();
        assert_eq!(report.observed, 4);
        assert_eq!(report.promoted, 1);
        assert_eq!(report.skipped, 0);

        let rows = engine
            .store()
            .list_intents(&IntentFilter::default())
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].count, 4);
        assert_eq!(rows[0].confidence, 0.9);
    }

    #[tokio::test]
    async fn test_replay_skips_bad_lines() {
        let engine = engine();
        let input = "not json\n{\"userId\": \"u1\"}\n{\"intent\": \"x\", \"confidence\": 2}\n{\"intent\": \"x\"}\n";

        let report = replay_lines(&engine, input).await.unwrap();
        assert_eq!(report.observed, 1);
        assert_eq!(report.skipped, 3);
        assert_eq!(report.promoted, 0);
    }

    #[tokio::test]
    async fn test_replay_file() {
        let engine = engine();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for _ in 0..3 {
            writeln!(file, r#"{{"intent": "news_briefing"}}"#).unwrap();
        }
        file.flush().unwrap();

        let report = replay_file(&engine, file.path()).await.unwrap();
        assert_eq!(report.observed, 3);
        assert_eq!(report.promoted, 1);
    }

    #[tokio::test]
    async fn test_replay_missing_file_is_io_error() {
        let engine = engine();
        let err = replay_file(&engine, "/nonexistent/aria/replay.jsonl")
            .await
            .unwrap_err();
        assert!(matches!(err, AriaError::Io(_)));
    }
}
