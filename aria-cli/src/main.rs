//! aria-cli — command-line client for the ARIA habit backend
//!
//! # Subcommands
//! - `log <intent> [--user <id>] [--confidence <c>]` — record one observation
//! - `detect [--threshold <n>] [--user <id>]`         — run a promotion sweep
//! - `habits [--user <id>] [--active]`                — list habits
//! - `status`                                          — show server health
//!
//! Every subcommand accepts `--json` to print the raw server response.

use clap::{Parser, Subcommand};
use serde::Deserialize;

const DEFAULT_SERVER: &str = "http://127.0.0.1:5000";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "aria-cli", version, about = "ARIA intent ledger and habit client")]
struct Cli {
    /// ARIA HTTP server URL (overrides ARIA_HTTP_URL env var)
    #[arg(long, env = "ARIA_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    /// Print the raw JSON response
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Record one intent observation
    Log {
        /// Intent name, e.g. set_study_reminder
        intent: String,

        /// User the observation belongs to; omit for a global intent
        #[arg(short, long)]
        user: Option<String>,

        /// Classifier confidence in [0, 1]
        #[arg(short, long)]
        confidence: Option<f64>,
    },

    /// Promote every intent at or above the threshold that has no habit yet
    Detect {
        #[arg(short, long)]
        threshold: Option<i64>,

        #[arg(short, long)]
        user: Option<String>,
    },

    /// List habits, highest confidence first
    Habits {
        #[arg(short, long)]
        user: Option<String>,

        /// Only active habits
        #[arg(long)]
        active: bool,
    },

    /// Show ARIA server status
    Status,
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggedIntent {
    pub intent: String,
    pub user_id: Option<String>,
    pub count: i64,
    pub confidence: f64,
    pub auto_promoted: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Habit {
    pub intent: String,
    pub user_id: Option<String>,
    pub confidence: f64,
    pub frequency: i64,
    pub active: bool,
    pub promoted_from: String,
    #[serde(default)]
    pub trigger_pattern: String,
}

#[derive(Debug, Deserialize)]
pub struct HabitList {
    pub total: usize,
    pub habits: Vec<Habit>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectResponse {
    pub promoted_count: usize,
    pub checked_count: usize,
    pub habits: Vec<Habit>,
}

// ============================================================================
// Formatting
// ============================================================================

fn user_label(user_id: Option<&str>) -> &str {
    user_id.unwrap_or("(global)")
}

pub fn format_logged(logged: &LoggedIntent) -> String {
    let mut line = format!(
        "{} [{}] count={} confidence={:.2}",
        logged.intent,
        user_label(logged.user_id.as_deref()),
        logged.count,
        logged.confidence
    );
    if logged.auto_promoted {
        line.push_str(" -> promoted to habit");
    }
    line
}

pub fn format_habit(habit: &Habit) -> String {
    let state = if habit.active { "active" } else { "inactive" };
    let mut line = format!(
        "{:<28} {:<16} {:>5.0}%  freq={:<4} {:<12} {}",
        habit.intent,
        user_label(habit.user_id.as_deref()),
        habit.confidence * 100.0,
        habit.frequency,
        habit.promoted_from,
        state
    );
    if !habit.trigger_pattern.is_empty() {
        line.push_str(&format!("  ({})", habit.trigger_pattern));
    }
    line
}

pub fn format_detect(resp: &DetectResponse) -> String {
    let mut out = format!(
        "checked {} intent(s), promoted {}",
        resp.checked_count, resp.promoted_count
    );
    for habit in &resp.habits {
        out.push('\n');
        out.push_str(&format_habit(habit));
    }
    out
}

/// Query pairs for optional filters; unset values are left out.
pub fn query_pairs(pairs: &[(&'static str, Option<String>)]) -> Vec<(&'static str, String)> {
    pairs
        .iter()
        .filter_map(|(k, v)| v.as_ref().map(|v| (*k, v.clone())))
        .collect()
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

fn client() -> anyhow::Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()?)
}

/// Send a request and return the JSON body, or the server's error message.
fn send(req: reqwest::blocking::RequestBuilder, url: &str) -> anyhow::Result<serde_json::Value> {
    let resp = req
        .send()
        .map_err(|e| anyhow::anyhow!("connection failed to {}: {}", url, e))?;

    let status = resp.status();
    let body: serde_json::Value = resp.json().unwrap_or_default();
    if !status.is_success() {
        let msg = body["error"].as_str().unwrap_or("no error message");
        anyhow::bail!("server returned {}: {}", status, msg);
    }
    Ok(body)
}

fn print_json(body: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(body)?);
    Ok(())
}

fn do_log(
    server: &str,
    intent: &str,
    user: Option<String>,
    confidence: Option<f64>,
    json_output: bool,
) -> anyhow::Result<()> {
    let url = format!("{}/api/intents", server);
    let payload = serde_json::json!({
        "userId": user,
        "intent": intent,
        "confidence": confidence,
    });

    let body = send(client()?.post(&url).json(&payload), &url)?;
    if json_output {
        return print_json(&body);
    }

    let logged: LoggedIntent = serde_json::from_value(body)?;
    println!("{}", format_logged(&logged));
    Ok(())
}

fn do_detect(
    server: &str,
    threshold: Option<i64>,
    user: Option<String>,
    json_output: bool,
) -> anyhow::Result<()> {
    let url = format!("{}/api/habits/detect", server);
    let query = query_pairs(&[
        ("threshold", threshold.map(|t| t.to_string())),
        ("userId", user),
    ]);

    let body = send(client()?.get(&url).query(&query), &url)?;
    if json_output {
        return print_json(&body);
    }

    let resp: DetectResponse = serde_json::from_value(body)?;
    println!("{}", format_detect(&resp));
    Ok(())
}

fn do_habits(
    server: &str,
    user: Option<String>,
    active_only: bool,
    json_output: bool,
) -> anyhow::Result<()> {
    let url = format!("{}/api/habits", server);
    let query = query_pairs(&[
        ("userId", user),
        ("active", active_only.then(|| "true".to_string())),
    ]);

    let body = send(client()?.get(&url).query(&query), &url)?;
    if json_output {
        return print_json(&body);
    }

    let list: HabitList = serde_json::from_value(body)?;
    if list.habits.is_empty() {
        eprintln!("No habits yet");
        return Ok(());
    }
    for habit in &list.habits {
        println!("{}", format_habit(habit));
    }
    Ok(())
}

/// Show the server status by calling GET /health.
fn do_status(server: &str, json_output: bool) -> anyhow::Result<()> {
    let url = format!("{}/health", server);
    let body = send(client()?.get(&url), &url)?;
    if json_output {
        return print_json(&body);
    }

    println!("ARIA server: {}", body["status"].as_str().unwrap_or("unknown"));
    println!("Version:     {}", body["version"].as_str().unwrap_or("?"));
    println!("Storage:     {}", body["storage"].as_str().unwrap_or("?"));
    println!("Detail:      {}", body["detail"].as_str().unwrap_or("?"));
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();

    let result = match cli.command {
        Commands::Log {
            intent,
            user,
            confidence,
        } => do_log(&server, &intent, user, confidence, cli.json),
        Commands::Detect { threshold, user } => do_detect(&server, threshold, user, cli.json),
        Commands::Habits { user, active } => do_habits(&server, user, active, cli.json),
        Commands::Status => do_status(&server, cli.json),
    };

    if let Err(e) = result {
        eprintln!("aria-cli: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================
