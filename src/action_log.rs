//! Action logging for `wp` commands.
//!
//! Every invocation is appended to `<data-dir>/action.log` as one JSON line,
//! unless `action-log #false` is configured.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

/// File name of the action log inside the data directory.
pub const ACTION_LOG_FILE: &str = "action.log";

/// Keys whose values are user prose rather than structure.
const PROSE_KEYS: &[&str] = &["comment", "text"];

/// Represents a single action log entry.
#[derive(Debug, Serialize, Deserialize)]
pub struct ActionLog {
    /// ISO 8601 timestamp when the action occurred
    pub timestamp: DateTime<Utc>,

    /// Workspace root the command ran against
    pub workspace: String,

    /// Command name (e.g., "journey add", "mark", "reconcile")
    pub command: String,

    /// Command arguments as JSON
    pub args: serde_json::Value,

    /// Whether the command succeeded
    pub success: bool,

    /// Error message if the command failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Command execution duration in milliseconds
    pub duration_ms: u64,

    /// User who executed the command
    pub user: String,
}

/// Path of the action log for a data directory.
pub fn log_path(data_dir: &Path) -> PathBuf {
    data_dir.join(ACTION_LOG_FILE)
}

/// Append an action to the log.
///
/// Never fails: write errors are logged as warnings and dropped.
pub fn log_action(
    log_path: &Path,
    workspace: &Path,
    command: &str,
    args: serde_json::Value,
    success: bool,
    error: Option<String>,
    duration_ms: u64,
) {
    let entry = ActionLog {
        timestamp: Utc::now(),
        workspace: workspace.to_string_lossy().to_string(),
        command: command.to_string(),
        args: sanitize_args(&args),
        success,
        error,
        duration_ms,
        user: get_current_user(),
    };

    if let Err(e) = write_log_entry(log_path, &entry) {
        warn!(error = %e, path = %log_path.display(), "Failed to write action log");
    }
}

/// Write a log entry to the log file.
fn write_log_entry(path: &Path, entry: &ActionLog) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string(entry)?;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", json)?;

    Ok(())
}

/// Shorten arguments before they are logged.
///
/// Comments are reduced to their length, absolute paths to their basename,
/// long strings and arrays to a summary.
fn sanitize_args(args: &serde_json::Value) -> serde_json::Value {
    match args {
        serde_json::Value::Object(map) => {
            let mut sanitized = serde_json::Map::new();
            for (key, value) in map {
                let redact = PROSE_KEYS.contains(&key.to_lowercase().as_str());
                let value = match value {
                    serde_json::Value::String(s) if redact => {
                        serde_json::Value::String(format!("[{} chars]", s.chars().count()))
                    }
                    other => sanitize_args(other),
                };
                sanitized.insert(key.clone(), value);
            }
            serde_json::Value::Object(sanitized)
        }
        serde_json::Value::Array(arr) => {
            if arr.len() > 10 {
                serde_json::Value::String(format!("[Array with {} items]", arr.len()))
            } else {
                serde_json::Value::Array(arr.iter().map(sanitize_args).collect())
            }
        }
        serde_json::Value::String(s) => {
            let sanitized = if Path::new(s).is_absolute() {
                s.rsplit(['/', '\\']).next().unwrap_or(s).to_string()
            } else {
                s.clone()
            };

            let chars = sanitized.chars().count();
            if chars > 100 {
                let head: String = sanitized.chars().take(97).collect();
                serde_json::Value::String(format!("{}... ({} chars)", head, chars))
            } else {
                serde_json::Value::String(sanitized)
            }
        }
        _ => args.clone(),
    }
}

/// Get the current user's username.
fn get_current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}
