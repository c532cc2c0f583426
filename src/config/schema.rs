//! KDL schema for config.kdl.
//!
//! This module provides:
//! - `WaypointConfig` - The preferences a config.kdl file may set
//! - Serialization to and from KDL
//! - Validation and single-key updates for `wp config set`

use kdl::{KdlDocument, KdlEntry, KdlNode, KdlValue};
use serde::{Deserialize, Serialize};

/// Largest accepted `debounce-ms`.
pub const MAX_DEBOUNCE_MS: u64 = 60_000;

/// Keys understood in config.kdl.
pub const CONFIG_KEYS: &[&str] = &[
    "metadata-dir",
    "marker-file",
    "debounce-ms",
    "output-format",
    "action-log",
];

/// Output format preference for CLI commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// JSON output (default, machine-readable)
    #[default]
    Json,
    /// Human-readable output
    Human,
}

impl OutputFormat {
    /// Parse from string, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(OutputFormat::Json),
            "human" => Some(OutputFormat::Human),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Human => "human",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Preferences stored in config.kdl.
///
/// # KDL Schema
///
/// ```kdl
/// metadata-dir ".waypoint"
/// marker-file "waypoints.json"
/// debounce-ms 200
/// output-format "human"  // or "json"
/// action-log #false
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaypointConfig {
    /// Project-local folder holding the waypoint file
    pub metadata_dir: Option<String>,

    /// File name of the waypoint document
    pub marker_file: Option<String>,

    /// Quiet period of the watcher before reconciling
    pub debounce_ms: Option<u64>,

    /// Default output format for CLI commands
    pub output_format: Option<OutputFormat>,

    /// Whether to append to the action log
    pub action_log: Option<bool>,
}

impl WaypointConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the config values.
    ///
    /// Returns an error message if any value is invalid.
    pub fn validate(&self) -> Result<(), String> {
        for (key, value) in [
            ("metadata-dir", &self.metadata_dir),
            ("marker-file", &self.marker_file),
        ] {
            if let Some(value) = value {
                validate_path_component(key, value)?;
            }
        }
        if let Some(ms) = self.debounce_ms {
            if ms > MAX_DEBOUNCE_MS {
                return Err(format!(
                    "debounce-ms must be 0-{}, got {}",
                    MAX_DEBOUNCE_MS, ms
                ));
            }
        }
        Ok(())
    }

    /// Parse config from a KDL document. Unknown or mistyped values are ignored.
    pub fn from_kdl(doc: &KdlDocument) -> Self {
        let mut config = Self::new();

        config.metadata_dir = first_value(doc, "metadata-dir")
            .and_then(KdlValue::as_string)
            .map(String::from);

        config.marker_file = first_value(doc, "marker-file")
            .and_then(KdlValue::as_string)
            .map(String::from);

        config.debounce_ms = first_value(doc, "debounce-ms")
            .and_then(KdlValue::as_integer)
            .and_then(|i| u64::try_from(i).ok())
            .filter(|ms| *ms <= MAX_DEBOUNCE_MS);

        config.output_format = first_value(doc, "output-format")
            .and_then(KdlValue::as_string)
            .and_then(OutputFormat::parse);

        config.action_log = first_value(doc, "action-log").and_then(KdlValue::as_bool);

        config
    }

    /// Convert config to a KDL document.
    pub fn to_kdl(&self) -> KdlDocument {
        let mut doc = KdlDocument::new();

        if let Some(ref dir) = self.metadata_dir {
            push_node(&mut doc, "metadata-dir", KdlValue::String(dir.clone()));
        }
        if let Some(ref marker) = self.marker_file {
            push_node(&mut doc, "marker-file", KdlValue::String(marker.clone()));
        }
        if let Some(ms) = self.debounce_ms {
            push_node(&mut doc, "debounce-ms", KdlValue::Integer(ms as i128));
        }
        if let Some(format) = self.output_format {
            push_node(
                &mut doc,
                "output-format",
                KdlValue::String(format.as_str().to_string()),
            );
        }
        if let Some(enabled) = self.action_log {
            push_node(&mut doc, "action-log", KdlValue::Bool(enabled));
        }

        doc
    }

    /// Set one key from its textual form, as given to `wp config set`.
    pub fn set_key(&mut self, key: &str, value: &str) -> Result<(), String> {
        let value = value.trim();
        match key {
            "metadata-dir" => {
                validate_path_component(key, value)?;
                self.metadata_dir = Some(value.to_string());
            }
            "marker-file" => {
                validate_path_component(key, value)?;
                self.marker_file = Some(value.to_string());
            }
            "debounce-ms" => {
                let ms = value
                    .parse::<u64>()
                    .ok()
                    .filter(|ms| *ms <= MAX_DEBOUNCE_MS)
                    .ok_or_else(|| {
                        format!("debounce-ms must be 0-{}, got {}", MAX_DEBOUNCE_MS, value)
                    })?;
                self.debounce_ms = Some(ms);
            }
            "output-format" => {
                self.output_format = Some(OutputFormat::parse(value).ok_or_else(|| {
                    format!("output-format must be json or human, got {}", value)
                })?);
            }
            "action-log" => {
                self.action_log = Some(parse_bool(value).ok_or_else(|| {
                    format!("action-log must be true or false, got {}", value)
                })?);
            }
            _ => {
                return Err(format!(
                    "Unknown config key '{}'. Valid keys: {}",
                    key,
                    CONFIG_KEYS.join(", ")
                ));
            }
        }
        Ok(())
    }
}

fn first_value<'a>(doc: &'a KdlDocument, key: &str) -> Option<&'a KdlValue> {
    doc.get(key)
        .and_then(|node| node.entries().first())
        .map(|entry| entry.value())
}

fn push_node(doc: &mut KdlDocument, key: &str, value: KdlValue) {
    let mut node = KdlNode::new(key);
    node.push(KdlEntry::new(value));
    doc.nodes_mut().push(node);
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim_start_matches('#').to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// Names used as a single path component under the workspace.
fn validate_path_component(key: &str, value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err(format!("{} cannot be empty", key));
    }
    if value == "." || value == ".." || value.contains(['/', '\\']) {
        return Err(format!("{} must be a single file name, got {}", key, value));
    }
    Ok(())
}
