//! On-disk JSON format of the waypoint file.
//!
//! Decoding is lenient: documents written by older versions use `false` or
//! `null` for absent values, `updated_at` instead of `updatedAt`, and
//! sometimes a string for the line number.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Root of the persisted document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaypointDocument {
    /// Name of the active journey; written as `false` when there is none
    #[serde(
        default,
        deserialize_with = "lenient_string",
        serialize_with = "string_or_false"
    )]
    pub active_journey: Option<String>,

    #[serde(default, deserialize_with = "lenient_children")]
    pub journeys: Vec<PersistedNode>,
}

impl WaypointDocument {
    /// Total number of nodes at every depth.
    pub fn node_count(&self) -> usize {
        fn count(nodes: &[PersistedNode]) -> usize {
            nodes.iter().map(|n| 1 + count(&n.children)).sum()
        }
        count(&self.journeys)
    }
}

/// A node as written to disk. Carries no parent reference and no kind;
/// the kind follows from depth.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedNode {
    #[serde(default, deserialize_with = "lenient_string_or_empty")]
    pub identifier: String,

    #[serde(default, deserialize_with = "lenient_string_or_empty")]
    pub name: String,

    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub path: Option<String>,

    #[serde(
        default,
        deserialize_with = "lenient_line",
        skip_serializing_if = "Option::is_none"
    )]
    pub line: Option<u32>,

    #[serde(
        default,
        alias = "updated_at",
        deserialize_with = "lenient_millis",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<i64>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub comment: Option<String>,

    #[serde(default, deserialize_with = "lenient_children")]
    pub children: Vec<PersistedNode>,
}

fn string_or_false<S>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(s) => serializer.serialize_str(s),
        None => serializer.serialize_bool(false),
    }
}

/// Strings pass through; `false`, `null` and empty strings become `None`.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_string_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_string(deserializer)?.unwrap_or_default())
}

/// Positive integers or numeric strings; anything else is absent.
fn lenient_line<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let line = match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    };
    Ok(line.filter(|l| *l >= 1))
}

fn lenient_millis<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    })
}

fn lenient_children<'de, D>(deserializer: D) -> Result<Vec<PersistedNode>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .filter(|item| item.is_object())
            .map(|item| serde_json::from_value(item).map_err(serde::de::Error::custom))
            .collect(),
        _ => Ok(Vec::new()),
    }
}
