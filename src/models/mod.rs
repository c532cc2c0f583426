//! Data models for Waypoint trees.
//!
//! This module defines the core data structures:
//! - `Node` - One journey, file or line waypoint in the tree
//! - `NodeKind` - Which of the three levels a node lives on
//! - `WaypointDocument` / `PersistedNode` - The on-disk JSON format (see [`document`])

pub mod document;

pub use document::{PersistedNode, WaypointDocument};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

/// Opaque node identifier.
pub type NodeId = String;

/// Maximum number of characters shown for a node name in listings.
pub const DISPLAY_NAME_LEN: usize = 35;

/// Level of a node in the journey → file → waypoint hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Journey,
    File,
    Waypoint,
}

impl NodeKind {
    /// Kind of the nodes found at `depth` (0 = root).
    pub fn from_depth(depth: usize) -> Option<Self> {
        match depth {
            0 => Some(Self::Journey),
            1 => Some(Self::File),
            2 => Some(Self::Waypoint),
            _ => None,
        }
    }

    /// Kind of this node's children, if it may have any.
    pub fn child_kind(&self) -> Option<Self> {
        match self {
            Self::Journey => Some(Self::File),
            Self::File => Some(Self::Waypoint),
            Self::Waypoint => None,
        }
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Journey => "journey",
            Self::File => "file",
            Self::Waypoint => "waypoint",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Optional attributes accepted by [`Node::create`].
#[derive(Debug, Clone, Default)]
pub struct NodeAttrs {
    pub identifier: Option<NodeId>,
    pub name: Option<String>,
    pub path: Option<String>,
    pub line: Option<u32>,
    pub updated_at: Option<i64>,
    pub comment: Option<String>,
}

/// A node in the waypoint tree.
///
/// A node owns its `children`. `parent` is a back-reference by identifier
/// only; it is never serialized and never keeps anything alive.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    /// Level in the hierarchy
    pub kind: NodeKind,

    /// Unique identifier (e.g., "1760832000000_4821")
    pub identifier: NodeId,

    /// Journey label, file path, or the trimmed text of the bookmarked line
    pub name: String,

    /// Workspace-relative path (files and waypoints)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// 1-based line number (waypoints only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,

    /// Last update, milliseconds since the Unix epoch
    pub updated_at: i64,

    /// Free-text note
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    /// Identifier of the owning node
    #[serde(skip)]
    pub parent: Option<NodeId>,

    /// Owned child nodes
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,
}

impl Node {
    /// Create a node, generating an identifier and a dated name when absent.
    pub fn create(kind: NodeKind, attrs: NodeAttrs) -> Self {
        let name = attrs
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(default_journey_name);
        Self {
            kind,
            identifier: attrs
                .identifier
                .filter(|id| !id.is_empty())
                .unwrap_or_else(generate_id),
            name,
            path: attrs.path,
            line: if kind == NodeKind::Waypoint {
                attrs.line
            } else {
                None
            },
            updated_at: attrs.updated_at.unwrap_or_else(now_millis),
            comment: attrs.comment,
            parent: None,
            children: Vec::new(),
        }
    }

    /// Create a new journey with the given display name.
    pub fn journey(name: &str) -> Self {
        Self::create(
            NodeKind::Journey,
            NodeAttrs {
                name: Some(name.to_string()),
                ..NodeAttrs::default()
            },
        )
    }

    /// Create a new file node for a workspace-relative path.
    pub fn file(path: &str) -> Self {
        Self::create(
            NodeKind::File,
            NodeAttrs {
                name: Some(path.to_string()),
                path: Some(path.to_string()),
                ..NodeAttrs::default()
            },
        )
    }

    /// Create a new line waypoint. `text` is the trimmed source line.
    pub fn waypoint(text: &str, line: u32, path: &str) -> Self {
        Self::create(
            NodeKind::Waypoint,
            NodeAttrs {
                name: Some(text.to_string()),
                path: Some(path.to_string()),
                line: Some(line),
                ..NodeAttrs::default()
            },
        )
    }

    /// Build a childless node from its persisted form.
    pub fn from_persisted(kind: NodeKind, persisted: &PersistedNode) -> Self {
        let name = match kind {
            NodeKind::File if persisted.name.is_empty() => persisted.path.clone(),
            _ => Some(persisted.name.clone()),
        };
        Self::create(
            kind,
            NodeAttrs {
                identifier: Some(persisted.identifier.clone()),
                name,
                path: persisted.path.clone(),
                line: persisted.line,
                updated_at: persisted.updated_at,
                comment: persisted.comment.clone(),
            },
        )
    }

    /// Attach `child`, pointing its parent reference here.
    ///
    /// The child inherits this node's path when it has none of its own.
    pub fn add_child(&mut self, mut child: Node) {
        child.parent = Some(self.identifier.clone());
        if child.path.is_none() {
            child.path = self.path.clone();
        }
        self.children.push(child);
    }

    /// Plain structure for serialization: every field except `parent`.
    pub fn to_persistable(&self) -> PersistedNode {
        PersistedNode {
            identifier: self.identifier.clone(),
            name: self.name.clone(),
            path: self.path.clone(),
            line: self.line,
            updated_at: match self.kind {
                NodeKind::Waypoint => None,
                _ => Some(self.updated_at),
            },
            comment: self.comment.clone(),
            children: self.children.iter().map(Node::to_persistable).collect(),
        }
    }

    /// Refresh `updated_at`.
    pub fn touch(&mut self) {
        self.updated_at = now_millis();
    }

    /// Name shortened for listings.
    pub fn display_name(&self) -> String {
        truncate_display(&self.name, DISPLAY_NAME_LEN)
    }
}

static LAST_ID_MILLIS: AtomicI64 = AtomicI64::new(0);

/// Generate a node identifier.
///
/// Format: `<millis>_<suffix>` where the millisecond part never repeats within
/// the process and the suffix is random. Uniqueness across processes is
/// best-effort.
pub fn generate_id() -> NodeId {
    let now = now_millis();
    let prev = LAST_ID_MILLIS
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(now.max(last + 1))
        })
        .unwrap_or(now);
    let millis = now.max(prev + 1);
    let suffix = uuid::Uuid::new_v4().as_u128() % 10_000;
    format!("{}_{}", millis, suffix)
}

/// Current time in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Name used for journeys created without one, e.g. "2026/10/19 09:30".
pub fn default_journey_name() -> String {
    Utc::now().format("%Y/%m/%d %H:%M").to_string()
}

/// Uppercase the first character.
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Truncate to at most `max` characters.
pub fn truncate_display(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Final component of a `/`-separated path.
pub fn basename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generate_id_uniqueness() {
        let ids: HashSet<NodeId> = (0..500).map(|_| generate_id()).collect();
        assert_eq!(ids.len(), 500);
    }

    #[test]
    fn test_generate_id_format() {
        let id = generate_id();
        let (millis, suffix) = id.split_once('_').unwrap();
        assert!(millis.parse::<i64>().is_ok());
        assert!(suffix.parse::<u32>().unwrap() < 10_000);
    }

    #[test]
    fn test_create_defaults_name_to_date() {
        let node = Node::create(NodeKind::Journey, NodeAttrs::default());
        // "YYYY/MM/DD HH:MM"
        assert_eq!(node.name.len(), 16);
        assert_eq!(&node.name[4..5], "/");
        assert!(!node.identifier.is_empty());
    }

    #[test]
    fn test_create_keeps_given_identifier() {
        let node = Node::create(
            NodeKind::File,
            NodeAttrs {
                identifier: Some("abc".to_string()),
                name: Some("src/main.rs".to_string()),
                ..NodeAttrs::default()
            },
        );
        assert_eq!(node.identifier, "abc");
    }

    #[test]
    fn test_line_dropped_for_non_waypoints() {
        let node = Node::create(
            NodeKind::File,
            NodeAttrs {
                line: Some(4),
                ..NodeAttrs::default()
            },
        );
        assert_eq!(node.line, None);
    }

    #[test]
    fn test_add_child_sets_parent_and_inherits_path() {
        let mut file = Node::file("src/lib.rs");
        let mut wp = Node::waypoint("fn main() {", 3, "ignored");
        wp.path = None;
        file.add_child(wp);

        let child = &file.children[0];
        assert_eq!(child.parent.as_deref(), Some(file.identifier.as_str()));
        assert_eq!(child.path.as_deref(), Some("src/lib.rs"));
    }

    #[test]
    fn test_add_child_keeps_own_path() {
        let mut journey = Node::journey("Refactor");
        journey.add_child(Node::file("a.rs"));
        assert_eq!(journey.children[0].path.as_deref(), Some("a.rs"));
    }

    #[test]
    fn test_to_persistable_is_recursive_and_parentless() {
        let mut journey = Node::journey("Bugs");
        let mut file = Node::file("a.rs");
        file.add_child(Node::waypoint("let a = 1;", 2, "a.rs"));
        journey.add_child(file);

        let persisted = journey.to_persistable();
        let json = serde_json::to_value(&persisted).unwrap();

        assert!(json.get("parent").is_none());
        let wp = &json["children"][0]["children"][0];
        assert!(wp.get("parent").is_none());
        assert_eq!(wp["line"], 2);
        assert!(wp.get("updatedAt").is_none());
        assert_eq!(json["children"][0]["path"], "a.rs");
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("hello world"), "Hello world");
        assert_eq!(capitalize("élan"), "Élan");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn test_display_name_truncates() {
        let node = Node::waypoint(&"x".repeat(80), 1, "a.rs");
        assert_eq!(node.display_name().chars().count(), DISPLAY_NAME_LEN);
    }

    #[test]
    fn test_basename() {
        assert_eq!(basename("src/models/mod.rs"), "mod.rs");
        assert_eq!(basename("README.md"), "README.md");
    }

    #[test]
    fn test_node_kind_from_depth() {
        assert_eq!(NodeKind::from_depth(0), Some(NodeKind::Journey));
        assert_eq!(NodeKind::from_depth(2), Some(NodeKind::Waypoint));
        assert_eq!(NodeKind::from_depth(3), None);
        assert_eq!(NodeKind::Waypoint.child_kind(), None);
    }
}
