//! Command implementations for the `wp` CLI.
//!
//! Each function drives a [`Session`] and returns a result that prints as
//! JSON (default) or as human-readable text:
//! - `show` / `files` - Inspect the forest
//! - `journey_*` - Journey management
//! - `mark` / `rm` / `comment` / `mv` - Waypoint edits
//! - `next` / `prev` - Sequential navigation
//! - `reconcile` - Re-anchor waypoints after files changed
//! - `config_*` - Configuration

use crate::config::{ConfigPaths, ResolvedConfig, read_config_file, write_config_file};
use crate::models::{Node, NodeKind};
use crate::reconcile::ReconcileReport;
use crate::session::Session;
use crate::tree::WaypointToggle;
use crate::{Error, Result};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::PathBuf;

/// Command results that can be serialized to JSON or formatted for humans.
pub trait Output {
    /// Serialize to JSON string.
    fn to_json(&self) -> String;

    /// Format for human-readable output.
    fn to_human(&self) -> String;
}

fn json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| format!(r#"{{"error": "{}"}}"#, e))
}

fn waypoint_line(node: &Node) -> String {
    let mut line = format!(
        "{}:{}  {}",
        node.path.as_deref().unwrap_or("?"),
        node.line.unwrap_or(0),
        node.display_name()
    );
    if let Some(ref comment) = node.comment {
        let _ = write!(line, "  # {}", comment);
    }
    line
}

// === Show ===

/// The whole forest.
#[derive(Serialize)]
pub struct ForestView {
    pub active_journey: Option<String>,
    pub journeys: Vec<Node>,
}

impl Output for ForestView {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.journeys.is_empty() {
            return "No journeys. Bookmark a line with `wp mark <file> <line>`.".to_string();
        }
        let mut out = String::new();
        for journey in &self.journeys {
            let marker = if self.active_journey.as_deref() == Some(journey.name.as_str()) {
                "*"
            } else {
                " "
            };
            let _ = writeln!(out, "{} {} [{}]", marker, journey.display_name(), journey.identifier);
            for file in &journey.children {
                let _ = writeln!(out, "    {} [{}]", file.name, file.identifier);
                for wp in &file.children {
                    let _ = writeln!(
                        out,
                        "      {:>5}: {} [{}]",
                        wp.line.unwrap_or(0),
                        wp.display_name(),
                        wp.identifier
                    );
                }
            }
        }
        out.trim_end().to_string()
    }
}

/// One node with its position.
#[derive(Serialize)]
pub struct NodeDetail {
    pub node: Node,
    pub parent: Option<String>,
}

impl Output for NodeDetail {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let node = &self.node;
        let mut out = format!("{} {}\n", node.kind, node.identifier);
        let _ = writeln!(out, "  Name: {}", node.name);
        if let Some(ref path) = node.path {
            let _ = writeln!(out, "  Path: {}", path);
        }
        if let Some(line) = node.line {
            let _ = writeln!(out, "  Line: {}", line);
        }
        if let Some(ref comment) = node.comment {
            let _ = writeln!(out, "  Comment: {}", comment);
        }
        if let Some(ref parent) = self.parent {
            let _ = writeln!(out, "  Parent: {}", parent);
        }
        if node.kind != NodeKind::Waypoint {
            let _ = writeln!(out, "  Children: {}", node.children.len());
        }
        out.trim_end().to_string()
    }
}

/// Either the forest or a single node.
pub enum ShowResult {
    Forest(ForestView),
    Node(NodeDetail),
}

impl Output for ShowResult {
    fn to_json(&self) -> String {
        match self {
            ShowResult::Forest(v) => v.to_json(),
            ShowResult::Node(v) => v.to_json(),
        }
    }

    fn to_human(&self) -> String {
        match self {
            ShowResult::Forest(v) => v.to_human(),
            ShowResult::Node(v) => v.to_human(),
        }
    }
}

pub fn show(session: &Session, id: Option<&str>) -> Result<ShowResult> {
    let tree = session.tree();
    match id {
        None => Ok(ShowResult::Forest(ForestView {
            active_journey: tree.active_journey_name().map(String::from),
            journeys: tree.journeys().to_vec(),
        })),
        Some(id) => {
            let node = tree
                .find(id)
                .cloned()
                .ok_or_else(|| Error::NotFound(format!("Node {}", id)))?;
            Ok(ShowResult::Node(NodeDetail {
                parent: tree.parent_of(id).map(|p| p.identifier.clone()),
                node,
            }))
        }
    }
}

// === Journeys ===

#[derive(Serialize)]
pub struct JourneyAdded {
    pub identifier: String,
    pub name: String,
    pub active: bool,
}

impl Output for JourneyAdded {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        format!("Active journey: {} [{}]", self.name, self.identifier)
    }
}

pub fn journey_add(session: &mut Session, name: Option<&str>) -> Result<JourneyAdded> {
    let journey = session.add_journey(name)?;
    Ok(JourneyAdded {
        identifier: journey.identifier,
        name: journey.name,
        active: true,
    })
}

#[derive(Serialize)]
pub struct JourneyRenamed {
    pub old: String,
    pub new: String,
}

impl Output for JourneyRenamed {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        format!("Renamed journey {} to {}", self.old, self.new)
    }
}

pub fn journey_rename(session: &mut Session, old: &str, new: &str) -> Result<JourneyRenamed> {
    session.rename_journey(new, old)?;
    Ok(JourneyRenamed {
        old: old.to_string(),
        new: new.trim().to_string(),
    })
}

pub fn journey_activate(session: &mut Session, name: &str) -> Result<JourneyAdded> {
    let journey = session
        .activate_journey(name)?
        .ok_or_else(|| Error::NotFound(format!("Journey {:?}", name)))?;
    Ok(JourneyAdded {
        identifier: journey.identifier,
        name: journey.name,
        active: true,
    })
}

#[derive(Serialize)]
pub struct JourneySummary {
    pub identifier: String,
    pub name: String,
    pub active: bool,
    pub files: usize,
    pub waypoints: usize,
    pub updated_at: i64,
}

#[derive(Serialize)]
pub struct JourneyList {
    pub journeys: Vec<JourneySummary>,
    pub count: usize,
}

impl Output for JourneyList {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.journeys.is_empty() {
            return "No journeys.".to_string();
        }
        let mut out = format!("{} journey(s):\n", self.count);
        for j in &self.journeys {
            let _ = writeln!(
                out,
                "{} {}  ({} files, {} waypoints) [{}]",
                if j.active { "*" } else { " " },
                j.name,
                j.files,
                j.waypoints,
                j.identifier
            );
        }
        out.trim_end().to_string()
    }
}

pub fn journey_list(session: &Session) -> JourneyList {
    let tree = session.tree();
    let active = tree.active_journey_name();
    let journeys: Vec<JourneySummary> = tree
        .journeys()
        .iter()
        .map(|j| JourneySummary {
            identifier: j.identifier.clone(),
            name: j.name.clone(),
            active: active == Some(j.name.as_str()),
            files: j.children.len(),
            waypoints: j.children.iter().map(|f| f.children.len()).sum(),
            updated_at: j.updated_at,
        })
        .collect();
    JourneyList {
        count: journeys.len(),
        journeys,
    }
}

// === Waypoints ===

#[derive(Serialize)]
pub struct MarkResult {
    pub action: &'static str,
    pub identifier: String,
    pub path: String,
    pub line: u32,
    pub journey: Option<String>,
}

impl Output for MarkResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let verb = if self.action == "created" { "Added" } else { "Removed" };
        format!(
            "{} waypoint {}:{} [{}]",
            verb, self.path, self.line, self.identifier
        )
    }
}

pub fn mark(session: &mut Session, file: &str, line: u32) -> Result<MarkResult> {
    let toggle = session.mark(file, line)?;
    Ok(MarkResult {
        action: match toggle {
            WaypointToggle::Created(_) => "created",
            WaypointToggle::Removed(_) => "removed",
        },
        identifier: toggle.identifier().to_string(),
        path: session.relative_path(file)?,
        line,
        journey: session.tree().active_journey_name().map(String::from),
    })
}

#[derive(Serialize)]
pub struct RemoveFailure {
    pub identifier: String,
    pub error: String,
}

#[derive(Serialize)]
pub struct RemoveResult {
    pub removed: Vec<String>,
    pub failed: Vec<RemoveFailure>,
}

impl Output for RemoveResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let mut out = format!("Removed {} node(s)", self.removed.len());
        for f in &self.failed {
            let _ = write!(out, "\n  {}: {}", f.identifier, f.error);
        }
        out
    }
}

/// Remove nodes. Fails only when nothing could be removed.
pub fn rm(session: &mut Session, ids: &[String]) -> Result<RemoveResult> {
    let mut result = RemoveResult {
        removed: Vec::new(),
        failed: Vec::new(),
    };
    let mut first_error = None;
    for (id, outcome) in ids.iter().zip(session.remove(ids)?) {
        match outcome {
            Ok(node) => result.removed.push(node.identifier),
            Err(e) => {
                result.failed.push(RemoveFailure {
                    identifier: id.clone(),
                    error: e.to_string(),
                });
                first_error.get_or_insert(e);
            }
        }
    }
    match first_error {
        Some(e) if result.removed.is_empty() => Err(e),
        _ => Ok(result),
    }
}

#[derive(Serialize)]
pub struct CommentResult {
    pub identifier: String,
    pub comment: Option<String>,
}

impl Output for CommentResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        match self.comment {
            Some(ref c) => format!("Comment on {}: {}", self.identifier, c),
            None => format!("Cleared comment on {}", self.identifier),
        }
    }
}

pub fn comment(session: &mut Session, id: &str, text: Option<&str>) -> Result<CommentResult> {
    session.set_comment(id, text)?;
    Ok(CommentResult {
        identifier: id.to_string(),
        comment: session.tree().find(id).and_then(|n| n.comment.clone()),
    })
}

#[derive(Serialize)]
pub struct MoveResult {
    pub old: String,
    pub new: String,
    pub files_moved: usize,
}

impl Output for MoveResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        format!(
            "Moved {} -> {} ({} journey(s))",
            self.old, self.new, self.files_moved
        )
    }
}

pub fn mv(session: &mut Session, old: &str, new: &str) -> Result<MoveResult> {
    let files_moved = session.rename_file(old, new)?;
    Ok(MoveResult {
        old: session.relative_path(old)?,
        new: session.relative_path(new)?,
        files_moved,
    })
}

#[derive(Serialize)]
pub struct StoredFile {
    pub path: String,
    pub exists: bool,
}

#[derive(Serialize)]
pub struct FilesResult {
    pub files: Vec<StoredFile>,
    pub count: usize,
}

impl Output for FilesResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.files.is_empty() {
            return "No bookmarked files.".to_string();
        }
        self.files
            .iter()
            .map(|f| {
                if f.exists {
                    f.path.clone()
                } else {
                    format!("{} (missing)", f.path)
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub fn files(session: &Session) -> FilesResult {
    let files: Vec<StoredFile> = session
        .tree()
        .stored_files()
        .into_iter()
        .map(|path| StoredFile {
            exists: session.workspace().exists(&path),
            path,
        })
        .collect();
    FilesResult {
        count: files.len(),
        files,
    }
}

// === Navigation ===

#[derive(Serialize)]
pub struct NavigationResult {
    pub waypoint: Option<Node>,
}

impl Output for NavigationResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        match self.waypoint {
            Some(ref wp) => waypoint_line(wp),
            None => "No waypoints.".to_string(),
        }
    }
}

pub fn next(session: &mut Session, from: Option<&str>) -> Result<NavigationResult> {
    Ok(NavigationResult {
        waypoint: session.next_waypoint(from)?,
    })
}

pub fn prev(session: &mut Session, from: Option<&str>) -> Result<NavigationResult> {
    Ok(NavigationResult {
        waypoint: session.prev_waypoint(from)?,
    })
}

// === Reconcile ===

#[derive(Serialize)]
pub struct ReconcileResult {
    pub reports: Vec<ReconcileReport>,
}

impl Output for ReconcileResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.reports.is_empty() {
            return "Nothing to reconcile.".to_string();
        }
        let mut out = String::new();
        for report in &self.reports {
            let _ = writeln!(
                out,
                "{}: {} moved, {} orphaned",
                report.path,
                report.updated.len(),
                report.orphaned.len()
            );
            for u in &report.updated {
                let _ = writeln!(
                    out,
                    "  {} line {} -> {}",
                    u.identifier,
                    u.old_line.unwrap_or(0),
                    u.new_line
                );
            }
            for id in &report.orphaned {
                let _ = writeln!(out, "  {} text not found", id);
            }
        }
        out.trim_end().to_string()
    }
}

pub fn reconcile(session: &mut Session, files: &[String]) -> Result<ReconcileResult> {
    let files = if files.is_empty() {
        session.tree().stored_files()
    } else {
        files.to_vec()
    };
    Ok(ReconcileResult {
        reports: session.reconcile_paths(&files)?,
    })
}

// === Config ===

#[derive(Serialize)]
pub struct ConfigEntry {
    pub key: &'static str,
    pub value: String,
    pub source: String,
}

#[derive(Serialize)]
pub struct ConfigShowResult {
    pub entries: Vec<ConfigEntry>,
    pub system_path: Option<PathBuf>,
    pub session_path: Option<PathBuf>,
}

impl Output for ConfigShowResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let mut out = String::new();
        for e in &self.entries {
            let _ = writeln!(out, "{} = {}  ({})", e.key, e.value, e.source);
        }
        out.trim_end().to_string()
    }
}

pub fn config_show(config: &ResolvedConfig, paths: &ConfigPaths) -> ConfigShowResult {
    ConfigShowResult {
        entries: config
            .entries()
            .into_iter()
            .map(|(key, value, source)| ConfigEntry {
                key,
                value,
                source: source.to_string(),
            })
            .collect(),
        system_path: paths.system.clone(),
        session_path: paths.session.clone(),
    }
}

#[derive(Serialize)]
pub struct ConfigSetResult {
    pub key: String,
    pub value: String,
    pub path: PathBuf,
}

impl Output for ConfigSetResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        format!("Set {} = {} in {}", self.key, self.value, self.path.display())
    }
}

/// Validate and persist one key in the session (or system) config file.
pub fn config_set(
    paths: &ConfigPaths,
    key: &str,
    value: &str,
    system: bool,
) -> Result<ConfigSetResult> {
    let path = paths.target(system)?;
    let mut config = read_config_file(path)?;
    config.set_key(key, value).map_err(Error::Config)?;
    write_config_file(path, &config)?;
    Ok(ConfigSetResult {
        key: key.to_string(),
        value: value.trim().to_string(),
        path: path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestEnv;

    #[test]
    fn test_show_forest_and_node() {
        let env = TestEnv::new();
        env.write_file("a.txt", "alpha\n");
        let (mut session, _) = env.session();
        let marked = mark(&mut session, "a.txt", 1).unwrap();

        let forest = show(&session, None).unwrap();
        assert!(forest.to_human().contains("alpha"));
        let value: serde_json::Value = serde_json::from_str(&forest.to_json()).unwrap();
        assert_eq!(value["journeys"][0]["children"][0]["name"], "a.txt");

        let detail = show(&session, Some(&marked.identifier)).unwrap();
        assert!(detail.to_human().contains("Line: 1"));
        assert!(matches!(show(&session, Some("nope")), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_mark_toggle_result() {
        let env = TestEnv::new();
        env.write_file("a.txt", "alpha\nbeta\n");
        let (mut session, _) = env.session();

        let first = mark(&mut session, "a.txt", 2).unwrap();
        assert_eq!(first.action, "created");
        assert_eq!(first.path, "a.txt");
        let second = mark(&mut session, "a.txt", 2).unwrap();
        assert_eq!(second.action, "removed");
        assert_eq!(second.identifier, first.identifier);
    }

    #[test]
    fn test_rm_partial_and_total_failure() {
        let env = TestEnv::new();
        env.write_file("a.txt", "alpha\n");
        let (mut session, _) = env.session();
        let marked = mark(&mut session, "a.txt", 1).unwrap();

        let result = rm(&mut session, &[marked.identifier.clone(), "nope".to_string()]).unwrap();
        assert_eq!(result.removed, vec![marked.identifier]);
        assert_eq!(result.failed.len(), 1);

        assert!(matches!(
            rm(&mut session, &["nope".to_string()]),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_journey_list_counts() {
        let env = TestEnv::new();
        env.write_file("a.txt", "alpha\nbeta\n");
        let (mut session, _) = env.session();
        journey_add(&mut session, Some("review")).unwrap();
        mark(&mut session, "a.txt", 1).unwrap();
        mark(&mut session, "a.txt", 2).unwrap();

        let list = journey_list(&session);
        assert_eq!(list.count, 1);
        assert_eq!(list.journeys[0].name, "Review");
        assert!(list.journeys[0].active);
        assert_eq!(list.journeys[0].files, 1);
        assert_eq!(list.journeys[0].waypoints, 2);
    }

    #[test]
    fn test_journey_activate_unknown() {
        let env = TestEnv::new();
        let (mut session, _) = env.session();
        assert!(matches!(
            journey_activate(&mut session, "Ghost"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_files_reports_missing() {
        let env = TestEnv::new();
        env.write_file("a.txt", "alpha\n");
        let (mut session, _) = env.session();
        mark(&mut session, "a.txt", 1).unwrap();
        std::fs::remove_file(env.path().join("a.txt")).unwrap();

        let result = files(&session);
        assert_eq!(result.count, 1);
        assert!(!result.files[0].exists);
        assert!(result.to_human().contains("(missing)"));
    }

    #[test]
    fn test_config_set_and_show() {
        let env = TestEnv::new();
        let paths = ConfigPaths {
            system: None,
            session: Some(env.data_path().join("config.kdl")),
        };
        config_set(&paths, "debounce-ms", "350", false).unwrap();
        assert!(matches!(
            config_set(&paths, "debounce-ms", "lots", false),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            config_set(&paths, "output-format", "json", true),
            Err(Error::Config(_))
        ));

        let resolved =
            crate::config::resolve_config(&paths, &crate::config::ConfigOverrides::default())
                .unwrap();
        let shown = config_show(&resolved, &paths);
        let debounce = shown.entries.iter().find(|e| e.key == "debounce-ms").unwrap();
        assert_eq!(debounce.value, "350");
        assert_eq!(debounce.source, "session");
    }
}
