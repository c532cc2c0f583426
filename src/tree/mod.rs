//! The waypoint forest.
//!
//! `WaypointTree` owns every journey and, through them, every file and line
//! waypoint. It converts between the persisted document and the node forest,
//! tracks the active journey, and keeps a flat ordered list of waypoint
//! identifiers for sequential navigation.
//!
//! Mutations live in [`edit`].

mod edit;

pub use edit::WaypointToggle;

use crate::models::{basename, Node, NodeId, NodeKind, PersistedNode, WaypointDocument};
use crate::storage::Storage;
use crate::{Error, Result};
use tracing::{debug, warn};

/// In-memory journey → file → waypoint forest.
#[derive(Debug, Clone, Default)]
pub struct WaypointTree {
    journeys: Vec<Node>,
    /// Name of the active journey, resolved lazily
    active_journey: Option<String>,
    /// First file of the active journey
    active_file: Option<NodeId>,
    /// First waypoint of that file
    active_waypoint: Option<NodeId>,
    /// Every waypoint identifier in forest order
    waypoint_ids: Vec<NodeId>,
}

impl WaypointTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree straight from a document.
    pub fn from_document(doc: &WaypointDocument) -> Self {
        let mut tree = Self::new();
        tree.build_forest(doc);
        tree
    }

    /// Read the persisted document, falling back to the empty default.
    ///
    /// Never fails: read errors are logged and absorbed.
    pub fn load_document(storage: &Storage) -> WaypointDocument {
        match storage.read_document() {
            Ok(Some(doc)) => {
                debug!(nodes = doc.node_count(), "Loaded waypoint file");
                doc
            }
            Ok(None) => {
                warn!(path = %storage.durable_path().display(), "Waypoint file is empty, starting fresh");
                WaypointDocument::default()
            }
            Err(Error::NotFound(_)) => {
                debug!(path = %storage.durable_path().display(), "No waypoint file yet");
                WaypointDocument::default()
            }
            Err(e) => {
                warn!(error = %e, path = %storage.durable_path().display(), "Could not load waypoint file, starting fresh");
                WaypointDocument::default()
            }
        }
    }

    /// Replace the forest with the persisted one.
    pub fn load(&mut self, storage: &Storage) -> WaypointDocument {
        let doc = Self::load_document(storage);
        self.build_forest(&doc);
        doc
    }

    /// Rebuild the forest from a document.
    ///
    /// Journeys and files are ordered most recently updated first. Waypoints
    /// are ordered by file basename, keeping their stored order otherwise.
    pub fn build_forest(&mut self, doc: &WaypointDocument) {
        let mut journeys: Vec<Node> = doc
            .journeys
            .iter()
            .map(|p| build_node(p, 0))
            .collect();

        journeys.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        for journey in &mut journeys {
            journey.children.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
            for file in &mut journey.children {
                file.children.sort_by_key(|w| {
                    basename(w.path.as_deref().unwrap_or_default()).to_lowercase()
                });
            }
        }

        self.journeys = journeys;
        self.reindex();
        self.set_active_journey(doc.active_journey.as_deref().unwrap_or_default());
        debug!(
            journeys = self.journeys.len(),
            waypoints = self.waypoint_ids.len(),
            "Built waypoint forest"
        );
    }

    /// Activate the journey named exactly `name`.
    ///
    /// An empty or unknown name clears the active journey. Returns whether a
    /// journey was activated.
    pub fn set_active_journey(&mut self, name: &str) -> bool {
        let found = self
            .journeys
            .iter()
            .find(|j| !name.is_empty() && j.name == name)
            .map(|journey| {
                let file = journey.children.first();
                (
                    journey.name.clone(),
                    file.map(|f| f.identifier.clone()),
                    file.and_then(|f| f.children.first())
                        .map(|w| w.identifier.clone()),
                )
            });

        match found {
            Some((journey, file, waypoint)) => {
                self.active_journey = Some(journey);
                self.active_file = file;
                self.active_waypoint = waypoint;
                true
            }
            None => {
                self.clear_active_journey();
                false
            }
        }
    }

    pub fn clear_active_journey(&mut self) {
        self.active_journey = None;
        self.active_file = None;
        self.active_waypoint = None;
    }

    /// Name of the active journey, if it still exists.
    pub fn active_journey_name(&self) -> Option<&str> {
        self.active_journey().map(|j| j.name.as_str())
    }

    pub fn active_journey(&self) -> Option<&Node> {
        self.active_index().map(|i| &self.journeys[i])
    }

    /// First file of the active journey.
    pub fn active_file(&self) -> Option<&Node> {
        self.active_file.as_deref().and_then(|id| self.find(id))
    }

    /// First waypoint of the active file.
    pub fn active_waypoint(&self) -> Option<&Node> {
        self.active_waypoint.as_deref().and_then(|id| self.find(id))
    }

    pub fn journeys(&self) -> &[Node] {
        &self.journeys
    }

    pub fn is_empty(&self) -> bool {
        self.journeys.is_empty()
    }

    /// Every waypoint identifier in forest order.
    pub fn waypoint_ids(&self) -> &[NodeId] {
        &self.waypoint_ids
    }

    /// Find a node at any depth.
    pub fn find(&self, identifier: &str) -> Option<&Node> {
        self.index_path(identifier).and_then(|p| self.node_at(&p))
    }

    pub fn find_mut(&mut self, identifier: &str) -> Option<&mut Node> {
        let path = self.index_path(identifier)?;
        let (first, rest) = path.split_first()?;
        let mut node = self.journeys.get_mut(*first)?;
        for i in rest {
            node = node.children.get_mut(*i)?;
        }
        Some(node)
    }

    /// Child indexes leading to `identifier`, depth-first: one index for a
    /// journey, two for a file, three for a waypoint.
    pub fn index_path(&self, identifier: &str) -> Option<Vec<usize>> {
        fn search(nodes: &[Node], identifier: &str, path: &mut Vec<usize>) -> bool {
            for (i, node) in nodes.iter().enumerate() {
                path.push(i);
                if node.identifier == identifier || search(&node.children, identifier, path) {
                    return true;
                }
                path.pop();
            }
            false
        }

        let mut path = Vec::new();
        search(&self.journeys, identifier, &mut path).then_some(path)
    }

    /// Node at an index path.
    pub fn node_at(&self, path: &[usize]) -> Option<&Node> {
        let (first, rest) = path.split_first()?;
        let mut node = self.journeys.get(*first)?;
        for i in rest {
            node = node.children.get(*i)?;
        }
        Some(node)
    }

    /// Owning node of `identifier`; `None` for journeys and unknown ids.
    pub fn parent_of(&self, identifier: &str) -> Option<&Node> {
        let path = self.index_path(identifier)?;
        match path.len() {
            0 | 1 => None,
            n => self.node_at(&path[..n - 1]),
        }
    }

    /// File nodes for a workspace-relative path, across every journey.
    pub fn files_for_path(&self, path: &str) -> Vec<&Node> {
        self.journeys
            .iter()
            .flat_map(|j| j.children.iter())
            .filter(|f| f.name == path)
            .collect()
    }

    pub(crate) fn files_for_path_mut(&mut self, path: &str) -> Vec<&mut Node> {
        self.journeys
            .iter_mut()
            .flat_map(|j| j.children.iter_mut())
            .filter(|f| f.name == path)
            .collect()
    }

    /// Every bookmarked file path, deduplicated, in forest order.
    pub fn stored_files(&self) -> Vec<String> {
        let mut files: Vec<String> = Vec::new();
        for file in self.journeys.iter().flat_map(|j| j.children.iter()) {
            if !file.name.is_empty() && !files.contains(&file.name) {
                files.push(file.name.clone());
            }
        }
        files
    }

    /// Persistable form of the forest.
    pub fn to_document(&self) -> WaypointDocument {
        WaypointDocument {
            active_journey: self.active_journey_name().map(String::from),
            journeys: self.journeys.iter().map(Node::to_persistable).collect(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_document())?)
    }

    /// Serialize and durably write the forest.
    pub fn save(&self, storage: &Storage) -> Result<()> {
        storage.save(&self.to_json()?)
    }

    fn active_index(&self) -> Option<usize> {
        let name = self.active_journey.as_deref()?;
        self.journeys.iter().position(|j| j.name == name)
    }

    /// Re-resolve the active caches after a mutation.
    fn refresh_active(&mut self) {
        match self.active_journey.clone() {
            Some(name) => {
                self.set_active_journey(&name);
            }
            None => self.clear_active_journey(),
        }
    }

    fn reindex(&mut self) {
        self.waypoint_ids = self
            .journeys
            .iter()
            .flat_map(|j| j.children.iter())
            .flat_map(|f| f.children.iter())
            .map(|w| w.identifier.clone())
            .collect();
    }
}

/// Build a node and its subtree; the kind follows from depth.
fn build_node(persisted: &PersistedNode, depth: usize) -> Node {
    let kind = NodeKind::from_depth(depth).unwrap_or(NodeKind::Waypoint);
    let mut stamped = persisted.clone();
    stamped.updated_at = Some(persisted.updated_at.unwrap_or(0));
    let mut node = Node::from_persisted(kind, &stamped);
    if kind.child_kind().is_some() {
        for child in &persisted.children {
            node.add_child(build_node(child, depth + 1));
        }
    }
    node
}
