//! Forest mutations: journeys, waypoints, comments, file moves and removal.

use super::WaypointTree;
use crate::editor::EditorContext;
use crate::models::{capitalize, default_journey_name, Node, NodeId};
use crate::{Error, Result};
use tracing::debug;

/// Outcome of bookmarking a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaypointToggle {
    /// A new waypoint was added.
    Created(NodeId),
    /// The line already had a waypoint, which was removed.
    Removed(NodeId),
}

impl WaypointToggle {
    pub fn identifier(&self) -> &str {
        match self {
            Self::Created(id) | Self::Removed(id) => id,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

impl WaypointTree {
    /// Add a journey, or activate it if one with that name exists.
    ///
    /// A blank name becomes the current date. New journeys get a capitalized
    /// name and go to the front of the forest.
    pub fn add_journey(&mut self, name: Option<&str>) -> &Node {
        let index = self.add_journey_index(name);
        &self.journeys[index]
    }

    fn add_journey_index(&mut self, name: Option<&str>) -> usize {
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(String::from)
            .unwrap_or_else(default_journey_name);
        let capitalized = capitalize(&name);

        let index = match self
            .journeys
            .iter()
            .position(|j| j.name == name || j.name == capitalized)
        {
            Some(i) => i,
            None => {
                debug!(name = %capitalized, "Adding journey");
                self.journeys.insert(0, Node::journey(&capitalized));
                0
            }
        };

        let active = self.journeys[index].name.clone();
        self.set_active_journey(&active);
        self.reindex();
        index
    }

    /// Rename the journey called `old` to `new`.
    pub fn rename_journey(&mut self, new: &str, old: &str) -> Result<()> {
        if self.journeys.is_empty() {
            return Err(Error::NotFound("No journeys to rename".to_string()));
        }
        let new = new.trim();
        if new.is_empty() {
            return Err(Error::Validation("Journey name cannot be empty".to_string()));
        }
        let index = self
            .journeys
            .iter()
            .position(|j| j.name == old)
            .ok_or_else(|| Error::NotFound(format!("Journey {:?}", old)))?;
        if self
            .journeys
            .iter()
            .enumerate()
            .any(|(i, j)| i != index && j.name == new)
        {
            return Err(Error::Validation(format!(
                "A journey named {:?} already exists",
                new
            )));
        }

        let journey = &mut self.journeys[index];
        journey.name = new.to_string();
        journey.touch();
        if self.active_journey.as_deref() == Some(old) {
            self.active_journey = Some(new.to_string());
        }
        Ok(())
    }

    /// Toggle a waypoint on the cursor line of the active document.
    ///
    /// The line must be non-blank and its text must occur exactly once in the
    /// document, since the text is what re-anchors the waypoint later. A
    /// rejected line leaves the forest untouched.
    pub fn create_waypoint(&mut self, ctx: &EditorContext) -> Result<WaypointToggle> {
        let path = ctx
            .path
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or(Error::NoDocument)?;
        let line = ctx.cursor_line;
        if line == 0 {
            return Err(Error::Validation("Line numbers start at 1".to_string()));
        }
        let text = ctx
            .current_line()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(Error::EmptyLine { line })?;
        let occurrences = ctx.buffer.count_occurrences(text)?;
        if occurrences > 1 {
            return Err(Error::AmbiguousLine {
                text: text.to_string(),
                occurrences,
            });
        }

        let journey_index = match self.active_index() {
            Some(i) => i,
            None => self.add_journey_index(None),
        };
        let journey = &mut self.journeys[journey_index];
        let file_index = match journey.children.iter().position(|f| f.name == path) {
            Some(i) => i,
            None => {
                journey.add_child(Node::file(path));
                journey.children.len() - 1
            }
        };

        let file = &mut journey.children[file_index];
        let toggle = match file.children.iter().position(|w| w.line == Some(line)) {
            Some(i) => WaypointToggle::Removed(file.children.remove(i).identifier),
            None => {
                let waypoint = Node::waypoint(text, line, path);
                let id = waypoint.identifier.clone();
                file.add_child(waypoint);
                WaypointToggle::Created(id)
            }
        };
        file.touch();
        journey.touch();
        debug!(path, line, ?toggle, "Toggled waypoint");

        self.refresh_active();
        self.reindex();
        Ok(toggle)
    }

    /// Remove a node and its subtree.
    pub fn remove_node(&mut self, identifier: &str) -> Result<Node> {
        if identifier.trim().is_empty() {
            return Err(Error::Validation("Identifier cannot be empty".to_string()));
        }
        let not_found = || Error::NotFound(format!("Node {}", identifier));
        let path = self.index_path(identifier).ok_or_else(not_found)?;

        let removed = match path.as_slice() {
            [j] => {
                let journey = self.journeys.remove(*j);
                if self.active_journey.as_deref() == Some(journey.name.as_str()) {
                    self.clear_active_journey();
                }
                journey
            }
            [j, f] => self.journeys[*j].children.remove(*f),
            [j, f, w] => self.journeys[*j].children[*f].children.remove(*w),
            _ => return Err(not_found()),
        };
        debug!(identifier, kind = %removed.kind, "Removed node");

        self.refresh_active();
        self.reindex();
        Ok(removed)
    }

    /// Remove several nodes. One failure does not stop the others.
    pub fn remove_nodes<S: AsRef<str>>(&mut self, identifiers: &[S]) -> Vec<Result<Node>> {
        identifiers
            .iter()
            .map(|id| self.remove_node(id.as_ref()))
            .collect()
    }

    /// Set or clear (blank) a node's comment.
    pub fn set_comment(&mut self, identifier: &str, comment: Option<&str>) -> Result<()> {
        if identifier.trim().is_empty() {
            return Err(Error::Validation("Identifier cannot be empty".to_string()));
        }
        let node = self
            .find_mut(identifier)
            .ok_or_else(|| Error::NotFound(format!("Node {}", identifier)))?;
        node.comment = comment
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(String::from);
        Ok(())
    }

    /// Re-point every file node for `old_path` to `new_path`.
    ///
    /// Returns the number of file nodes moved.
    pub fn rename_file(&mut self, old_path: &str, new_path: &str) -> Result<usize> {
        let (old_path, new_path) = (old_path.trim(), new_path.trim());
        if old_path.is_empty() || new_path.is_empty() {
            return Err(Error::Validation("File paths cannot be empty".to_string()));
        }
        if old_path == new_path {
            return Ok(0);
        }
        if let Some(journey) = self.journeys.iter().find(|j| {
            j.children.iter().any(|f| f.name == old_path)
                && j.children.iter().any(|f| f.name == new_path)
        }) {
            return Err(Error::Validation(format!(
                "{} is already bookmarked in journey {:?}",
                new_path, journey.name
            )));
        }

        let files = self.files_for_path_mut(old_path);
        if files.is_empty() {
            return Err(Error::NotFound(format!("Bookmarked file {}", old_path)));
        }
        let moved = files.len();
        for file in files {
            file.name = new_path.to_string();
            file.path = Some(new_path.to_string());
            for waypoint in &mut file.children {
                waypoint.path = Some(new_path.to_string());
            }
        }
        debug!(old_path, new_path, moved, "Moved bookmarked file");

        self.refresh_active();
        Ok(moved)
    }
}
