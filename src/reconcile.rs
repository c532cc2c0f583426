//! Line reconciliation after a file is saved.
//!
//! A waypoint remembers the text of its line. When the file changes, that
//! text is searched for again and the stored line number follows it.

use crate::editor::TextBuffer;
use crate::models::NodeId;
use crate::tree::WaypointTree;
use serde::Serialize;
use tracing::{debug, warn};

/// A waypoint whose line number changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineUpdate {
    pub identifier: NodeId,
    pub old_line: Option<u32>,
    pub new_line: u32,
}

/// What one reconciliation pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Workspace-relative path that was reconciled
    pub path: String,
    /// Number of file nodes (across journeys) for the path
    pub files_matched: usize,
    pub updated: Vec<LineUpdate>,
    /// Waypoints whose text no longer appears in the file
    pub orphaned: Vec<NodeId>,
}

impl ReconcileReport {
    pub fn has_matches(&self) -> bool {
        self.files_matched > 0
    }
}

/// Re-anchor every waypoint of `path` against the saved text.
///
/// Waypoints whose text is gone keep their line and are reported as orphaned.
pub fn reconcile(tree: &mut WaypointTree, path: &str, buffer: &TextBuffer) -> ReconcileReport {
    let mut report = ReconcileReport {
        path: path.to_string(),
        ..ReconcileReport::default()
    };

    let files = tree.files_for_path_mut(path);
    report.files_matched = files.len();

    for file in files {
        for waypoint in &mut file.children {
            let hit = match buffer.scanner().scan_to(&waypoint.name) {
                Ok(hit) => hit,
                Err(e) => {
                    warn!(error = %e, identifier = %waypoint.identifier, "Skipping waypoint during reconciliation");
                    continue;
                }
            };

            match hit {
                Some(m) => {
                    let new_line = buffer.line_for_offset(m.end.min(buffer.len()));
                    if waypoint.line != Some(new_line) {
                        report.updated.push(LineUpdate {
                            identifier: waypoint.identifier.clone(),
                            old_line: waypoint.line,
                            new_line,
                        });
                        waypoint.line = Some(new_line);
                    }
                }
                None => {
                    warn!(
                        identifier = %waypoint.identifier,
                        path,
                        text = %waypoint.name,
                        "Waypoint text no longer found in file"
                    );
                    report.orphaned.push(waypoint.identifier.clone());
                }
            }
        }
    }

    debug!(
        path,
        files = report.files_matched,
        updated = report.updated.len(),
        orphaned = report.orphaned.len(),
        "Reconciled waypoints"
    );
    report
}
