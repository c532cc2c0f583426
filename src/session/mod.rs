//! Session context.
//!
//! A `Session` ties one workspace to its storage and in-memory tree. Every
//! host action goes through it: mutate the tree, save, reload from disk.
//! Save failures are reported to the user once per error class.

pub mod debounce;
pub mod notify;

pub use debounce::{Debouncer, DEFAULT_DEBOUNCE_MS};
pub use notify::{Notifier, NotifyOnce, RecordingNotifier, SilentNotifier, StderrNotifier};

use crate::editor::{EditorContext, TextBuffer, Workspace};
use crate::models::{Node, WaypointDocument};
use crate::reconcile::{reconcile, ReconcileReport};
use crate::storage::Storage;
use crate::tree::{WaypointToggle, WaypointTree};
use crate::{Error, Result};
use std::path::Path;
use tracing::{debug, warn};

/// One workspace's waypoints and the collaborators around them.
pub struct Session {
    workspace: Workspace,
    storage: Storage,
    tree: WaypointTree,
    /// Index into the tree's waypoint ids for next/previous navigation
    focus: Option<usize>,
    notifier: Box<dyn Notifier>,
    notified: NotifyOnce,
}

impl Session {
    /// Create a session with an empty tree.
    pub fn new(workspace: Workspace, storage: Storage, notifier: Box<dyn Notifier>) -> Self {
        Self {
            workspace,
            storage,
            tree: WaypointTree::new(),
            focus: None,
            notifier,
            notified: NotifyOnce::default(),
        }
    }

    /// Create a session and load the persisted tree.
    pub fn open(workspace: Workspace, storage: Storage, notifier: Box<dyn Notifier>) -> Self {
        let mut session = Self::new(workspace, storage, notifier);
        session.load();
        session
    }

    /// Rebuild the tree from disk.
    pub fn load(&mut self) -> WaypointDocument {
        let doc = self.tree.load(&self.storage);
        if self
            .focus
            .is_some_and(|i| i >= self.tree.waypoint_ids().len())
        {
            self.focus = None;
        }
        doc
    }

    pub fn tree(&self) -> &WaypointTree {
        &self.tree
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Persist the tree and reload it.
    pub fn save(&mut self) -> Result<()> {
        if let Err(e) = self.tree.save(&self.storage) {
            self.report(&e);
            return Err(e);
        }
        self.load();
        debug!(path = %self.storage.durable_path().display(), "Saved and reloaded waypoints");
        Ok(())
    }

    fn report(&mut self, error: &Error) {
        let class = error.class();
        if self.notified.first(class) {
            self.notifier.notify(class, &error.to_string());
        }
    }

    /// Workspace-relative form of a user-supplied path.
    pub fn relative_path(&self, file: &str) -> Result<String> {
        self.workspace
            .relativize(Path::new(file.trim()))
            .ok_or_else(|| Error::Validation(format!("{} is not inside the workspace", file)))
    }

    pub fn add_journey(&mut self, name: Option<&str>) -> Result<Node> {
        let journey = self.tree.add_journey(name).clone();
        self.save()?;
        Ok(journey)
    }

    pub fn rename_journey(&mut self, new: &str, old: &str) -> Result<()> {
        self.tree.rename_journey(new, old)?;
        self.save()
    }

    /// Activate an existing journey. Returns `None` when no journey has that name.
    pub fn activate_journey(&mut self, name: &str) -> Result<Option<Node>> {
        if !self.tree.journeys().iter().any(|j| j.name == name) {
            return Ok(None);
        }
        self.tree.set_active_journey(name);
        self.save()?;
        Ok(self.tree.active_journey().cloned())
    }

    /// Toggle a waypoint from an editor context.
    pub fn create_waypoint(&mut self, ctx: &EditorContext) -> Result<WaypointToggle> {
        let toggle = self.tree.create_waypoint(ctx)?;
        self.save()?;
        Ok(toggle)
    }

    /// Toggle a waypoint on `line` of a workspace file read from disk.
    pub fn mark(&mut self, file: &str, line: u32) -> Result<WaypointToggle> {
        let rel = self.relative_path(file)?;
        let ctx = self.workspace.editor_context(&rel, line)?;
        self.create_waypoint(&ctx)
    }

    /// Remove nodes, saving once if anything was removed.
    pub fn remove<S: AsRef<str>>(&mut self, identifiers: &[S]) -> Result<Vec<Result<Node>>> {
        let results = self.tree.remove_nodes(identifiers);
        if results.iter().any(|r| r.is_ok()) {
            self.save()?;
        }
        Ok(results)
    }

    pub fn set_comment(&mut self, identifier: &str, comment: Option<&str>) -> Result<()> {
        self.tree.set_comment(identifier, comment)?;
        self.save()
    }

    /// Follow a file move. Returns the number of file nodes updated.
    pub fn rename_file(&mut self, old: &str, new: &str) -> Result<usize> {
        let old = self.relative_path(old)?;
        let new = self.relative_path(new)?;
        let moved = self.tree.rename_file(&old, &new)?;
        if moved > 0 {
            self.save()?;
        }
        Ok(moved)
    }

    /// Move focus to the next waypoint, wrapping at the end.
    ///
    /// `from` repositions the focus first. Without any focus the first
    /// waypoint is returned.
    pub fn next_waypoint(&mut self, from: Option<&str>) -> Result<Option<Node>> {
        self.step(from, |focus, len| match focus {
            Some(i) => (i + 1) % len,
            None => 0,
        })
    }

    /// Move focus to the previous waypoint, wrapping at the start.
    pub fn prev_waypoint(&mut self, from: Option<&str>) -> Result<Option<Node>> {
        self.step(from, |focus, len| match focus {
            Some(i) => (i + len - 1) % len,
            None => len - 1,
        })
    }

    fn step(
        &mut self,
        from: Option<&str>,
        advance: impl Fn(Option<usize>, usize) -> usize,
    ) -> Result<Option<Node>> {
        let ids = self.tree.waypoint_ids();
        if let Some(from) = from {
            let index = ids
                .iter()
                .position(|id| id == from)
                .ok_or_else(|| Error::NotFound(format!("Waypoint {}", from)))?;
            self.focus = Some(index);
        }
        if ids.is_empty() {
            self.focus = None;
            return Ok(None);
        }

        let index = advance(self.focus, ids.len());
        self.focus = Some(index);
        Ok(self.tree.find(&ids[index]).cloned())
    }

    /// Reconcile one saved document and persist if it is bookmarked.
    pub fn on_file_saved(&mut self, rel: &str, buffer: &TextBuffer) -> Result<ReconcileReport> {
        let report = reconcile(&mut self.tree, rel, buffer);
        if report.has_matches() {
            self.save()?;
        }
        Ok(report)
    }

    /// Reconcile several files from disk with a single save at the end.
    ///
    /// Paths outside the workspace or missing on disk are skipped.
    pub fn reconcile_paths<S: AsRef<str>>(&mut self, paths: &[S]) -> Result<Vec<ReconcileReport>> {
        let mut reports = Vec::new();
        for path in paths {
            let path = path.as_ref();
            let rel = match self.relative_path(path) {
                Ok(rel) => rel,
                Err(e) => {
                    warn!(error = %e, path, "Skipping reconciliation");
                    continue;
                }
            };
            let buffer = match self.workspace.open_document(&rel) {
                Ok(buffer) => buffer,
                Err(e) => {
                    warn!(error = %e, path = %rel, "Skipping reconciliation");
                    continue;
                }
            };
            reports.push(reconcile(&mut self.tree, &rel, &buffer));
        }

        if reports.iter().any(ReconcileReport::has_matches) {
            self.save()?;
        }
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestEnv;
    use crate::ErrorClass;
    use std::fs;

    #[test]
    fn test_open_empty_workspace() {
        let env = TestEnv::new();
        let (session, notifier) = env.session();
        assert!(session.tree().is_empty());
        assert!(!session.storage().exists());
        assert!(notifier.records().is_empty());
    }

    #[test]
    fn test_mark_persists_across_sessions() {
        let env = TestEnv::new();
        env.write_file("src/lib.rs", "pub mod a;\npub mod b;\n");

        let (mut session, _) = env.session();
        let toggle = session.mark("src/lib.rs", 2).unwrap();
        assert!(toggle.is_created());
        assert!(session.storage().exists());

        let (reopened, _) = env.session();
        let wp = reopened.tree().find(toggle.identifier()).unwrap();
        assert_eq!(wp.name, "pub mod b;");
        assert_eq!(wp.line, Some(2));
        assert!(reopened.tree().active_journey().is_some());
    }

    #[test]
    fn test_mark_absolute_path() {
        let env = TestEnv::new();
        env.write_file("a.txt", "hello\n");
        let (mut session, _) = env.session();
        let abs = env.path().join("a.txt");

        session.mark(abs.to_str().unwrap(), 1).unwrap();
        assert_eq!(session.tree().stored_files(), vec!["a.txt"]);
    }

    #[test]
    fn test_navigation_wraps() {
        let env = TestEnv::new();
        env.write_file("a.txt", "one\ntwo\nthree\n");
        let (mut session, _) = env.session();
        for line in 1..=3 {
            session.mark("a.txt", line).unwrap();
        }
        let ids = session.tree().waypoint_ids().to_vec();

        let first = session.next_waypoint(None).unwrap().unwrap();
        assert_eq!(first.identifier, ids[0]);
        session.next_waypoint(None).unwrap();
        session.next_waypoint(None).unwrap();
        let wrapped = session.next_waypoint(None).unwrap().unwrap();
        assert_eq!(wrapped.identifier, ids[0]);

        let back = session.prev_waypoint(None).unwrap().unwrap();
        assert_eq!(back.identifier, ids[2]);

        let after = session.next_waypoint(Some(&ids[1])).unwrap().unwrap();
        assert_eq!(after.identifier, ids[2]);
        assert!(matches!(
            session.prev_waypoint(Some("missing")),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_prev_without_focus_is_last() {
        let env = TestEnv::new();
        env.write_file("a.txt", "one\ntwo\n");
        let (mut session, _) = env.session();
        assert!(session.prev_waypoint(None).unwrap().is_none());

        session.mark("a.txt", 1).unwrap();
        session.mark("a.txt", 2).unwrap();
        let last = session.prev_waypoint(None).unwrap().unwrap();
        assert_eq!(last.line, Some(2));
    }

    #[test]
    fn test_on_file_saved_updates_and_persists() {
        let env = TestEnv::new();
        env.write_file("a.txt", "x\nanchor line\n");
        let (mut session, _) = env.session();
        let id = session.mark("a.txt", 2).unwrap().identifier().to_string();

        let report = session
            .on_file_saved("a.txt", &TextBuffer::new("new\nnew\nx\nanchor line\n"))
            .unwrap();
        assert_eq!(report.updated.len(), 1);

        let (reopened, _) = env.session();
        assert_eq!(reopened.tree().find(&id).unwrap().line, Some(4));
    }

    #[test]
    fn test_reconcile_paths_skips_missing_files() {
        let env = TestEnv::new();
        env.write_file("a.txt", "anchor\n");
        let (mut session, _) = env.session();
        let id = session.mark("a.txt", 1).unwrap().identifier().to_string();
        env.write_file("a.txt", "\n\nanchor\n");

        let reports = session.reconcile_paths(&["gone.txt", "a.txt"]).unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(session.tree().find(&id).unwrap().line, Some(3));
    }

    #[test]
    fn test_remove_saves() {
        let env = TestEnv::new();
        env.write_file("a.txt", "one\ntwo\n");
        let (mut session, _) = env.session();
        let id = session.mark("a.txt", 1).unwrap().identifier().to_string();

        let results = session.remove(&[id.as_str(), "nope"]).unwrap();
        assert!(results[0].is_ok());
        assert!(results[1].is_err());

        let (reopened, _) = env.session();
        assert!(reopened.tree().find(&id).is_none());
    }

    #[test]
    fn test_activate_unknown_journey() {
        let env = TestEnv::new();
        let (mut session, _) = env.session();
        session.add_journey(Some("alpha")).unwrap();
        assert!(session.activate_journey("Beta").unwrap().is_none());
        assert_eq!(session.tree().active_journey_name(), Some("Alpha"));
    }

    #[test]
    fn test_save_failures_notify_once() {
        let env = TestEnv::new();
        // A file where the metadata folder should be makes every commit fail
        fs::write(env.path().join(".waypoint"), "").unwrap();
        let (mut session, notifier) = env.session();

        assert!(session.add_journey(Some("one")).is_err());
        assert!(session.add_journey(Some("two")).is_err());

        let records = notifier.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].0, ErrorClass::Commit);
    }
}
