//! Filesystem watcher that reconciles bookmarked files as they change.

use crate::editor::Workspace;
use crate::session::{Debouncer, Session};
use crate::{Error, Result};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Sleep used while nothing is pending.
const IDLE_WAIT: Duration = Duration::from_secs(3600);

fn watch_error(e: notify::Error) -> Error {
    Error::Io(io::Error::other(e.to_string()))
}

/// Workspace-relative path of a changed file, if it is bookmarked and not
/// one of Waypoint's own files.
pub fn watched_path(
    workspace: &Workspace,
    ignored: &[PathBuf],
    stored: &[String],
    path: &Path,
) -> Option<String> {
    if ignored.iter().any(|dir| path.starts_with(dir)) {
        return None;
    }
    let rel = workspace.relativize(path)?;
    stored.contains(&rel).then_some(rel)
}

/// Watch the workspace until Ctrl-C, reconciling changed files in batches.
///
/// Events are collected until `debounce` passes without a new one; each
/// batch is reconciled with a single save.
pub async fn watch_workspace(session: &mut Session, data_dir: &Path, debounce: Duration) -> Result<()> {
    let (tx, mut rx) = tokio::sync::mpsc::channel(100);

    let mut watcher = RecommendedWatcher::new(
        move |res: std::result::Result<Event, notify::Error>| {
            if let Ok(event) = res {
                let _ = tx.blocking_send(event);
            }
        },
        Config::default(),
    )
    .map_err(watch_error)?;

    let root = session.workspace().root().to_path_buf();
    watcher
        .watch(&root, RecursiveMode::Recursive)
        .map_err(watch_error)?;

    let ignored = vec![
        session.storage().paths().metadata_dir.clone(),
        data_dir.to_path_buf(),
    ];
    let mut debouncer: Debouncer<String> = Debouncer::new(debounce);
    info!(root = %root.display(), debounce_ms = debounce.as_millis() as u64, "Watching workspace");

    loop {
        let timeout = debouncer.time_remaining(Instant::now()).unwrap_or(IDLE_WAIT);

        tokio::select! {
            event = rx.recv() => {
                match event {
                    Some(event) => {
                        if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                            continue;
                        }
                        let stored = session.tree().stored_files();
                        for path in &event.paths {
                            if let Some(rel) = watched_path(session.workspace(), &ignored, &stored, path) {
                                debug!(path = %rel, "Bookmarked file changed");
                                debouncer.push(rel, Instant::now());
                            }
                        }
                    }
                    None => break,
                }
            }
            _ = tokio::time::sleep(timeout), if debouncer.is_pending() => {
                if let Some(batch) = debouncer.take_ready(Instant::now()) {
                    match session.reconcile_paths(&batch) {
                        Ok(reports) => {
                            let moved: usize = reports.iter().map(|r| r.updated.len()).sum();
                            info!(files = batch.len(), moved, "Reconciled changed files");
                        }
                        Err(e) => warn!(error = %e, "Reconciliation failed"),
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    Ok(())
}
