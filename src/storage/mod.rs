//! Storage layer for Waypoint data.
//!
//! One JSON document per workspace lives at
//! `<workspace>/<metadata-dir>/<marker-file>` (default `.waypoint/waypoints.json`).
//!
//! Writes never go straight to that file. A save:
//! 1. writes the new document to a staging file under the data directory
//!    (`<data-dir>/tmp/<marker-file>`),
//! 2. copies the current durable file to `<durable>.bck`,
//! 3. replaces the durable file with the staged one,
//! 4. removes the backup.
//!
//! A failed replace restores the durable file from the backup.

pub mod backend;

pub use backend::{AccessMode, FileSystem, LocalFs};

use crate::models::WaypointDocument;
use crate::{Error, Result};
use sha2::{Digest, Sha256};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

/// Default project-local metadata folder.
pub const DEFAULT_METADATA_DIR: &str = ".waypoint";

/// Default file name of the waypoint document.
pub const DEFAULT_MARKER_FILE: &str = "waypoints.json";

/// Environment variable overriding the per-workspace data directory.
pub const DATA_DIR_ENV: &str = "WP_DATA_DIR";

/// Locations used by one workspace's storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePaths {
    /// `<workspace>/<metadata-dir>`
    pub metadata_dir: PathBuf,
    /// `<metadata-dir>/<marker-file>`
    pub durable: PathBuf,
    /// `<durable>.bck`
    pub backup: PathBuf,
    /// `<data-dir>/tmp/<marker-file>`
    pub staging: PathBuf,
}

impl StoragePaths {
    pub fn new(workspace: &Path, data_dir: &Path, metadata_dir: &str, marker_file: &str) -> Self {
        let metadata_dir = workspace.join(metadata_dir);
        let durable = metadata_dir.join(marker_file);
        let mut backup = durable.clone().into_os_string();
        backup.push(".bck");
        Self {
            metadata_dir,
            durable,
            backup: PathBuf::from(backup),
            staging: data_dir.join("tmp").join(marker_file),
        }
    }
}

/// Storage manager for a single workspace.
pub struct Storage {
    paths: StoragePaths,
    fs: Box<dyn FileSystem>,
}

impl Storage {
    /// Open storage for a workspace using the default data directory.
    pub fn open(workspace: &Path, metadata_dir: &str, marker_file: &str) -> Result<Self> {
        let data_dir = get_data_dir(workspace)?;
        Ok(Self::with_dirs(workspace, &data_dir, metadata_dir, marker_file))
    }

    /// Storage on the local filesystem with an explicit data directory.
    pub fn with_dirs(
        workspace: &Path,
        data_dir: &Path,
        metadata_dir: &str,
        marker_file: &str,
    ) -> Self {
        Self::with_fs(
            StoragePaths::new(workspace, data_dir, metadata_dir, marker_file),
            Box::new(LocalFs),
        )
    }

    /// Storage over any filesystem implementation.
    pub fn with_fs(paths: StoragePaths, fs: Box<dyn FileSystem>) -> Self {
        Self { paths, fs }
    }

    pub fn paths(&self) -> &StoragePaths {
        &self.paths
    }

    /// Path of the durable document.
    pub fn durable_path(&self) -> &Path {
        &self.paths.durable
    }

    /// Check if a durable document exists.
    pub fn exists(&self) -> bool {
        self.fs.exists(&self.paths.durable)
    }

    /// Read and parse the durable document.
    ///
    /// Returns `Ok(None)` for an empty file. When the durable file is gone but
    /// a backup survived a failed commit, the backup is read instead.
    pub fn read_document(&self) -> Result<Option<WaypointDocument>> {
        let path = if self.fs.exists(&self.paths.durable) {
            &self.paths.durable
        } else if self.fs.exists(&self.paths.backup) {
            warn!(
                backup = %self.paths.backup.display(),
                "Waypoint file missing, recovering from backup"
            );
            &self.paths.backup
        } else {
            return Err(Error::NotFound(format!(
                "Waypoint file {}",
                self.paths.durable.display()
            )));
        };
        if !self.fs.check_access(path, AccessMode::Read) {
            return Err(Error::Access(path.clone()));
        }

        let content = self.fs.read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Persist a serialized document.
    pub fn save(&self, serialized: &str) -> Result<()> {
        let trimmed = serialized.trim();
        if trimmed.is_empty() || trimmed == "{}" {
            return Err(Error::Validation(
                "Refusing to save an empty waypoint document".to_string(),
            ));
        }

        if !self.fs.exists(&self.paths.metadata_dir) {
            self.fs.create_dir_all(&self.paths.metadata_dir)?;
        }
        self.write_staged(serialized)?;
        self.commit()
    }

    /// Truncate and write the staging file. Never touches the durable file.
    pub fn write_staged(&self, content: &str) -> Result<()> {
        if let Some(dir) = self.paths.staging.parent() {
            self.fs.create_dir_all(dir)?;
        }
        if !self.fs.check_access(&self.paths.staging, AccessMode::Write) {
            return Err(Error::Access(self.paths.staging.clone()));
        }
        self.fs.write(&self.paths.staging, content)?;
        debug!(path = %self.paths.staging.display(), bytes = content.len(), "Staged waypoint document");
        Ok(())
    }

    /// Replace the durable file with the staged one.
    pub fn commit(&self) -> Result<()> {
        let StoragePaths {
            durable,
            backup,
            staging,
            ..
        } = &self.paths;

        if !self.fs.exists(staging) {
            return Err(Error::NotFound(format!(
                "Staged waypoint file {}",
                staging.display()
            )));
        }

        let had_durable = self.fs.exists(durable);
        if had_durable {
            if self.fs.exists(backup) {
                self.fs.remove(backup)?;
            }
            self.fs.copy(durable, backup)?;
            debug!(path = %backup.display(), "Backed up waypoint file");
        }

        if let Err(e) = self.swap(durable, staging) {
            let restored = if had_durable {
                self.restore(durable, backup)
            } else {
                self.discard_partial(durable)
            };
            error!(error = %e, restored, "Failed to replace waypoint file");
            return Err(Error::CommitFailed {
                restored,
                source: into_io(e),
            });
        }

        // A backup this commit did not make may be the only copy left
        if had_durable {
            if let Err(e) = self.fs.remove(backup) {
                warn!(error = %e, backup = %backup.display(), "Committed waypoint file but could not remove backup");
            }
        }
        debug!(path = %durable.display(), "Committed waypoint file");
        Ok(())
    }

    fn swap(&self, durable: &Path, staging: &Path) -> Result<()> {
        if self.fs.exists(durable) {
            self.fs.remove(durable)?;
        }
        self.fs.copy(staging, durable)
    }

    /// Put the backup back in place. The backup is kept if this fails.
    fn restore(&self, durable: &Path, backup: &Path) -> bool {
        match self.fs.copy(backup, durable) {
            Ok(()) => {
                if let Err(e) = self.fs.remove(backup) {
                    warn!(error = %e, "Restored waypoint file but could not remove backup");
                }
                true
            }
            Err(e) => {
                error!(error = %e, backup = %backup.display(), "Failed to restore waypoint file from backup");
                false
            }
        }
    }

    /// First save failed: leave no half-written durable file behind.
    fn discard_partial(&self, durable: &Path) -> bool {
        !self.fs.exists(durable) || self.fs.remove(durable).is_ok()
    }
}

fn into_io(e: Error) -> io::Error {
    match e {
        Error::Io(e) => e,
        other => io::Error::other(other.to_string()),
    }
}

/// Get the data directory for a workspace.
///
/// `WP_DATA_DIR` wins when set. Otherwise a hash of the canonical workspace
/// path selects a unique directory under `~/.local/share/waypoint/`.
pub fn get_data_dir(workspace: &Path) -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|d| !d.is_empty()) {
        return Ok(PathBuf::from(dir));
    }

    let data_dir = dirs::data_dir()
        .ok_or_else(|| Error::Config("Could not determine data directory".to_string()))?;
    Ok(data_dir.join("waypoint").join(workspace_hash(workspace)?))
}

/// First 12 hex characters of the SHA-256 of the canonical workspace path.
pub fn workspace_hash(workspace: &Path) -> Result<String> {
    let canonical = workspace.canonicalize()?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string_lossy().as_bytes());
    let hash_hex = format!("{:x}", hasher.finalize());
    Ok(hash_hex[..12].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Wraps `LocalFs`, failing copies into (or removals of) chosen targets.
    struct FaultyFs {
        fail_copy_to: Mutex<Vec<PathBuf>>,
        fail_remove: Mutex<Vec<PathBuf>>,
    }

    impl FaultyFs {
        fn failing(targets: &[&Path]) -> Self {
            Self {
                fail_copy_to: Mutex::new(targets.iter().map(|p| p.to_path_buf()).collect()),
                fail_remove: Mutex::new(Vec::new()),
            }
        }

        fn failing_remove(targets: &[&Path]) -> Self {
            Self {
                fail_copy_to: Mutex::new(Vec::new()),
                fail_remove: Mutex::new(targets.iter().map(|p| p.to_path_buf()).collect()),
            }
        }
    }

    impl FileSystem for FaultyFs {
        fn exists(&self, path: &Path) -> bool {
            LocalFs.exists(path)
        }
        fn check_access(&self, path: &Path, mode: AccessMode) -> bool {
            LocalFs.check_access(path, mode)
        }
        fn read_to_string(&self, path: &Path) -> Result<String> {
            LocalFs.read_to_string(path)
        }
        fn write(&self, path: &Path, content: &str) -> Result<()> {
            LocalFs.write(path, content)
        }
        fn copy(&self, from: &Path, to: &Path) -> Result<()> {
            if self.fail_copy_to.lock().unwrap().iter().any(|p| p == to) {
                return Err(Error::Io(io::Error::other("injected copy failure")));
            }
            LocalFs.copy(from, to)
        }
        fn remove(&self, path: &Path) -> Result<()> {
            if self.fail_remove.lock().unwrap().iter().any(|p| p == path) {
                return Err(Error::Io(io::Error::other("injected remove failure")));
            }
            LocalFs.remove(path)
        }
        fn create_dir_all(&self, path: &Path) -> Result<()> {
            LocalFs.create_dir_all(path)
        }
    }

    struct Fixture {
        workspace: TempDir,
        data: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                workspace: TempDir::new().unwrap(),
                data: TempDir::new().unwrap(),
            }
        }

        fn paths(&self) -> StoragePaths {
            StoragePaths::new(
                self.workspace.path(),
                self.data.path(),
                DEFAULT_METADATA_DIR,
                DEFAULT_MARKER_FILE,
            )
        }

        fn storage(&self) -> Storage {
            Storage::with_fs(self.paths(), Box::new(LocalFs))
        }

        fn faulty(&self, targets: &[&Path]) -> Storage {
            Storage::with_fs(self.paths(), Box::new(FaultyFs::failing(targets)))
        }
    }

    const DOC_A: &str = r#"{"activeJourney":"A","journeys":[]}"#;
    const DOC_B: &str = r#"{"activeJourney":"B","journeys":[]}"#;

    #[test]
    fn test_paths_layout() {
        let paths = StoragePaths::new(Path::new("/ws"), Path::new("/data"), ".meta", "wp.json");
        assert_eq!(paths.durable, PathBuf::from("/ws/.meta/wp.json"));
        assert_eq!(paths.backup, PathBuf::from("/ws/.meta/wp.json.bck"));
        assert_eq!(paths.staging, PathBuf::from("/data/tmp/wp.json"));
    }

    #[test]
    fn test_save_and_read() {
        let fx = Fixture::new();
        let storage = fx.storage();

        storage.save(DOC_A).unwrap();
        let doc = storage.read_document().unwrap().unwrap();
        assert_eq!(doc.active_journey.as_deref(), Some("A"));

        storage.save(DOC_B).unwrap();
        assert_eq!(fs::read_to_string(storage.durable_path()).unwrap(), DOC_B);
        assert!(!storage.paths().backup.exists());
    }

    #[test]
    fn test_save_rejects_empty_documents() {
        let fx = Fixture::new();
        let storage = fx.storage();
        for input in ["", "   ", "{}", " {} "] {
            assert!(matches!(storage.save(input), Err(Error::Validation(_))));
        }
        assert!(!storage.exists());
        assert!(!storage.paths().metadata_dir.exists());
    }

    #[test]
    fn test_read_missing_empty_and_invalid() {
        let fx = Fixture::new();
        let storage = fx.storage();
        assert!(matches!(storage.read_document(), Err(Error::NotFound(_))));

        fs::create_dir_all(&storage.paths().metadata_dir).unwrap();
        fs::write(storage.durable_path(), "  \n").unwrap();
        assert!(storage.read_document().unwrap().is_none());

        fs::write(storage.durable_path(), "{not json").unwrap();
        assert!(matches!(storage.read_document(), Err(Error::Parse(_))));
    }

    #[test]
    fn test_commit_without_staged_file() {
        let fx = Fixture::new();
        assert!(matches!(fx.storage().commit(), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_failed_restore_keeps_backup() {
        let fx = Fixture::new();
        fx.storage().save(DOC_A).unwrap();
        let paths = fx.paths();
        let before = fs::read(&paths.durable).unwrap();

        // Every copy into the durable path fails, the restore included
        let faulty = FaultyFs::failing(&[&paths.durable]);
        let storage = Storage::with_fs(paths.clone(), Box::new(faulty));
        storage.write_staged(DOC_B).unwrap();
        let result = storage.commit();

        match result {
            Err(Error::CommitFailed { restored, .. }) => assert!(!restored),
            other => panic!("expected CommitFailed, got {:?}", other.map(|_| ())),
        }
        assert_eq!(fs::read(&paths.backup).unwrap(), before);
    }

    #[test]
    fn test_kept_backup_survives_next_session() {
        let fx = Fixture::new();
        fx.storage().save(DOC_A).unwrap();
        let paths = fx.paths();

        let storage = fx.faulty(&[&paths.durable]);
        assert!(matches!(
            storage.save(DOC_B),
            Err(Error::CommitFailed { restored: false, .. })
        ));
        assert!(!paths.durable.exists());

        // A fresh process reads the backup, then saves over it
        let storage = fx.storage();
        let doc = storage.read_document().unwrap().unwrap();
        assert_eq!(doc.active_journey.as_deref(), Some("A"));

        storage.save(DOC_B).unwrap();
        assert_eq!(fs::read_to_string(&paths.durable).unwrap(), DOC_B);
        assert_eq!(fs::read_to_string(&paths.backup).unwrap(), DOC_A);

        // The next regular commit replaces the stale backup and clears it
        storage.save(DOC_A).unwrap();
        assert!(!paths.backup.exists());
    }

    #[test]
    fn test_backup_cleanup_failure_still_commits() {
        let fx = Fixture::new();
        fx.storage().save(DOC_A).unwrap();
        let paths = fx.paths();

        let storage = Storage::with_fs(
            paths.clone(),
            Box::new(FaultyFs::failing_remove(&[&paths.backup])),
        );
        storage.save(DOC_B).unwrap();
        assert_eq!(fs::read_to_string(&paths.durable).unwrap(), DOC_B);
    }

    #[test]
    fn test_failed_swap_with_successful_restore() {
        let fx = Fixture::new();
        fx.storage().save(DOC_A).unwrap();
        let paths = fx.paths();
        let before = fs::read(&paths.durable).unwrap();

        let storage = Storage::with_fs(paths.clone(), Box::new(FailOnce::new(&paths.durable)));
        let result = storage.save(DOC_B);

        assert!(matches!(
            result,
            Err(Error::CommitFailed { restored: true, .. })
        ));
        assert_eq!(fs::read(&paths.durable).unwrap(), before);
        assert!(!paths.backup.exists());
    }

    #[test]
    fn test_failed_backup_leaves_durable_untouched() {
        let fx = Fixture::new();
        fx.storage().save(DOC_A).unwrap();
        let paths = fx.paths();

        let storage = fx.faulty(&[&paths.backup]);
        assert!(matches!(storage.save(DOC_B), Err(Error::Io(_))));
        assert_eq!(fs::read_to_string(&paths.durable).unwrap(), DOC_A);
    }

    #[test]
    fn test_failed_first_save_leaves_no_file() {
        let fx = Fixture::new();
        let paths = fx.paths();
        let storage = fx.faulty(&[&paths.durable]);

        assert!(matches!(
            storage.save(DOC_A),
            Err(Error::CommitFailed { restored: true, .. })
        ));
        assert!(!paths.durable.exists());
        assert!(!paths.backup.exists());
    }

    #[test]
    fn test_workspace_hash_is_stable() {
        let dir = TempDir::new().unwrap();
        let a = workspace_hash(dir.path()).unwrap();
        let b = workspace_hash(dir.path()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 12);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    /// Fails only the first copy into `target`.
    struct FailOnce {
        target: PathBuf,
        tripped: Mutex<bool>,
    }

    impl FailOnce {
        fn new(target: &Path) -> Self {
            Self {
                target: target.to_path_buf(),
                tripped: Mutex::new(false),
            }
        }
    }

    impl FileSystem for FailOnce {
        fn exists(&self, path: &Path) -> bool {
            LocalFs.exists(path)
        }
        fn check_access(&self, path: &Path, mode: AccessMode) -> bool {
            LocalFs.check_access(path, mode)
        }
        fn read_to_string(&self, path: &Path) -> Result<String> {
            LocalFs.read_to_string(path)
        }
        fn write(&self, path: &Path, content: &str) -> Result<()> {
            LocalFs.write(path, content)
        }
        fn copy(&self, from: &Path, to: &Path) -> Result<()> {
            let mut tripped = self.tripped.lock().unwrap();
            if to == self.target && !*tripped {
                *tripped = true;
                return Err(Error::Io(io::Error::other("injected copy failure")));
            }
            LocalFs.copy(from, to)
        }
        fn remove(&self, path: &Path) -> Result<()> {
            LocalFs.remove(path)
        }
        fn create_dir_all(&self, path: &Path) -> Result<()> {
            LocalFs.create_dir_all(path)
        }
    }
}
