//! Filesystem primitives used by the storage layer.
//!
//! This module provides:
//! - `FileSystem` - The operations the commit protocol needs
//! - `LocalFs` - The real implementation on the local disk

use crate::Result;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Kind of access checked by [`FileSystem::check_access`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    Write,
}

impl AccessMode {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

impl std::fmt::Display for AccessMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Trait for the filesystem operations behind persistence.
///
/// Tests wrap `LocalFs` to inject failures at specific steps.
pub trait FileSystem: Send + Sync {
    /// Check whether a path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Check whether a path can be opened with the given access.
    fn check_access(&self, path: &Path, mode: AccessMode) -> bool;

    /// Read a whole file as UTF-8.
    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Truncate and write a file.
    fn write(&self, path: &Path, content: &str) -> Result<()>;

    /// Copy `from` over `to`. Readers of `to` never see a partial file.
    fn copy(&self, from: &Path, to: &Path) -> Result<()>;

    /// Remove a file.
    fn remove(&self, path: &Path) -> Result<()>;

    /// Create a directory and all of its parents.
    fn create_dir_all(&self, path: &Path) -> Result<()>;
}

/// Local disk implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl FileSystem for LocalFs {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn check_access(&self, path: &Path, mode: AccessMode) -> bool {
        match mode {
            AccessMode::Read => OpenOptions::new().read(true).open(path).is_ok(),
            AccessMode::Write => {
                if path.exists() {
                    OpenOptions::new().append(true).open(path).is_ok()
                } else {
                    path.parent()
                        .and_then(|p| fs::metadata(p).ok())
                        .is_some_and(|m| m.is_dir() && !m.permissions().readonly())
                }
            }
        }
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        Ok(fs::read_to_string(path)?)
    }

    fn write(&self, path: &Path, content: &str) -> Result<()> {
        fs::write(path, content)?;
        Ok(())
    }

    fn copy(&self, from: &Path, to: &Path) -> Result<()> {
        let content = fs::read(from)?;
        let dir = to.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&content)?;
        tmp.as_file().sync_all()?;
        tmp.persist(to).map_err(|e| e.error)?;
        Ok(())
    }

    fn remove(&self, path: &Path) -> Result<()> {
        fs::remove_file(path)?;
        Ok(())
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_copy_replaces_target() {
        let dir = TempDir::new().unwrap();
        let from = dir.path().join("a.json");
        let to = dir.path().join("b.json");
        fs::write(&from, "new").unwrap();
        fs::write(&to, "old").unwrap();

        LocalFs.copy(&from, &to).unwrap();

        assert_eq!(fs::read_to_string(&to).unwrap(), "new");
        assert_eq!(fs::read_to_string(&from).unwrap(), "new");
        // No temporary siblings left behind
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn test_copy_missing_source_fails() {
        let dir = TempDir::new().unwrap();
        let result = LocalFs.copy(&dir.path().join("nope"), &dir.path().join("b"));
        assert!(result.is_err());
        assert!(!dir.path().join("b").exists());
    }

    #[test]
    fn test_check_access() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("f");
        assert!(!LocalFs.check_access(&file, AccessMode::Read));
        assert!(LocalFs.check_access(&file, AccessMode::Write));
        fs::write(&file, "x").unwrap();
        assert!(LocalFs.check_access(&file, AccessMode::Read));
    }
}
