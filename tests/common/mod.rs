//! Common test utilities for waypoint integration tests.
//!
//! Provides `TestEnv` for isolated test environments that don't pollute
//! the user's `~/.local/share/waypoint/` directory or system config.

#![allow(dead_code)]

use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
pub use tempfile::TempDir;

/// A test environment with isolated data storage.
///
/// Each `TestEnv` creates two temporary directories:
/// - `workspace_dir`: Acts as the workspace root
/// - `data_dir`: Holds waypoint's data (via `WP_DATA_DIR`) and, in a
///   `system/` subdirectory, the system config (via `WP_CONFIG_DIR`)
pub struct TestEnv {
    pub workspace_dir: TempDir,
    pub data_dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            workspace_dir: TempDir::new().unwrap(),
            data_dir: TempDir::new().unwrap(),
        }
    }

    /// Get a Command for the wp binary with isolated directories.
    pub fn wp(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_wp"));
        cmd.current_dir(self.workspace_dir.path());
        cmd.env("WP_DATA_DIR", self.data_dir.path());
        cmd.env("WP_CONFIG_DIR", self.system_config_dir());
        cmd.env_remove("WP_WORKSPACE");
        cmd.env_remove("WP_LOG");
        cmd
    }

    /// Run wp with `args`, assert success and parse stdout as JSON.
    pub fn wp_json(&self, args: &[&str]) -> serde_json::Value {
        let output = self.wp().args(args).assert().success().get_output().clone();
        serde_json::from_slice(&output.stdout).unwrap()
    }

    pub fn path(&self) -> &Path {
        self.workspace_dir.path()
    }

    pub fn data_path(&self) -> &Path {
        self.data_dir.path()
    }

    pub fn system_config_dir(&self) -> PathBuf {
        self.data_dir.path().join("system")
    }

    /// Path of the waypoint file with default config.
    pub fn waypoint_file(&self) -> PathBuf {
        self.path().join(".waypoint").join("waypoints.json")
    }

    /// Write a workspace file, creating parent directories.
    pub fn write_file(&self, rel: &str, contents: &str) {
        let path = self.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }

    /// Bookmark a line and return the new waypoint's identifier.
    pub fn mark(&self, file: &str, line: u32) -> String {
        let json = self.wp_json(&["mark", file, &line.to_string()]);
        assert_eq!(json["action"], "created");
        json["identifier"].as_str().unwrap().to_string()
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}
