//! Configuration for Waypoint.
//!
//! Preferences live in KDL files:
//! - System: `~/.config/waypoint/config.kdl` (or `$WP_CONFIG_DIR/config.kdl`)
//! - Session: `<data-dir>/config.kdl`, one per workspace
//!
//! Contains:
//! - `metadata-dir` - Project-local folder of the waypoint file
//! - `marker-file` - File name of the waypoint file
//! - `debounce-ms` - Quiet period of `wp watch` (0-60000)
//! - `output-format` - "json" or "human"
//! - `action-log` - Whether commands are appended to the action log
//!
//! ## Precedence
//!
//! CLI flag > session config > system config > defaults
//!
//! Use the [`resolver`] module for precedence resolution.

pub mod resolver;
pub mod schema;

pub use resolver::{
    CONFIG_DIR_ENV, CONFIG_FILE, ConfigOverrides, ConfigPaths, Resolved, ResolvedConfig,
    ValueSource, read_config_file, resolve_config, write_config_file,
};
pub use schema::{CONFIG_KEYS, MAX_DEBOUNCE_MS, OutputFormat, WaypointConfig};
