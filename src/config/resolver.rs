//! Precedence resolution for configuration.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. CLI flags (passed at runtime)
//! 2. Session config.kdl (`<data-dir>/config.kdl`)
//! 3. System config.kdl (`~/.config/waypoint/config.kdl`)
//! 4. Built-in defaults

use crate::config::{OutputFormat, WaypointConfig};
use crate::session::DEFAULT_DEBOUNCE_MS;
use crate::storage::{DEFAULT_MARKER_FILE, DEFAULT_METADATA_DIR};
use crate::{Error, Result};
use kdl::KdlDocument;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable overriding the system config directory.
pub const CONFIG_DIR_ENV: &str = "WP_CONFIG_DIR";

/// Name of the config file at every level.
pub const CONFIG_FILE: &str = "config.kdl";

/// Tracks where a resolved value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    /// Value from session-level config
    Session,
    /// Value from system-level config
    System,
    /// Value from CLI flag
    CliFlag,
    /// Built-in default value
    Default,
}

impl std::fmt::Display for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueSource::Session => write!(f, "session"),
            ValueSource::System => write!(f, "system"),
            ValueSource::CliFlag => write!(f, "cli"),
            ValueSource::Default => write!(f, "default"),
        }
    }
}

/// A resolved value with its source.
#[derive(Debug, Clone)]
pub struct Resolved<T> {
    /// The resolved value
    pub value: T,
    /// Where the value came from
    pub source: ValueSource,
}

impl<T> Resolved<T> {
    pub fn new(value: T, source: ValueSource) -> Self {
        Self { value, source }
    }
}

/// Fully resolved configuration with source tracking.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub metadata_dir: Resolved<String>,
    pub marker_file: Resolved<String>,
    pub debounce_ms: Resolved<u64>,
    pub output_format: Resolved<OutputFormat>,
    pub action_log: Resolved<bool>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            metadata_dir: Resolved::new(DEFAULT_METADATA_DIR.to_string(), ValueSource::Default),
            marker_file: Resolved::new(DEFAULT_MARKER_FILE.to_string(), ValueSource::Default),
            debounce_ms: Resolved::new(DEFAULT_DEBOUNCE_MS, ValueSource::Default),
            output_format: Resolved::new(OutputFormat::Json, ValueSource::Default),
            action_log: Resolved::new(true, ValueSource::Default),
        }
    }
}

impl ResolvedConfig {
    pub fn metadata_dir(&self) -> &str {
        &self.metadata_dir.value
    }

    pub fn marker_file(&self) -> &str {
        &self.marker_file.value
    }

    pub fn debounce_ms(&self) -> u64 {
        self.debounce_ms.value
    }

    pub fn output_format(&self) -> OutputFormat {
        self.output_format.value
    }

    pub fn action_log(&self) -> bool {
        self.action_log.value
    }

    /// Every key with its textual value and source, in schema order.
    pub fn entries(&self) -> Vec<(&'static str, String, &ValueSource)> {
        vec![
            ("metadata-dir", self.metadata_dir.value.clone(), &self.metadata_dir.source),
            ("marker-file", self.marker_file.value.clone(), &self.marker_file.source),
            ("debounce-ms", self.debounce_ms.value.to_string(), &self.debounce_ms.source),
            ("output-format", self.output_format.value.to_string(), &self.output_format.source),
            ("action-log", self.action_log.value.to_string(), &self.action_log.source),
        ]
    }
}

/// CLI overrides for configuration resolution.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub debounce_ms: Option<u64>,
    pub output_format: Option<OutputFormat>,
}

impl ConfigOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set debounce override.
    pub fn with_debounce_ms(mut self, ms: u64) -> Self {
        self.debounce_ms = Some(ms);
        self
    }

    /// Set output format override.
    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = Some(format);
        self
    }
}

/// Locations of the config files for one workspace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigPaths {
    pub system: Option<PathBuf>,
    pub session: Option<PathBuf>,
}

impl ConfigPaths {
    /// System config plus the session config inside `data_dir`.
    pub fn for_data_dir(data_dir: &Path) -> Self {
        Self {
            system: Self::system_config_path(),
            session: Some(data_dir.join(CONFIG_FILE)),
        }
    }

    /// `$WP_CONFIG_DIR/config.kdl`, else `~/.config/waypoint/config.kdl`.
    pub fn system_config_path() -> Option<PathBuf> {
        match std::env::var_os(CONFIG_DIR_ENV).filter(|d| !d.is_empty()) {
            Some(dir) => Some(PathBuf::from(dir).join(CONFIG_FILE)),
            None => dirs::config_dir().map(|d| d.join("waypoint").join(CONFIG_FILE)),
        }
    }

    /// The file `wp config set` writes to.
    pub fn target(&self, system: bool) -> Result<&Path> {
        let path = if system { &self.system } else { &self.session };
        path.as_deref()
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))
    }
}

/// Read a config file. A missing file is an empty config.
pub fn read_config_file(path: &Path) -> Result<WaypointConfig> {
    if !path.exists() {
        return Ok(WaypointConfig::default());
    }
    let content = fs::read_to_string(path)?;
    let doc: KdlDocument = content
        .parse()
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
    let config = WaypointConfig::from_kdl(&doc);
    config
        .validate()
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
    Ok(config)
}

/// Write a config file, creating its directory.
pub fn write_config_file(path: &Path, config: &WaypointConfig) -> Result<()> {
    config.validate().map_err(Error::Config)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, config.to_kdl().to_string())?;
    Ok(())
}

fn read_optional(path: Option<&Path>) -> Result<WaypointConfig> {
    match path {
        Some(path) => read_config_file(path),
        None => Ok(WaypointConfig::default()),
    }
}

fn pick<T>(cli: Option<T>, session: Option<T>, system: Option<T>, default: T) -> Resolved<T> {
    if let Some(value) = cli {
        Resolved::new(value, ValueSource::CliFlag)
    } else if let Some(value) = session {
        Resolved::new(value, ValueSource::Session)
    } else if let Some(value) = system {
        Resolved::new(value, ValueSource::System)
    } else {
        Resolved::new(default, ValueSource::Default)
    }
}

/// Resolve configuration with full precedence chain.
pub fn resolve_config(paths: &ConfigPaths, overrides: &ConfigOverrides) -> Result<ResolvedConfig> {
    let system = read_optional(paths.system.as_deref())?;
    let session = read_optional(paths.session.as_deref())?;
    let defaults = ResolvedConfig::default();

    Ok(ResolvedConfig {
        metadata_dir: pick(
            None,
            session.metadata_dir,
            system.metadata_dir,
            defaults.metadata_dir.value,
        ),
        marker_file: pick(
            None,
            session.marker_file,
            system.marker_file,
            defaults.marker_file.value,
        ),
        debounce_ms: pick(
            overrides.debounce_ms,
            session.debounce_ms,
            system.debounce_ms,
            defaults.debounce_ms.value,
        ),
        output_format: pick(
            overrides.output_format,
            session.output_format,
            system.output_format,
            defaults.output_format.value,
        ),
        action_log: pick(
            None,
            session.action_log,
            system.action_log,
            defaults.action_log.value,
        ),
    })
}
