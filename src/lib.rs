//! Waypoint - line bookmarks grouped into journeys.
//!
//! This library provides the core functionality for the `wp` CLI tool:
//! the journey/file/waypoint tree, its crash-safe JSON persistence, and the
//! reconciliation pass that keeps bookmarked line numbers in place as files
//! are edited.

pub mod action_log;
pub mod cli;
pub mod commands;
pub mod config;
pub mod editor;
pub mod models;
pub mod reconcile;
pub mod session;
pub mod storage;
pub mod tree;
#[cfg(feature = "watch")]
pub mod watch;

use std::fmt;
use std::path::PathBuf;


/// Library-level error type for Waypoint operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid waypoint document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Cannot access {}", .0.display())]
    Access(PathBuf),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Please open a document to create a waypoint")]
    NoDocument,

    #[error("Line {line} is empty")]
    EmptyLine { line: u32 },

    #[error("Line is not unique ({occurrences} occurrences): {text}")]
    AmbiguousLine { text: String, occurrences: usize },

    #[error("Commit failed (restored from backup: {restored}): {source}")]
    CommitFailed {
        restored: bool,
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// The notification category this error belongs to.
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::Io(_) => ErrorClass::Io,
            Error::Parse(_) => ErrorClass::Parse,
            Error::Access(_) => ErrorClass::Access,
            Error::NotFound(_) => ErrorClass::NotFound,
            Error::Validation(_) => ErrorClass::Validation,
            Error::NoDocument => ErrorClass::NoDocument,
            Error::EmptyLine { .. } => ErrorClass::EmptyLine,
            Error::AmbiguousLine { .. } => ErrorClass::AmbiguousLine,
            Error::CommitFailed { .. } => ErrorClass::Commit,
            Error::Config(_) => ErrorClass::Config,
        }
    }
}

/// Error categories used to throttle user-visible notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorClass {
    Io,
    Parse,
    Access,
    NotFound,
    Validation,
    NoDocument,
    EmptyLine,
    AmbiguousLine,
    Commit,
    Config,
}

impl ErrorClass {
    /// Stable identifier for notification ids and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::Io => "io_error",
            ErrorClass::Parse => "parse_error",
            ErrorClass::Access => "access_error",
            ErrorClass::NotFound => "not_found",
            ErrorClass::Validation => "validation_error",
            ErrorClass::NoDocument => "no_document",
            ErrorClass::EmptyLine => "empty_line",
            ErrorClass::AmbiguousLine => "ambiguous_line",
            ErrorClass::Commit => "backup_waypoint_file_error",
            ErrorClass::Config => "config_error",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result type alias for Waypoint operations.
pub type Result<T> = std::result::Result<T, Error>;
