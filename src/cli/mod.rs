//! CLI argument definitions for Waypoint.

use clap::{Parser, Subcommand};

/// Waypoint - line bookmarks grouped into journeys.
///
/// Bookmark a line with `wp mark <file> <line>`, list them with `wp show`.
#[derive(Parser, Debug)]
#[command(name = "wp")]
#[command(
    author,
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("WP_GIT_COMMIT"), ")"),
    long_version = concat!(
        env!("CARGO_PKG_VERSION"),
        " (",
        env!("WP_GIT_COMMIT"),
        ", built ",
        env!("WP_BUILD_TIMESTAMP"),
        ")"
    ),
    about = "Line bookmarks grouped into journeys, kept in place as files are edited",
    long_about = None
)]
pub struct Cli {
    /// Output in human-readable format instead of JSON
    #[arg(short = 'H', long = "human", global = true)]
    pub human_readable: bool,

    /// Run as if wp was started in <path> instead of the current directory.
    /// The path is used as the workspace root as-is.
    /// Can also be set via WP_WORKSPACE environment variable.
    #[arg(short = 'C', long = "workspace", global = true, env = "WP_WORKSPACE")]
    pub workspace: Option<std::path::PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show every journey, or one node by ID
    Show {
        /// Node identifier
        id: Option<String>,
    },

    /// Journey management commands
    Journey {
        #[command(subcommand)]
        command: JourneyCommands,
    },

    /// Toggle a waypoint on a line (adds it, or removes an existing one)
    Mark {
        /// File path, relative to the workspace or absolute
        file: String,

        /// 1-based line number
        line: u32,
    },

    /// Remove journeys, files or waypoints by ID
    Rm {
        /// Node identifiers
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Set a comment on a node (omit the text to clear it)
    Comment {
        /// Node identifier
        id: String,

        /// Comment text
        text: Option<String>,
    },

    /// Follow a file rename
    Mv {
        /// Previous path
        old: String,

        /// New path
        new: String,
    },

    /// List bookmarked files and whether they still exist
    Files,

    /// Go to the next waypoint
    Next {
        /// Start from this waypoint instead of the first
        #[arg(long)]
        from: Option<String>,
    },

    /// Go to the previous waypoint
    Prev {
        /// Start from this waypoint instead of the last
        #[arg(long)]
        from: Option<String>,
    },

    /// Re-anchor waypoints of changed files (all bookmarked files by default)
    Reconcile {
        /// Files to reconcile
        files: Vec<String>,
    },

    /// Watch the workspace and reconcile files as they change
    #[cfg(feature = "watch")]
    Watch {
        /// Quiet period before reconciling, in milliseconds
        #[arg(long)]
        debounce_ms: Option<u64>,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

/// Journey subcommands
#[derive(Subcommand, Debug)]
pub enum JourneyCommands {
    /// Add a journey and make it active (defaults to the current date)
    Add {
        /// Journey name
        name: Option<String>,
    },

    /// Rename a journey
    Rename {
        /// Current name
        old: String,

        /// New name
        new: String,
    },

    /// Make a journey active
    Activate {
        /// Journey name
        name: String,
    },

    /// List journeys
    List,
}

/// Configuration subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show resolved configuration values and where they come from
    Show,

    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,

        /// Configuration value
        value: String,

        /// Write the system config instead of this workspace's
        #[arg(long)]
        system: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_mark() {
        let cli = Cli::try_parse_from(["wp", "-H", "mark", "src/main.rs", "12"]).unwrap();
        assert!(cli.human_readable);
        match cli.command {
            Some(Commands::Mark { file, line }) => {
                assert_eq!(file, "src/main.rs");
                assert_eq!(line, 12);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_rm_requires_ids() {
        assert!(Cli::try_parse_from(["wp", "rm"]).is_err());
    }

    #[test]
    fn test_config_set_system_flag() {
        let cli =
            Cli::try_parse_from(["wp", "config", "set", "debounce-ms", "10", "--system"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Config {
                command: ConfigCommands::Set { system: true, .. }
            })
        ));
    }
}
