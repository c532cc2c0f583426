//! Waypoint CLI - line bookmarks grouped into journeys.

use clap::Parser;
use std::env;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Instant;
use tracing_subscriber::EnvFilter;
use waypoint::action_log;
use waypoint::cli::{Cli, Commands, ConfigCommands, JourneyCommands};
use waypoint::commands::{self, Output};
use waypoint::config::{
    ConfigOverrides, ConfigPaths, OutputFormat, ResolvedConfig, resolve_config,
};
use waypoint::editor::Workspace;
#[cfg(feature = "watch")]
use waypoint::session::StderrNotifier;
use waypoint::session::{Notifier, Session, SilentNotifier};
use waypoint::storage::{self, DEFAULT_METADATA_DIR, Storage};

/// Environment variable holding the log filter.
const LOG_ENV: &str = "WP_LOG";

fn main() {
    let cli = Cli::parse();
    init_logging();

    let mut human = cli.human_readable;

    // Determine workspace: -C flag > WP_WORKSPACE env > nearest marked ancestor > cwd
    let workspace_root = resolve_workspace_path(cli.workspace, human);

    let data_dir = match storage::get_data_dir(&workspace_root) {
        Ok(dir) => dir,
        Err(e) => fail(&e, human),
    };
    let config_paths = ConfigPaths::for_data_dir(&data_dir);
    let config = match resolve_config(&config_paths, &overrides(&cli.command, human)) {
        Ok(config) => config,
        Err(e) => fail(&e, human),
    };
    human = config.output_format() == OutputFormat::Human;

    let (cmd_name, args_json) = serialize_command(&cli.command);
    let start = Instant::now();

    let result = run_command(
        cli.command,
        &workspace_root,
        &data_dir,
        &config,
        &config_paths,
        human,
    );

    let duration = start.elapsed().as_millis() as u64;
    let (success, error) = match &result {
        Ok(_) => (true, None),
        Err(e) => (false, Some(e.to_string())),
    };

    if config.action_log() {
        action_log::log_action(
            &action_log::log_path(&data_dir),
            &workspace_root,
            &cmd_name,
            args_json,
            success,
            error,
            duration,
        );
    }

    if let Err(e) = result {
        fail(&e, human);
    }
}

/// Send diagnostics to stderr, filtered by `WP_LOG` (warnings by default).
fn init_logging() {
    let filter = EnvFilter::builder()
        .with_default_directive(tracing::Level::WARN.into())
        .with_env_var(LOG_ENV)
        .from_env_lossy();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Print an error the way the output format expects and exit.
fn fail(error: &waypoint::Error, human: bool) -> ! {
    if human {
        eprintln!("Error: {}", error);
    } else {
        eprintln!("{}", serde_json::json!({ "error": error.to_string() }));
    }
    process::exit(1);
}

/// Resolve the workspace root from an explicit path or the current directory.
///
/// An explicit path (via -C/--workspace or WP_WORKSPACE) is used as-is.
/// Otherwise the nearest ancestor holding a waypoint folder or a `.git`
/// directory wins, falling back to the current directory.
fn resolve_workspace_path(explicit_path: Option<PathBuf>, human: bool) -> PathBuf {
    match explicit_path {
        Some(path) => {
            if !path.is_dir() {
                let e = waypoint::Error::NotFound(format!(
                    "Workspace directory {}",
                    path.display()
                ));
                fail(&e, human);
            }
            path
        }
        None => {
            let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            find_workspace_root(&cwd).unwrap_or(cwd)
        }
    }
}

fn find_workspace_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(DEFAULT_METADATA_DIR).is_dir() || dir.join(".git").exists())
        .map(Path::to_path_buf)
}

/// CLI values that take precedence over the config files.
fn overrides(command: &Option<Commands>, human: bool) -> ConfigOverrides {
    let mut overrides = ConfigOverrides::new();
    if human {
        overrides = overrides.with_output_format(OutputFormat::Human);
    }
    #[cfg(feature = "watch")]
    let overrides = match command {
        Some(Commands::Watch {
            debounce_ms: Some(ms),
        }) => overrides.with_debounce_ms(*ms),
        _ => overrides,
    };
    #[cfg(not(feature = "watch"))]
    let _ = command;
    overrides
}

fn open_session(
    workspace_root: &Path,
    data_dir: &Path,
    config: &ResolvedConfig,
    notifier: Box<dyn Notifier>,
) -> Session {
    let workspace = Workspace::new(workspace_root);
    let storage = Storage::with_dirs(
        workspace.root(),
        data_dir,
        config.metadata_dir(),
        config.marker_file(),
    );
    Session::open(workspace, storage, notifier)
}

fn run_command(
    command: Option<Commands>,
    workspace_root: &Path,
    data_dir: &Path,
    config: &ResolvedConfig,
    config_paths: &ConfigPaths,
    human: bool,
) -> Result<(), waypoint::Error> {
    // Config commands never touch the waypoint file.
    if let Some(Commands::Config { command }) = &command {
        match command {
            ConfigCommands::Show => output(&commands::config_show(config, config_paths), human),
            ConfigCommands::Set { key, value, system } => {
                let result = commands::config_set(config_paths, key, value, *system)?;
                output(&result, human);
            }
        }
        return Ok(());
    }

    // One-shot commands report errors through `fail`.
    let notifier: Box<dyn Notifier> = match &command {
        #[cfg(feature = "watch")]
        Some(Commands::Watch { .. }) => Box::new(StderrNotifier),
        _ => Box::new(SilentNotifier),
    };
    let mut session = open_session(workspace_root, data_dir, config, notifier);

    match command {
        None | Some(Commands::Show { id: None }) => {
            output(&commands::show(&session, None)?, human);
        }
        Some(Commands::Show { id: Some(id) }) => {
            output(&commands::show(&session, Some(&id))?, human);
        }
        Some(Commands::Journey { command }) => match command {
            JourneyCommands::Add { name } => {
                let result = commands::journey_add(&mut session, name.as_deref())?;
                output(&result, human);
            }
            JourneyCommands::Rename { old, new } => {
                let result = commands::journey_rename(&mut session, &old, &new)?;
                output(&result, human);
            }
            JourneyCommands::Activate { name } => {
                let result = commands::journey_activate(&mut session, &name)?;
                output(&result, human);
            }
            JourneyCommands::List => output(&commands::journey_list(&session), human),
        },
        Some(Commands::Mark { file, line }) => {
            let result = commands::mark(&mut session, &file, line)?;
            output(&result, human);
        }
        Some(Commands::Rm { ids }) => {
            let result = commands::rm(&mut session, &ids)?;
            output(&result, human);
        }
        Some(Commands::Comment { id, text }) => {
            let result = commands::comment(&mut session, &id, text.as_deref())?;
            output(&result, human);
        }
        Some(Commands::Mv { old, new }) => {
            let result = commands::mv(&mut session, &old, &new)?;
            output(&result, human);
        }
        Some(Commands::Files) => output(&commands::files(&session), human),
        Some(Commands::Next { from }) => {
            let result = commands::next(&mut session, from.as_deref())?;
            output(&result, human);
        }
        Some(Commands::Prev { from }) => {
            let result = commands::prev(&mut session, from.as_deref())?;
            output(&result, human);
        }
        Some(Commands::Reconcile { files }) => {
            let result = commands::reconcile(&mut session, &files)?;
            output(&result, human);
        }
        #[cfg(feature = "watch")]
        Some(Commands::Watch { .. }) => {
            let debounce = std::time::Duration::from_millis(config.debounce_ms());
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            runtime.block_on(waypoint::watch::watch_workspace(
                &mut session,
                data_dir,
                debounce,
            ))?;
        }
        Some(Commands::Config { .. }) => {}
    }

    Ok(())
}

/// Print output in JSON or human-readable format.
fn output<T: Output>(result: &T, human: bool) {
    if human {
        println!("{}", result.to_human());
    } else {
        println!("{}", result.to_json());
    }
}

/// Command name and arguments for the action log.
fn serialize_command(command: &Option<Commands>) -> (String, serde_json::Value) {
    match command {
        None => ("show".to_string(), serde_json::json!({})),

        Some(Commands::Show { id }) => ("show".to_string(), serde_json::json!({ "id": id })),

        Some(Commands::Journey { command }) => match command {
            JourneyCommands::Add { name } => (
                "journey add".to_string(),
                serde_json::json!({ "name": name }),
            ),
            JourneyCommands::Rename { old, new } => (
                "journey rename".to_string(),
                serde_json::json!({ "old": old, "new": new }),
            ),
            JourneyCommands::Activate { name } => (
                "journey activate".to_string(),
                serde_json::json!({ "name": name }),
            ),
            JourneyCommands::List => ("journey list".to_string(), serde_json::json!({})),
        },

        Some(Commands::Mark { file, line }) => (
            "mark".to_string(),
            serde_json::json!({ "file": file, "line": line }),
        ),

        Some(Commands::Rm { ids }) => ("rm".to_string(), serde_json::json!({ "ids": ids })),

        Some(Commands::Comment { id, text }) => (
            "comment".to_string(),
            serde_json::json!({ "id": id, "text": text }),
        ),

        Some(Commands::Mv { old, new }) => (
            "mv".to_string(),
            serde_json::json!({ "old": old, "new": new }),
        ),

        Some(Commands::Files) => ("files".to_string(), serde_json::json!({})),

        Some(Commands::Next { from }) => ("next".to_string(), serde_json::json!({ "from": from })),

        Some(Commands::Prev { from }) => ("prev".to_string(), serde_json::json!({ "from": from })),

        Some(Commands::Reconcile { files }) => (
            "reconcile".to_string(),
            serde_json::json!({ "files": files }),
        ),

        #[cfg(feature = "watch")]
        Some(Commands::Watch { debounce_ms }) => (
            "watch".to_string(),
            serde_json::json!({ "debounce_ms": debounce_ms }),
        ),

        Some(Commands::Config { command }) => match command {
            ConfigCommands::Show => ("config show".to_string(), serde_json::json!({})),
            ConfigCommands::Set { key, value, system } => (
                "config set".to_string(),
                serde_json::json!({ "key": key, "value": value, "system": system }),
            ),
        },
    }
}
