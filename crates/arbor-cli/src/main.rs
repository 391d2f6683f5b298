//! # arbor
//!
//! Command-line driver for the arbor task store. Every command prints its
//! result as pretty JSON on stdout; logs go to stderr.

#![deny(unsafe_code)]

mod logging;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use arbor_settings::{ArborSettings, DatabaseSettings};
use arbor_tasks::{ArborError, ConnectionConfig, TaskField, TaskId, TaskStore, TreeScope};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use tracing::{error, info};

/// Hierarchical task store.
#[derive(Parser, Debug)]
#[command(name = "arbor", about = "Hierarchical task store", version)]
struct Cli {
    /// Path to the `SQLite` database (overrides settings).
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Settings file (default: `~/.arbor/settings.json`).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Create a root task.
    Create {
        /// Task title.
        title: String,
    },
    /// Show a task with its subtree.
    Show {
        /// Task ID.
        id: TaskId,
    },
    /// List the forest, or only the given tasks.
    List {
        /// Restrict the listing to these task IDs (comma separated).
        #[arg(long, value_delimiter = ',')]
        ids: Vec<TaskId>,
    },
    /// Mark a task completed now.
    Complete {
        /// Task ID.
        id: TaskId,
    },
    /// Turn a task into a lane.
    Lanize {
        /// Task ID.
        id: TaskId,
    },
    /// Change a task's title.
    Rename {
        /// Task ID.
        id: TaskId,
        /// New title.
        title: String,
    },
    /// Set the activation window. An omitted bound is cleared.
    Term {
        /// Task ID.
        id: TaskId,
        /// Window start (RFC 3339).
        #[arg(long, value_parser = parse_timestamp)]
        starts_at: Option<DateTime<Utc>>,
        /// Window end (RFC 3339).
        #[arg(long, value_parser = parse_timestamp)]
        expires_at: Option<DateTime<Utc>>,
    },
    /// Detach a task and its subtree from its parent.
    MoveRoot {
        /// Task ID.
        id: TaskId,
    },
    /// Move a task and its subtree under another task.
    Move {
        /// Task to move.
        child: TaskId,
        /// New parent.
        #[arg(long)]
        under: TaskId,
    },
    /// Dump the closure rows touching a task.
    Relations {
        /// Task ID.
        id: TaskId,
    },
}

fn parse_timestamp(raw: &str) -> std::result::Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("expected an RFC 3339 timestamp: {e}"))
}

fn load_settings(cli: &Cli) -> Result<ArborSettings> {
    let mut settings = match &cli.settings {
        Some(path) => arbor_settings::load_settings_from_path(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => arbor_settings::load_settings().context("Failed to load settings")?,
    };
    if let Some(db_path) = &cli.db_path {
        settings.database.path = db_path.to_string_lossy().into_owned();
    }
    Ok(settings)
}

fn connection_config(db: &DatabaseSettings) -> ConnectionConfig {
    ConnectionConfig {
        pool_size: db.pool_size,
        busy_timeout_ms: db.busy_timeout_ms,
        cache_size_kib: db.cache_size_kib,
    }
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}

fn open_store(db: &DatabaseSettings) -> Result<TaskStore> {
    let path = Path::new(&db.path);
    ensure_parent_dir(path)?;
    TaskStore::open(path, &connection_config(db))
        .with_context(|| format!("Failed to open task database at {}", path.display()))
}

fn run(store: &TaskStore, command: Command) -> Result<Value> {
    let output = match command {
        Command::Create { title } => serde_json::to_value(store.create_task(&title)?)?,
        Command::Show { id } => serde_json::to_value(store.find_subtree(id)?)?,
        Command::List { ids } => {
            let scope = if ids.is_empty() {
                TreeScope::All
            } else {
                TreeScope::Tasks(ids)
            };
            serde_json::to_value(store.list_forest(&scope)?)?
        }
        Command::Complete { id } => serde_json::to_value(store.complete_task(id)?)?,
        Command::Lanize { id } => serde_json::to_value(store.lanize_task(id)?)?,
        Command::Rename { id, title } => {
            store.update_task_field(id, TaskField::Title(title))?;
            serde_json::to_value(store.get_task(id)?)?
        }
        Command::Term {
            id,
            starts_at,
            expires_at,
        } => serde_json::to_value(store.update_term(id, starts_at, expires_at)?)?,
        Command::MoveRoot { id } => {
            store.move_task_to_root(id)?;
            serde_json::to_value(store.find_subtree(id)?)?
        }
        Command::Move { child, under } => {
            store.move_task_to_parent(under, child)?;
            let lineage: Vec<TaskId> = store
                .self_and_ancestors(child)?
                .iter()
                .rev()
                .map(|t| t.id)
                .collect();
            json!({
                "lineage": lineage,
                "subtree": store.find_subtree(under)?,
            })
        }
        Command::Relations { id } => serde_json::to_value(store.relations(id)?)?,
    };
    Ok(output)
}

fn log_failure(err: &anyhow::Error) {
    match err.downcast_ref::<ArborError>() {
        Some(arbor) => error!(kind = arbor.error_kind(), error = %arbor, "command failed"),
        None => error!(error = %err, "command failed"),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(&cli)?;
    logging::init_subscriber(&settings.logging);
    info!(db = %settings.database.path, "arbor starting");

    let store = open_store(&settings.database)?;
    let output = run(&store, cli.command).inspect_err(log_failure)?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("arbor").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn parses_move() {
        let cli = parse(&["move", "5", "--under", "2"]);
        assert_eq!(
            cli.command,
            Command::Move {
                child: TaskId::new(5),
                under: TaskId::new(2),
            }
        );
    }

    #[test]
    fn parses_list_ids_and_global_flags() {
        let cli = parse(&["list", "--ids", "1,3", "--db-path", "/tmp/t.db"]);
        assert_eq!(
            cli.command,
            Command::List {
                ids: vec![TaskId::new(1), TaskId::new(3)],
            }
        );
        assert_eq!(cli.db_path, Some(PathBuf::from("/tmp/t.db")));
    }

    #[test]
    fn parses_term_bounds() {
        let cli = parse(&["term", "4", "--starts-at", "2025-01-01T09:00:00+09:00"]);
        let Command::Term {
            id,
            starts_at,
            expires_at,
        } = cli.command
        else {
            panic!("expected term");
        };
        assert_eq!(id, TaskId::new(4));
        assert_eq!(starts_at.unwrap().to_rfc3339(), "2025-01-01T00:00:00+00:00");
        assert!(expires_at.is_none());
    }

    #[test]
    fn rejects_bad_input() {
        let arbor = std::iter::once("arbor");
        assert!(Cli::try_parse_from(arbor.clone().chain(["show", "abc"])).is_err());
        assert!(Cli::try_parse_from(arbor.clone().chain(["move", "1"])).is_err());
        assert!(
            Cli::try_parse_from(arbor.chain(["term", "1", "--starts-at", "tomorrow"])).is_err()
        );
    }

    #[test]
    fn db_path_flag_overrides_settings() {
        let dir = tempfile::tempdir().unwrap();
        let settings_file = dir.path().join("settings.json");
        std::fs::write(&settings_file, r#"{"database": {"path": "/nowhere/x.db"}}"#).unwrap();
        let db = dir.path().join("nested").join("tasks.db");

        let cli = parse(&[
            "--settings",
            settings_file.to_str().unwrap(),
            "--db-path",
            db.to_str().unwrap(),
            "list",
        ]);
        let settings = load_settings(&cli).unwrap();
        assert_eq!(settings.database.path, db.to_string_lossy());

        let store = open_store(&settings.database).unwrap();
        assert!(db.exists());
        assert_eq!(run(&store, cli.command).unwrap(), json!([]));
    }

    #[test]
    fn run_commands_end_to_end() {
        let store = TaskStore::in_memory().unwrap();
        let root = run(&store, Command::Create { title: "root".into() }).unwrap();
        assert_eq!(root["id"], 1);
        let _ = run(&store, Command::Create { title: "leaf".into() }).unwrap();

        let moved = run(
            &store,
            Command::Move {
                child: TaskId::new(2),
                under: TaskId::new(1),
            },
        )
        .unwrap();
        assert_eq!(moved["lineage"], json!([1, 2]));
        assert_eq!(moved["subtree"]["children"][0]["id"], 2);
        assert_eq!(moved["subtree"]["children"][0]["depth"], 2);

        let renamed = run(
            &store,
            Command::Rename {
                id: TaskId::new(2),
                title: "leaf v2".into(),
            },
        )
        .unwrap();
        assert_eq!(renamed["title"], "leaf v2");

        let lane = run(&store, Command::Lanize { id: TaskId::new(1) }).unwrap();
        assert_eq!(lane["type"], "lane");

        let rels = run(&store, Command::Relations { id: TaskId::new(2) }).unwrap();
        assert_eq!(rels.as_array().unwrap().len(), 2);

        let detached = run(&store, Command::MoveRoot { id: TaskId::new(2) }).unwrap();
        assert_eq!(detached["depth"], 1);

        let listing = run(&store, Command::List { ids: vec![] }).unwrap();
        assert_eq!(listing.as_array().unwrap().len(), 2);
    }

    #[test]
    fn run_reports_missing_task() {
        let store = TaskStore::in_memory().unwrap();
        let err = run(&store, Command::Show { id: TaskId::new(9) }).unwrap_err();
        let arbor = err.downcast_ref::<ArborError>().unwrap();
        assert!(arbor.is_not_found());
        assert_eq!(arbor.error_kind(), "not_found");
        log_failure(&err);
    }
}
