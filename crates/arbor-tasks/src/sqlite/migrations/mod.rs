//! Schema migration runner for the task database.
//!
//! Migrations are embedded at compile time via [`include_str!`] and executed
//! in version order, each inside its own transaction. The `schema_version`
//! table records what has been applied, so running the migrator twice is a
//! no-op.

use rusqlite::Connection;
use tracing::{debug, info};

use crate::errors::{ArborError, Result};

struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "Tasks and task_relations closure table",
    sql: include_str!("v001_schema.sql"),
}];

const VERSION_TABLE: &str = "CREATE TABLE IF NOT EXISTS schema_version (
   version     INTEGER PRIMARY KEY,
   applied_at  TEXT    NOT NULL,
   description TEXT
 );";

/// Run all pending migrations. Returns how many were applied.
pub fn run_migrations(conn: &Connection) -> Result<u32> {
    conn.execute_batch(VERSION_TABLE)
        .map_err(|e| ArborError::migration("creating schema_version", e))?;
    let current = current_version(conn)?;

    let mut applied = 0;
    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        info!(
            version = migration.version,
            description = migration.description,
            "applying migration"
        );
        apply(conn, migration).map_err(|e| {
            ArborError::migration(
                format_args!("v{} ({})", migration.version, migration.description),
                e,
            )
        })?;
        applied += 1;
    }

    if applied == 0 {
        debug!(version = current, "schema up to date");
    } else {
        info!(applied, version = latest_version(), "schema migrated");
    }
    Ok(applied)
}

/// Highest applied migration version, or 0 if none.
pub fn current_version(conn: &Connection) -> Result<u32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
    .map_err(|e| ArborError::migration("reading schema_version", e))
}

/// Latest migration version defined in code.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |m| m.version)
}

/// One migration and its version record, committed together.
fn apply(conn: &Connection, migration: &Migration) -> rusqlite::Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(migration.sql)?;
    let _ = tx.execute(
        "INSERT INTO schema_version (version, applied_at, description)
         VALUES (?1, datetime('now'), ?2)",
        rusqlite::params![migration.version, migration.description],
    )?;
    tx.commit()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;

    fn open_memory() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        conn
    }

    fn names(conn: &Connection, kind: &str) -> Vec<String> {
        conn.prepare("SELECT name FROM sqlite_master WHERE type = ?1 ORDER BY name")
            .unwrap()
            .query_map([kind], |row| row.get(0))
            .unwrap()
            .filter_map(std::result::Result::ok)
            .collect()
    }

    const NOW: &str = "2025-01-01T00:00:00+00:00";

    #[test]
    fn creates_tables_and_indexes() {
        let conn = open_memory();
        assert_eq!(run_migrations(&conn).unwrap(), 1);

        let tables = names(&conn, "table");
        for table in ["schema_version", "task_relations", "tasks"] {
            assert!(tables.iter().any(|t| t == table), "missing table: {table}");
        }
        let indexes = names(&conn, "index");
        for idx in [
            "idx_task_relations_pair",
            "idx_task_relations_descendant",
            "idx_task_relations_ancestor",
        ] {
            assert!(indexes.iter().any(|i| i == idx), "missing index: {idx}");
        }
    }

    #[test]
    fn is_idempotent() {
        let conn = open_memory();
        assert_eq!(run_migrations(&conn).unwrap(), 1);
        assert_eq!(run_migrations(&conn).unwrap(), 0);
        assert_eq!(current_version(&conn).unwrap(), latest_version());
    }

    #[test]
    fn current_version_starts_at_zero() {
        let conn = open_memory();
        conn.execute_batch(VERSION_TABLE).unwrap();
        assert_eq!(current_version(&conn).unwrap(), 0);
    }

    #[test]
    fn missing_version_table_is_migration_error() {
        let conn = open_memory();
        let err = current_version(&conn).unwrap_err();
        assert!(matches!(err, ArborError::Migration { .. }));
        assert!(err.to_string().contains("reading schema_version"), "{err}");
    }

    #[test]
    fn failed_migration_leaves_no_version_row() {
        let conn = open_memory();
        conn.execute_batch(VERSION_TABLE).unwrap();
        let broken = Migration {
            version: 9,
            description: "broken",
            sql: "CREATE TABLE ok (x INTEGER); CREATE TABLE oops (",
        };
        assert!(apply(&conn, &broken).is_err());
        assert_eq!(current_version(&conn).unwrap(), 0);
        assert!(names(&conn, "table").iter().all(|n| n != "ok"));
    }

    #[test]
    fn duplicate_relation_pair_rejected() {
        let conn = open_memory();
        run_migrations(&conn).unwrap();
        conn.execute(
            "INSERT INTO tasks (title, created_at, updated_at) VALUES ('a', ?1, ?1)",
            [NOW],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO task_relations VALUES (1, 1, 1, ?1, ?1)",
            [NOW],
        )
        .unwrap();
        let dup = conn.execute(
            "INSERT INTO task_relations VALUES (1, 1, 1, ?1, ?1)",
            [NOW],
        );
        assert!(dup.is_err());
    }

    #[test]
    fn relation_to_missing_task_rejected() {
        let conn = open_memory();
        run_migrations(&conn).unwrap();
        let orphan = conn.execute(
            "INSERT INTO task_relations VALUES (41, 42, 2, ?1, ?1)",
            [NOW],
        );
        assert!(orphan.is_err());
    }

    #[test]
    fn self_relation_must_have_length_one() {
        let conn = open_memory();
        run_migrations(&conn).unwrap();
        conn.execute(
            "INSERT INTO tasks (title, created_at, updated_at) VALUES ('a', ?1, ?1)",
            [NOW],
        )
        .unwrap();
        let bad = conn.execute(
            "INSERT INTO task_relations VALUES (1, 1, 2, ?1, ?1)",
            [NOW],
        );
        assert!(bad.is_err());
    }

    #[test]
    fn empty_title_rejected_by_schema() {
        let conn = open_memory();
        run_migrations(&conn).unwrap();
        let bad = conn.execute(
            "INSERT INTO tasks (title, created_at, updated_at) VALUES ('', ?1, ?1)",
            [NOW],
        );
        assert!(bad.is_err());
    }
}
