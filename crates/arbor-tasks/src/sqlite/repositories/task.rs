//! Task repository: `tasks` row CRUD.
//!
//! Tasks are created and updated one field at a time; they are never
//! deleted. Nothing here touches `task_relations`.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use tracing::debug;

use crate::errors::{ArborError, Result};
use crate::sqlite::row_helpers::{
    format_timestamp, get, parse_enum, parse_opt_timestamp, parse_timestamp,
};
use crate::types::{Task, TaskId, TaskType};

/// Column list decoded by [`task_from_row`], in order.
pub(crate) const TASK_COLUMNS: &str =
    "id, title, type, completed_at, starts_at, expires_at, created_at, updated_at";

/// [`TASK_COLUMNS`] qualified with the `t` alias, for joins.
pub(crate) const TASK_COLUMNS_T: &str = "t.id, t.title, t.type, t.completed_at, t.starts_at, \
     t.expires_at, t.created_at, t.updated_at";

/// Task repository. Stateless; every method takes `&Connection`.
pub struct TaskRepo;

impl TaskRepo {
    /// Insert a new task. Does not create its self-relation.
    pub fn insert(conn: &Connection, title: &str) -> Result<Task> {
        validate_title(title)?;
        let now = Utc::now();
        let now_str = format_timestamp(now);
        let _ = conn.execute(
            "INSERT INTO tasks (title, type, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
            params![title, TaskType::Task.as_sql(), now_str],
        )?;
        let id = TaskId::new(conn.last_insert_rowid());
        debug!(task_id = %id, "task inserted");
        Ok(Task {
            id,
            title: title.to_owned(),
            task_type: TaskType::Task,
            completed_at: None,
            starts_at: None,
            expires_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Fetch a task by ID.
    pub fn get(conn: &Connection, id: TaskId) -> Result<Option<Task>> {
        let mut stmt =
            conn.prepare_cached(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"))?;
        let mut rows = stmt.query(params![id])?;
        rows.next()?.map(task_from_row).transpose()
    }

    /// Fetch a task by ID, or fail with [`ArborError::TaskNotFound`].
    pub fn require(conn: &Connection, id: TaskId) -> Result<Task> {
        Self::get(conn, id)?.ok_or(ArborError::TaskNotFound(id))
    }

    /// Whether a task with this ID exists.
    pub fn exists(conn: &Connection, id: TaskId) -> Result<bool> {
        let found: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM tasks WHERE id = ?1)",
            params![id],
            |row| row.get(0),
        )?;
        Ok(found)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Single-field updates
    // ─────────────────────────────────────────────────────────────────────

    /// Set `completed_at`.
    pub fn update_completed_at(conn: &Connection, id: TaskId, at: DateTime<Utc>) -> Result<()> {
        Self::update_column(conn, id, "completed_at", Some(format_timestamp(at)))
    }

    /// Replace the title. Empty titles are rejected once the task is known
    /// to exist.
    pub fn update_title(conn: &Connection, id: TaskId, title: &str) -> Result<()> {
        Self::ensure_exists(conn, id)?;
        validate_title(title)?;
        Self::write_column(conn, id, "title", Some(title.to_owned()))
    }

    /// Change the task type.
    pub fn update_type(conn: &Connection, id: TaskId, task_type: TaskType) -> Result<()> {
        Self::update_column(conn, id, "type", Some(task_type.as_sql().to_owned()))
    }

    /// Set or clear `starts_at`.
    pub fn update_starts_at(
        conn: &Connection,
        id: TaskId,
        at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        Self::update_column(conn, id, "starts_at", at.map(format_timestamp))
    }

    /// Set or clear `expires_at`.
    pub fn update_expires_at(
        conn: &Connection,
        id: TaskId,
        at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        Self::update_column(conn, id, "expires_at", at.map(format_timestamp))
    }

    fn ensure_exists(conn: &Connection, id: TaskId) -> Result<()> {
        if Self::exists(conn, id)? {
            Ok(())
        } else {
            Err(ArborError::TaskNotFound(id))
        }
    }

    fn update_column(
        conn: &Connection,
        id: TaskId,
        column: &'static str,
        value: Option<String>,
    ) -> Result<()> {
        Self::ensure_exists(conn, id)?;
        Self::write_column(conn, id, column, value)
    }

    /// `column` is always one of the fixed names above, never caller input.
    fn write_column(
        conn: &Connection,
        id: TaskId,
        column: &'static str,
        value: Option<String>,
    ) -> Result<()> {
        let _ = conn.execute(
            &format!("UPDATE tasks SET {column} = ?1, updated_at = ?2 WHERE id = ?3"),
            params![value, format_timestamp(Utc::now()), id],
        )?;
        debug!(task_id = %id, column, "task updated");
        Ok(())
    }
}

fn validate_title(title: &str) -> Result<()> {
    if title.is_empty() {
        return Err(ArborError::Validation("title must not be empty".into()));
    }
    Ok(())
}

/// Decode a row selected with [`TASK_COLUMNS`], starting at column 0.
pub(crate) fn task_from_row(row: &rusqlite::Row<'_>) -> Result<Task> {
    const T: &str = "tasks";
    let raw_type: String = get(row, 2, T, "type")?;
    let completed_at: Option<String> = get(row, 3, T, "completed_at")?;
    let starts_at: Option<String> = get(row, 4, T, "starts_at")?;
    let expires_at: Option<String> = get(row, 5, T, "expires_at")?;
    let created_at: String = get(row, 6, T, "created_at")?;
    let updated_at: String = get(row, 7, T, "updated_at")?;

    Ok(Task {
        id: get(row, 0, T, "id")?,
        title: get(row, 1, T, "title")?,
        task_type: parse_enum(&raw_type, T, "type")?,
        completed_at: parse_opt_timestamp(completed_at.as_deref(), T, "completed_at")?,
        starts_at: parse_opt_timestamp(starts_at.as_deref(), T, "starts_at")?,
        expires_at: parse_opt_timestamp(expires_at.as_deref(), T, "expires_at")?,
        created_at: parse_timestamp(&created_at, T, "created_at")?,
        updated_at: parse_timestamp(&updated_at, T, "updated_at")?,
    })
}
