//! Relation repository: the closure table.
//!
//! `task_relations` stores one row per (ancestor, descendant) pair with the
//! path length between them, where 1 is the task itself, 2 a direct child,
//! and so on. This repository is the only writer of that table. Its methods
//! never open a transaction of their own; multi-statement operations assume
//! the caller holds one.

use std::collections::HashMap;

use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{Connection, params, params_from_iter};
use tracing::debug;

use crate::errors::{ArborError, Result};
use crate::sqlite::repositories::task::{TASK_COLUMNS, TASK_COLUMNS_T, task_from_row};
use crate::sqlite::row_helpers::{format_timestamp, get, parse_timestamp};
use crate::tree::{self, TreeRow, TreeScope};
use crate::types::{Task, TaskId, TaskRelation};

/// Rows per `INSERT` statement in [`RelationRepo::attach_between`]. Each row
/// binds three parameters, which keeps a chunk well below `SQLite`'s
/// host-parameter limit.
const INSERT_CHUNK_ROWS: usize = 1000;

const RELATION_COLUMNS: &str = "ancestor_id, descendant_id, path_length, created_at, updated_at";

/// Closure-table repository. Stateless; every method takes `&Connection`.
pub struct RelationRepo;

impl RelationRepo {
    /// Insert the `(id, id, 1)` self-relation for a freshly created task.
    pub fn insert_self(conn: &Connection, id: TaskId) -> Result<()> {
        let now = format_timestamp(Utc::now());
        let _ = conn.execute(
            &format!("INSERT INTO task_relations ({RELATION_COLUMNS}) VALUES (?1, ?1, 1, ?2, ?2)"),
            params![id, now],
        )?;
        Ok(())
    }

    /// Length of the longest path ending at `id`; 1 for a root, 0 when the
    /// task has no relations at all.
    pub fn level(conn: &Connection, id: TaskId) -> Result<u32> {
        let level: u32 = conn.query_row(
            "SELECT COALESCE(MAX(path_length), 0) FROM task_relations WHERE descendant_id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        Ok(level)
    }

    /// The task and everything below it, nearest first.
    pub fn self_and_descendants(conn: &Connection, id: TaskId) -> Result<Vec<Task>> {
        let tasks = query_tasks(
            conn,
            &format!(
                "SELECT {TASK_COLUMNS_T} FROM task_relations r
                 JOIN tasks t ON t.id = r.descendant_id
                 WHERE r.ancestor_id = ?1
                 ORDER BY r.path_length, t.id"
            ),
            params![id],
        )?;
        non_empty(tasks, id)
    }

    /// The task and every ancestor up to its root, nearest first.
    pub fn self_and_ancestors(conn: &Connection, id: TaskId) -> Result<Vec<Task>> {
        let tasks = query_tasks(
            conn,
            &format!(
                "SELECT {TASK_COLUMNS_T} FROM task_relations r
                 JOIN tasks t ON t.id = r.ancestor_id
                 WHERE r.descendant_id = ?1
                 ORDER BY r.path_length"
            ),
            params![id],
        )?;
        non_empty(tasks, id)
    }

    /// Cut the subtree rooted at `id` loose from everything above it.
    ///
    /// Deletes every row whose descendant lies inside the subtree and whose
    /// ancestor lies outside it. Rows internal to the subtree are kept, so
    /// `id` becomes a root with its descendants intact. Returns the number of
    /// rows deleted.
    pub fn detach_from_ancestors(conn: &Connection, id: TaskId) -> Result<usize> {
        if Self::level(conn, id)? == 0 {
            return Err(ArborError::TaskNotFound(id));
        }
        // SQLite materializes both subqueries before deleting.
        let deleted = conn.execute(
            "DELETE FROM task_relations
             WHERE descendant_id IN (SELECT descendant_id FROM task_relations WHERE ancestor_id = ?1)
               AND ancestor_id NOT IN (SELECT descendant_id FROM task_relations WHERE ancestor_id = ?1)",
            params![id],
        )?;
        debug!(task_id = %id, deleted, "detached from ancestors");
        Ok(deleted)
    }

    /// Graft the subtree rooted at `child` under `parent`.
    ///
    /// `child` must be a root. For every ancestor `A` of `parent` (itself
    /// included) and every descendant `D` of `child` (itself included), one
    /// row `(A, D, level(parent) - level(A) + 1 + level(D))` is inserted.
    /// The inserts run under a savepoint: either all rows land or none do.
    /// Returns the number of rows inserted.
    pub fn attach_between(conn: &Connection, parent: TaskId, child: TaskId) -> Result<usize> {
        let ancestors = levels_of(conn, LEVELS_OF_ANCESTORS, parent)?;
        let descendants = levels_of(conn, LEVELS_OF_DESCENDANTS, child)?;
        if ancestors.iter().any(|&(a, _)| a == child) {
            return Err(ArborError::Validation(format!(
                "cannot attach task {child} beneath its own descendant {parent}"
            )));
        }
        if Self::level(conn, child)? != 1 {
            return Err(ArborError::Validation(format!(
                "task {child} still has ancestors; detach it first"
            )));
        }

        let parent_level = ancestors
            .iter()
            .find(|&&(a, _)| a == parent)
            .map_or(1, |&(_, level)| level);

        let mut rows = Vec::with_capacity(ancestors.len() * descendants.len());
        for &(a, a_level) in &ancestors {
            let base = parent_level.saturating_sub(a_level) + 1;
            for &(d, d_level) in &descendants {
                rows.push((a, d, base + d_level));
            }
        }

        with_savepoint(conn, "attach_between", || insert_relations(conn, &rows))?;
        debug!(parent = %parent, child = %child, inserted = rows.len(), "attached subtree");
        Ok(rows.len())
    }

    /// Every row in which `id` is the ancestor or the descendant.
    pub fn relations_of(conn: &Connection, id: TaskId) -> Result<Vec<TaskRelation>> {
        query_relations(
            conn,
            &format!(
                "SELECT {RELATION_COLUMNS} FROM task_relations
                 WHERE ancestor_id = ?1 OR descendant_id = ?1
                 ORDER BY ancestor_id, descendant_id"
            ),
            params![id],
        )
    }

    /// Every row in the table.
    pub fn all(conn: &Connection) -> Result<Vec<TaskRelation>> {
        query_relations(
            conn,
            &format!(
                "SELECT {RELATION_COLUMNS} FROM task_relations ORDER BY ancestor_id, descendant_id"
            ),
            [],
        )
    }

    /// Depth-annotated rows for `scope`, sorted into preorder.
    ///
    /// Lineage and depth are measured from the scope root for
    /// [`TreeScope::Subtree`] and from the forest roots otherwise.
    pub fn tree_rows(conn: &Connection, scope: &TreeScope) -> Result<Vec<TreeRow>> {
        let (tasks, lineages) = match scope {
            TreeScope::All => (
                query_tasks(
                    conn,
                    &format!("SELECT {TASK_COLUMNS} FROM tasks ORDER BY id"),
                    [],
                )?,
                query_lineages(
                    conn,
                    "SELECT descendant_id, ancestor_id FROM task_relations
                     ORDER BY descendant_id, path_length DESC",
                    [],
                )?,
            ),
            TreeScope::Subtree(root) => (
                query_tasks(
                    conn,
                    &format!(
                        "SELECT {TASK_COLUMNS_T} FROM task_relations r
                         JOIN tasks t ON t.id = r.descendant_id
                         WHERE r.ancestor_id = ?1
                         ORDER BY t.id"
                    ),
                    params![root],
                )?,
                query_lineages(
                    conn,
                    "SELECT l.descendant_id, l.ancestor_id FROM task_relations l
                     WHERE l.descendant_id IN (SELECT descendant_id FROM task_relations WHERE ancestor_id = ?1)
                       AND l.ancestor_id IN (SELECT descendant_id FROM task_relations WHERE ancestor_id = ?1)
                     ORDER BY l.descendant_id, l.path_length DESC",
                    params![root],
                )?,
            ),
            TreeScope::Tasks(ids) => {
                if ids.is_empty() {
                    return Ok(Vec::new());
                }
                // one JSON array parameter, however many ids the filter holds
                let id_list = id_array(ids);
                (
                    query_tasks(
                        conn,
                        &format!(
                            "SELECT {TASK_COLUMNS} FROM tasks
                             WHERE id IN (SELECT value FROM json_each(?1))
                             ORDER BY id"
                        ),
                        params![id_list],
                    )?,
                    query_lineages(
                        conn,
                        "SELECT descendant_id, ancestor_id FROM task_relations
                         WHERE descendant_id IN (SELECT value FROM json_each(?1))
                         ORDER BY descendant_id, path_length DESC",
                        params![id_list],
                    )?,
                )
            }
        };

        let mut rows: Vec<TreeRow> = tasks
            .into_iter()
            .map(|task| {
                let lineage = lineages
                    .get(&task.id)
                    .cloned()
                    .unwrap_or_else(|| vec![task.id]);
                TreeRow::new(task, lineage)
            })
            .collect();
        tree::sort_preorder(&mut rows);
        Ok(rows)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Internal
// ─────────────────────────────────────────────────────────────────────────────

/// `(ancestor, level(ancestor))` for every ancestor of `?1`, itself included.
const LEVELS_OF_ANCESTORS: &str = "SELECT l.descendant_id, MAX(l.path_length)
     FROM task_relations s
     JOIN task_relations l ON l.descendant_id = s.ancestor_id
     WHERE s.descendant_id = ?1
     GROUP BY l.descendant_id";

/// `(descendant, level(descendant))` for every descendant of `?1`, itself
/// included.
const LEVELS_OF_DESCENDANTS: &str = "SELECT l.descendant_id, MAX(l.path_length)
     FROM task_relations s
     JOIN task_relations l ON l.descendant_id = s.descendant_id
     WHERE s.ancestor_id = ?1
     GROUP BY l.descendant_id";

fn levels_of(conn: &Connection, sql: &str, id: TaskId) -> Result<Vec<(TaskId, u32)>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let levels = stmt
        .query_map(params![id], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<rusqlite::Result<Vec<(TaskId, u32)>>>()?;
    if levels.is_empty() {
        return Err(ArborError::TaskNotFound(id));
    }
    Ok(levels)
}

fn insert_relations(conn: &Connection, rows: &[(TaskId, TaskId, u32)]) -> Result<()> {
    let now = format_timestamp(Utc::now());
    for chunk in rows.chunks(INSERT_CHUNK_ROWS) {
        let values = (0..chunk.len())
            .map(|i| {
                let n = 2 + i * 3;
                format!("(?{}, ?{}, ?{}, ?1, ?1)", n, n + 1, n + 2)
            })
            .collect::<Vec<_>>()
            .join(", ");
        let mut bound = Vec::with_capacity(1 + chunk.len() * 3);
        bound.push(Value::Text(now.clone()));
        for &(a, d, len) in chunk {
            bound.push(Value::Integer(a.get()));
            bound.push(Value::Integer(d.get()));
            bound.push(Value::Integer(i64::from(len)));
        }
        let _ = conn.execute(
            &format!("INSERT INTO task_relations ({RELATION_COLUMNS}) VALUES {values}"),
            params_from_iter(bound),
        )?;
    }
    Ok(())
}

/// Run `f` inside a named savepoint, rolling back to it on error.
fn with_savepoint<T>(conn: &Connection, name: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    conn.execute_batch(&format!("SAVEPOINT {name}"))?;
    match f() {
        Ok(value) => {
            conn.execute_batch(&format!("RELEASE {name}"))?;
            Ok(value)
        }
        Err(err) => {
            // the original error matters more than a failed rollback
            let _ = conn.execute_batch(&format!("ROLLBACK TO {name}; RELEASE {name}"));
            Err(err)
        }
    }
}

/// `ids` as a JSON array string for `json_each`.
fn id_array(ids: &[TaskId]) -> String {
    serde_json::Value::from(ids.iter().map(|id| id.get()).collect::<Vec<i64>>()).to_string()
}

fn non_empty(tasks: Vec<Task>, id: TaskId) -> Result<Vec<Task>> {
    if tasks.is_empty() {
        return Err(ArborError::TaskNotFound(id));
    }
    Ok(tasks)
}

fn query_tasks(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Task>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    let mut tasks = Vec::new();
    while let Some(row) = rows.next()? {
        tasks.push(task_from_row(row)?);
    }
    Ok(tasks)
}

fn query_relations(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<TaskRelation>> {
    const T: &str = "task_relations";
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    let mut relations = Vec::new();
    while let Some(row) = rows.next()? {
        let created_at: String = get(row, 3, T, "created_at")?;
        let updated_at: String = get(row, 4, T, "updated_at")?;
        relations.push(TaskRelation {
            ancestor_id: get(row, 0, T, "ancestor_id")?,
            descendant_id: get(row, 1, T, "descendant_id")?,
            path_length: get(row, 2, T, "path_length")?,
            created_at: parse_timestamp(&created_at, T, "created_at")?,
            updated_at: parse_timestamp(&updated_at, T, "updated_at")?,
        });
    }
    Ok(relations)
}

/// Group `(descendant, ancestor)` pairs, already ordered root-first within
/// each descendant, into lineage chains.
fn query_lineages(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<HashMap<TaskId, Vec<TaskId>>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    let mut lineages: HashMap<TaskId, Vec<TaskId>> = HashMap::new();
    while let Some(row) = rows.next()? {
        let descendant: TaskId = get(row, 0, "task_relations", "descendant_id")?;
        let ancestor: TaskId = get(row, 1, "task_relations", "ancestor_id")?;
        lineages.entry(descendant).or_default().push(ancestor);
    }
    Ok(lineages)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
