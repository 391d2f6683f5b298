//! Transactional `TaskStore` API.
//!
//! Wraps the connection pool and composes the repositories. Every write
//! method runs inside one `IMMEDIATE` transaction, so concurrent writers
//! queue on the database lock and no caller ever observes a half-applied
//! change such as a detached-but-not-yet-reattached subtree.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, TransactionBehavior};
use tracing::{info, instrument};

use crate::errors::{ArborError, Result};
use crate::relocate::SubtreeRelocator;
use crate::sqlite::connection::{self, ConnectionConfig, ConnectionPool, PooledConnection};
use crate::sqlite::migrations::run_migrations;
use crate::sqlite::repositories::relation::RelationRepo;
use crate::sqlite::repositories::task::TaskRepo;
use crate::tree::{self, TaskNode, TreeScope};
use crate::types::{Task, TaskField, TaskId, TaskRelation, TaskType};

/// Pooled, transactional facade over the task database.
///
/// Cheap to clone; clones share the pool.
#[derive(Clone)]
pub struct TaskStore {
    pool: ConnectionPool,
}

impl TaskStore {
    /// Wrap an existing pool, applying pending migrations.
    pub fn new(pool: ConnectionPool) -> Result<Self> {
        let _ = run_migrations(&*pool.get()?)?;
        Ok(Self { pool })
    }

    /// Open (or create) a database file.
    pub fn open(path: impl AsRef<Path>, config: &ConnectionConfig) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), pool_size = config.pool_size, "opening task database");
        Self::new(connection::new_file(path, config)?)
    }

    /// Fresh in-memory database.
    pub fn in_memory() -> Result<Self> {
        Self::new(connection::new_in_memory(&ConnectionConfig::default())?)
    }

    fn conn(&self) -> Result<PooledConnection> {
        Ok(self.pool.get()?)
    }

    fn write<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Reads run in a deferred transaction so multi-query results come from
    /// one snapshot.
    fn read<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Task CRUD
    // ─────────────────────────────────────────────────────────────────────

    /// Create a root task with its self-relation.
    #[instrument(skip(self))]
    pub fn create_task(&self, title: &str) -> Result<Task> {
        self.write(|conn| {
            let task = TaskRepo::insert(conn, title)?;
            RelationRepo::insert_self(conn, task.id)?;
            Ok(task)
        })
    }

    /// Fetch one task.
    pub fn get_task(&self, id: TaskId) -> Result<Task> {
        self.read(|conn| TaskRepo::require(conn, id))
    }

    /// Apply a single-field update.
    #[instrument(skip(self), fields(column = field.column()))]
    pub fn update_task_field(&self, id: TaskId, field: TaskField) -> Result<()> {
        self.write(|conn| apply_field(conn, id, field))
    }

    /// Mark a task completed now.
    pub fn complete_task(&self, id: TaskId) -> Result<Task> {
        self.update_and_get(id, vec![TaskField::CompletedAt(Utc::now())])
    }

    /// Turn a task into a lane.
    pub fn lanize_task(&self, id: TaskId) -> Result<Task> {
        self.update_and_get(id, vec![TaskField::Type(TaskType::Lane)])
    }

    /// Set both bounds of the activation window together.
    #[instrument(skip(self))]
    pub fn update_term(
        &self,
        id: TaskId,
        starts_at: Option<DateTime<Utc>>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Task> {
        self.update_and_get(
            id,
            vec![TaskField::StartsAt(starts_at), TaskField::ExpiresAt(expires_at)],
        )
    }

    fn update_and_get(&self, id: TaskId, fields: Vec<TaskField>) -> Result<Task> {
        self.write(|conn| {
            for field in fields {
                apply_field(conn, id, field)?;
            }
            TaskRepo::require(conn, id)
        })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Relocation
    // ─────────────────────────────────────────────────────────────────────

    /// Detach a task (and its subtree) from its ancestors.
    #[instrument(skip(self))]
    pub fn move_task_to_root(&self, id: TaskId) -> Result<()> {
        self.write(|conn| SubtreeRelocator::move_to_root(conn, id))
    }

    /// Move `child` (and its subtree) under `parent`.
    #[instrument(skip(self))]
    pub fn move_task_to_parent(&self, parent: TaskId, child: TaskId) -> Result<()> {
        self.write(|conn| SubtreeRelocator::move_to_child(conn, parent, child))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Tree reads
    // ─────────────────────────────────────────────────────────────────────

    /// Nested forest for `scope`, in preorder.
    #[instrument(skip(self))]
    pub fn list_forest(&self, scope: &TreeScope) -> Result<Vec<TaskNode>> {
        let rows = self.read(|conn| RelationRepo::tree_rows(conn, scope))?;
        Ok(tree::assemble(rows))
    }

    /// The subtree rooted at `id`, with `id` at depth 1.
    #[instrument(skip(self))]
    pub fn find_subtree(&self, id: TaskId) -> Result<TaskNode> {
        self.list_forest(&TreeScope::Subtree(id))?
            .into_iter()
            .next()
            .ok_or(ArborError::TaskNotFound(id))
    }

    /// Depth of a task in the forest; 1 for roots.
    pub fn level(&self, id: TaskId) -> Result<u32> {
        self.read(|conn| RelationRepo::level(conn, id))
    }

    /// The task and its ancestors, nearest first.
    pub fn self_and_ancestors(&self, id: TaskId) -> Result<Vec<Task>> {
        self.read(|conn| RelationRepo::self_and_ancestors(conn, id))
    }

    /// The task and its descendants, nearest first.
    pub fn self_and_descendants(&self, id: TaskId) -> Result<Vec<Task>> {
        self.read(|conn| RelationRepo::self_and_descendants(conn, id))
    }

    /// Closure rows touching `id`.
    pub fn relations(&self, id: TaskId) -> Result<Vec<TaskRelation>> {
        self.read(|conn| {
            let _ = TaskRepo::require(conn, id)?;
            RelationRepo::relations_of(conn, id)
        })
    }

    /// Every closure row.
    pub fn all_relations(&self) -> Result<Vec<TaskRelation>> {
        self.read(RelationRepo::all)
    }
}

fn apply_field(conn: &Connection, id: TaskId, field: TaskField) -> Result<()> {
    match field {
        TaskField::CompletedAt(at) => TaskRepo::update_completed_at(conn, id, at),
        TaskField::Title(title) => TaskRepo::update_title(conn, id, &title),
        TaskField::Type(task_type) => TaskRepo::update_type(conn, id, task_type),
        TaskField::StartsAt(at) => TaskRepo::update_starts_at(conn, id, at),
        TaskField::ExpiresAt(at) => TaskRepo::update_expires_at(conn, id, at),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
