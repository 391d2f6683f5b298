//! Subtree relocation built from closure-table primitives.
//!
//! The relocator never opens a transaction. [`crate::TaskStore`] runs each
//! move inside one, so the detached intermediate state is never visible to
//! other connections.

use rusqlite::Connection;
use tracing::debug;

use crate::errors::{ArborError, Result};
use crate::sqlite::repositories::relation::RelationRepo;
use crate::sqlite::repositories::task::TaskRepo;
use crate::types::TaskId;

/// Moves whole subtrees around the forest.
pub struct SubtreeRelocator;

impl SubtreeRelocator {
    /// Make `id` a root, keeping its subtree.
    pub fn move_to_root(conn: &Connection, id: TaskId) -> Result<()> {
        let detached = RelationRepo::detach_from_ancestors(conn, id)?;
        debug!(task_id = %id, detached, "moved to root");
        Ok(())
    }

    /// Re-parent `child` (with its subtree) under `parent`.
    ///
    /// Fails with [`ArborError::Validation`] before touching any row when
    /// `parent` is `child` or lies inside `child`'s subtree.
    pub fn move_to_child(conn: &Connection, parent: TaskId, child: TaskId) -> Result<()> {
        let _ = TaskRepo::require(conn, parent)?;
        let subtree = RelationRepo::self_and_descendants(conn, child)?;
        if subtree.iter().any(|task| task.id == parent) {
            return Err(ArborError::Validation(format!(
                "cannot move task {child} under {parent}: {parent} is inside its subtree"
            )));
        }

        let _ = RelationRepo::detach_from_ancestors(conn, child)?;
        let attached = RelationRepo::attach_between(conn, parent, child)?;
        debug!(parent = %parent, child = %child, attached, "moved under parent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::sqlite::repositories::test_support::{setup, task};

    fn ancestor_ids(conn: &Connection, id: TaskId) -> Vec<TaskId> {
        RelationRepo::self_and_ancestors(conn, id)
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect()
    }

    #[test]
    fn move_to_child_then_root() {
        let conn = setup();
        let a = task(&conn, "a");
        let b = task(&conn, "b");
        let c = task(&conn, "c");
        SubtreeRelocator::move_to_child(&conn, a, b).unwrap();
        SubtreeRelocator::move_to_child(&conn, b, c).unwrap();
        assert_eq!(ancestor_ids(&conn, c), vec![c, b, a]);

        SubtreeRelocator::move_to_root(&conn, b).unwrap();
        assert_eq!(ancestor_ids(&conn, c), vec![c, b]);
        assert_eq!(ancestor_ids(&conn, b), vec![b]);
        assert_eq!(RelationRepo::level(&conn, a).unwrap(), 1);
    }

    #[test]
    fn reparent_moves_whole_subtree() {
        let conn = setup();
        let a = task(&conn, "a");
        let b = task(&conn, "b");
        let c = task(&conn, "c");
        let d = task(&conn, "d");
        SubtreeRelocator::move_to_child(&conn, a, b).unwrap();
        SubtreeRelocator::move_to_child(&conn, b, c).unwrap();
        SubtreeRelocator::move_to_child(&conn, d, b).unwrap();
        assert_eq!(ancestor_ids(&conn, c), vec![c, b, d]);
        assert_eq!(RelationRepo::self_and_descendants(&conn, a).unwrap().len(), 1);
    }

    #[test]
    fn moving_under_self_or_descendant_is_rejected() {
        let conn = setup();
        let a = task(&conn, "a");
        let b = task(&conn, "b");
        SubtreeRelocator::move_to_child(&conn, a, b).unwrap();
        let before = RelationRepo::all(&conn).unwrap();

        assert_matches!(
            SubtreeRelocator::move_to_child(&conn, a, a),
            Err(ArborError::Validation(_))
        );
        assert_matches!(
            SubtreeRelocator::move_to_child(&conn, b, a),
            Err(ArborError::Validation(_))
        );
        assert_eq!(RelationRepo::all(&conn).unwrap(), before);
    }

    #[test]
    fn missing_parent_or_child_is_not_found() {
        let conn = setup();
        let a = task(&conn, "a");
        let missing = TaskId::new(404);
        let before = RelationRepo::all(&conn).unwrap();
        assert_matches!(
            SubtreeRelocator::move_to_child(&conn, missing, a),
            Err(ArborError::TaskNotFound(id)) if id == missing
        );
        assert_matches!(
            SubtreeRelocator::move_to_child(&conn, a, missing),
            Err(ArborError::TaskNotFound(id)) if id == missing
        );
        assert_matches!(
            SubtreeRelocator::move_to_root(&conn, missing),
            Err(ArborError::TaskNotFound(_))
        );
        assert_eq!(RelationRepo::all(&conn).unwrap(), before);
    }
}
