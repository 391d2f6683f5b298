//! Tree assembly: preorder ordering of flat rows and nested reconstruction.
//!
//! The closure table yields one [`TreeRow`] per task, annotated with its
//! lineage (ancestor ids from the scope root down to the task). Sorting rows
//! by lineage puts them in preorder; [`assemble`] then rebuilds the nesting in
//! one pass by comparing depths.

use std::iter::Peekable;

use serde::{Deserialize, Serialize};

use crate::types::{Task, TaskId};

/// Which tasks a tree listing covers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TreeScope {
    /// The whole forest.
    All,
    /// The subtree rooted at this task; depth is measured from it.
    Subtree(TaskId),
    /// Only the listed tasks. Depth stays global, so a task whose ancestors
    /// are not listed hangs off the nearest listed row above it.
    Tasks(Vec<TaskId>),
}

/// A task with its position in the tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeRow {
    /// The task.
    pub task: Task,
    /// `lineage.len()`; 1 for a root of the scope.
    pub depth: u32,
    /// Ancestor ids from the scope root down to the task itself.
    pub lineage: Vec<TaskId>,
}

impl TreeRow {
    /// Build a row, deriving depth from the lineage.
    pub fn new(task: Task, lineage: Vec<TaskId>) -> Self {
        let depth = u32::try_from(lineage.len()).unwrap_or(u32::MAX);
        Self {
            task,
            depth,
            lineage,
        }
    }
}

/// A task and its subtree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskNode {
    /// The task.
    #[serde(flatten)]
    pub task: Task,
    /// Depth within the listing; 1 for top-level nodes.
    pub depth: u32,
    /// Child nodes in preorder.
    pub children: Vec<TaskNode>,
}

impl TaskNode {
    /// Number of nodes in this subtree, including itself.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(TaskNode::size).sum::<usize>()
    }
}

/// Sort rows into preorder.
///
/// Lineages compare element-wise as integers, so a parent precedes its
/// children and siblings are ordered by id (2 before 10).
pub fn sort_preorder(rows: &mut [TreeRow]) {
    rows.sort_by(|a, b| a.lineage.cmp(&b.lineage));
}

/// Rebuild the nested forest from rows already in preorder.
pub fn assemble(rows: Vec<TreeRow>) -> Vec<TaskNode> {
    children_of(&mut rows.into_iter().peekable(), 0)
}

fn children_of<I>(cursor: &mut Peekable<I>, parent_depth: u32) -> Vec<TaskNode>
where
    I: Iterator<Item = TreeRow>,
{
    let mut children = Vec::new();
    while let Some(row) = cursor.next_if(|row| row.depth > parent_depth) {
        let depth = row.depth;
        children.push(TaskNode {
            task: row.task,
            depth,
            children: children_of(cursor, depth),
        });
    }
    children
}

/// Preorder `(id, depth)` pairs of a forest; the inverse of [`assemble`] on
/// ids and depths.
pub fn flatten(forest: &[TaskNode]) -> Vec<(TaskId, u32)> {
    fn walk(nodes: &[TaskNode], out: &mut Vec<(TaskId, u32)>) {
        for node in nodes {
            out.push((node.task.id, node.depth));
            walk(&node.children, out);
        }
    }
    let mut out = Vec::new();
    walk(forest, &mut out);
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
