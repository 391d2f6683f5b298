//! Repository implementations.
//!
//! [`task::TaskRepo`] owns `tasks` rows and knows nothing about the tree.
//! [`relation::RelationRepo`] owns `task_relations` and is its only writer.

pub mod relation;
pub mod task;
