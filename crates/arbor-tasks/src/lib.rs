//! # arbor-tasks
//!
//! Hierarchical task storage on a `SQLite` closure table.
//!
//! Tasks form an arbitrary forest. Instead of parent pointers, every
//! ancestor/descendant pair is stored explicitly in `task_relations` together
//! with its path length, which keeps ancestor and descendant lookups to a
//! single indexed query.
//!
//! - **[`sqlite`]**: connection pool, migrations, and the stateless
//!   [`TaskRepo`] / [`RelationRepo`] repositories
//! - **[`relocate`]**: subtree moves composed from closure-table primitives
//! - **[`tree`]**: preorder ordering and nested tree reconstruction
//! - **[`store`]**: the transactional [`TaskStore`] facade used by callers

#![deny(unsafe_code)]

pub mod errors;
pub mod relocate;
pub mod sqlite;
pub mod store;
pub mod tree;
pub mod types;

pub use errors::{ArborError, Result};
pub use relocate::SubtreeRelocator;
pub use sqlite::repositories::relation::RelationRepo;
pub use sqlite::repositories::task::TaskRepo;
pub use sqlite::{ConnectionConfig, ConnectionPool};
pub use store::TaskStore;
pub use tree::{TaskNode, TreeRow, TreeScope};
pub use types::{Task, TaskField, TaskId, TaskRelation, TaskType};
