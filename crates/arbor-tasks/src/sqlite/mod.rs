//! `SQLite` backend for the task store.
//!
//! - **[`connection`]**: `r2d2` pool with WAL mode, foreign keys and the busy
//!   timeout applied to every connection.
//! - **[`migrations`]**: embedded, version-tracked schema.
//! - **[`repositories`]**: stateless repositories; every method takes a
//!   `&Connection`, so they compose inside whatever transaction the caller
//!   holds.

pub mod connection;
pub mod migrations;
pub mod repositories;
pub mod row_helpers;

pub use connection::{
    ConnectionConfig, ConnectionPool, PooledConnection, PragmaState, new_file, new_in_memory,
    verify_pragmas,
};
pub use migrations::{current_version, latest_version, run_migrations};
