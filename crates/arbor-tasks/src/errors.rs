//! Error types for the task store.
//!
//! [`ArborError`] separates three classes callers must be able to tell apart:
//! bad input ([`ArborError::Validation`]), a missing task
//! ([`ArborError::TaskNotFound`]), and everything the backing store can throw.

use thiserror::Error;

use crate::types::TaskId;

/// Errors that can occur during task store operations.
#[derive(Debug, Error)]
pub enum ArborError {
    /// Caller supplied invalid input (e.g. an empty title). Never retried.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Referenced task does not exist, or a query scoped to it was empty.
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    /// `SQLite` database error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool error.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// Schema migration failed.
    #[error("migration error: {message}")]
    Migration {
        /// Describes which migration failed and why.
        message: String,
    },

    /// A stored column could not be decoded.
    #[error("corrupt row in {table}.{column}: {detail}")]
    CorruptRow {
        /// Table the row came from.
        table: &'static str,
        /// Offending column.
        column: &'static str,
        /// Decoder message.
        detail: String,
    },
}

impl ArborError {
    /// Whether this is a client-side input error.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Whether the referenced task does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::TaskNotFound(_))
    }

    /// Whether the failure came from the backing store.
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            Self::Sqlite(_) | Self::Pool(_) | Self::Migration { .. } | Self::CorruptRow { .. }
        )
    }

    /// A failed migration step, described by `step`.
    pub(crate) fn migration(step: impl std::fmt::Display, source: rusqlite::Error) -> Self {
        Self::Migration {
            message: format!("{step}: {source}"),
        }
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::TaskNotFound(_) => "not_found",
            Self::Sqlite(_) | Self::Pool(_) | Self::Migration { .. } | Self::CorruptRow { .. } => {
                "storage"
            }
        }
    }
}

/// Convenience type alias for task store results.
pub type Result<T> = std::result::Result<T, ArborError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_display() {
        let err = ArborError::Validation("title must not be empty".into());
        assert_eq!(err.to_string(), "validation failed: title must not be empty");
        assert!(err.is_validation());
        assert!(!err.is_storage());
    }

    #[test]
    fn not_found_display() {
        let err = ArborError::TaskNotFound(TaskId::new(999));
        assert_eq!(err.to_string(), "task not found: 999");
        assert!(err.is_not_found());
        assert_eq!(err.error_kind(), "not_found");
    }

    #[test]
    fn sqlite_error_is_storage() {
        let err: ArborError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, ArborError::Sqlite(_)));
        assert!(err.is_storage());
        assert!(!err.is_not_found());
        assert!(err.to_string().contains("sqlite error"));
    }

    #[test]
    fn migration_error_display() {
        let err = ArborError::migration("v1 (schema)", rusqlite::Error::InvalidQuery);
        assert_eq!(
            err.to_string(),
            format!("migration error: v1 (schema): {}", rusqlite::Error::InvalidQuery)
        );
        assert_eq!(err.error_kind(), "storage");
    }

    #[test]
    fn corrupt_row_display() {
        let err = ArborError::CorruptRow {
            table: "tasks",
            column: "type",
            detail: "unknown variant: folder".into(),
        };
        assert_eq!(
            err.to_string(),
            "corrupt row in tasks.type: unknown variant: folder"
        );
        assert!(err.is_storage());
    }
}
