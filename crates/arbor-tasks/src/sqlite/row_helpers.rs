//! Column decoding helpers that turn bad stored values into
//! [`ArborError::CorruptRow`] instead of a bare `SQLite` error.

use chrono::{DateTime, Utc};

use crate::errors::{ArborError, Result};

/// Get a column value, returning `CorruptRow` on type mismatch.
pub fn get<T: rusqlite::types::FromSql>(
    row: &rusqlite::Row<'_>,
    idx: usize,
    table: &'static str,
    column: &'static str,
) -> Result<T> {
    row.get(idx).map_err(|e| ArborError::CorruptRow {
        table,
        column,
        detail: e.to_string(),
    })
}

/// Parse an RFC 3339 timestamp column.
pub fn parse_timestamp(
    raw: &str,
    table: &'static str,
    column: &'static str,
) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ArborError::CorruptRow {
            table,
            column,
            detail: format!("invalid timestamp {raw:?}: {e}"),
        })
}

/// Parse a nullable RFC 3339 timestamp column.
pub fn parse_opt_timestamp(
    raw: Option<&str>,
    table: &'static str,
    column: &'static str,
) -> Result<Option<DateTime<Utc>>> {
    raw.map(|s| parse_timestamp(s, table, column)).transpose()
}

/// Parse a string into an enum, returning `CorruptRow` on failure.
pub fn parse_enum<T: std::str::FromStr>(
    raw: &str,
    table: &'static str,
    column: &'static str,
) -> Result<T> {
    raw.parse().map_err(|_| ArborError::CorruptRow {
        table,
        column,
        detail: format!("unknown variant: {raw}"),
    })
}

/// Format a timestamp the way every column stores it.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}
