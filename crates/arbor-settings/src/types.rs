//! Settings type definitions.
//!
//! Field names are camelCase on the wire. Every struct is
//! `#[serde(default)]`, so a settings file only needs the keys it changes.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root settings for the arbor binary.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArborSettings {
    /// Task database.
    pub database: DatabaseSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

/// Where the task database lives and how connections are pooled.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatabaseSettings {
    /// Path of the `SQLite` file.
    pub path: String,
    /// Maximum pooled connections.
    pub pool_size: u32,
    /// How long a writer waits for the database lock.
    pub busy_timeout_ms: u32,
    /// Page cache per connection.
    pub cache_size_kib: i64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: arbor_home().join("tasks.db").to_string_lossy().into_owned(),
            pool_size: 8,
            busy_timeout_ms: 5_000,
            cache_size_kib: 4096,
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive, e.g. `info` or `arbor_tasks=debug`.
    /// `RUST_LOG` takes precedence when set.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json: false,
        }
    }
}

/// `~/.arbor`, falling back to `/tmp/.arbor` without a `HOME`.
pub fn arbor_home() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".arbor")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let settings = ArborSettings::default();
        assert!(settings.database.path.ends_with("tasks.db"));
        assert_eq!(settings.database.pool_size, 8);
        assert_eq!(settings.database.busy_timeout_ms, 5_000);
        assert_eq!(settings.logging.level, "warn");
        assert!(!settings.logging.json);
    }

    #[test]
    fn camel_case_wire_format() {
        let json = serde_json::to_value(ArborSettings::default()).unwrap();
        assert!(json["database"]["poolSize"].is_number());
        assert!(json["database"]["busyTimeoutMs"].is_number());
        assert!(json["database"]["cacheSizeKib"].is_number());
        assert!(json["logging"]["json"].is_boolean());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let settings: ArborSettings =
            serde_json::from_str(r#"{"database": {"poolSize": 2}}"#).unwrap();
        assert_eq!(settings.database.pool_size, 2);
        assert_eq!(settings.database.busy_timeout_ms, 5_000);
        assert_eq!(settings.logging, LoggingSettings::default());
    }
}
