//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`ArborSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over the defaults
//! 3. Apply `ARBOR_*` environment overrides (highest priority)
//! 4. Validate ranges
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::{ArborSettings, arbor_home};

/// Upper bound accepted for `database.poolSize`.
pub const MAX_POOL_SIZE: u32 = 64;

/// Upper bound accepted for `database.busyTimeoutMs`.
pub const MAX_BUSY_TIMEOUT_MS: u32 = 600_000;

/// Default settings file, `~/.arbor/settings.json`.
pub fn settings_path() -> PathBuf {
    arbor_home().join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<ArborSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields the defaults; an unreadable or malformed one is an
/// error.
pub fn load_settings_from_path(path: &Path) -> Result<ArborSettings> {
    let mut settings = read_file_layer(path)?;
    apply_env_overrides(&mut settings);
    validate(&settings)?;
    Ok(settings)
}

fn read_file_layer(path: &Path) -> Result<ArborSettings> {
    let defaults = serde_json::to_value(ArborSettings::default())?;
    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };
    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `ARBOR_*` overrides from the process environment.
pub fn apply_env_overrides(settings: &mut ArborSettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Apply overrides from an arbitrary variable source.
///
/// Values that fail to parse or fall outside their range are logged and
/// ignored, leaving the file/default value in place.
pub fn apply_overrides(settings: &mut ArborSettings, lookup: impl Fn(&str) -> Option<String>) {
    let read = |name: &str| lookup(name).filter(|v| !v.is_empty());

    if let Some(v) = read("ARBOR_DB_PATH") {
        settings.database.path = v;
    }
    if let Some(v) = read("ARBOR_POOL_SIZE") {
        match parse_u32_range(&v, 1, MAX_POOL_SIZE) {
            Some(n) => settings.database.pool_size = n,
            None => ignored("ARBOR_POOL_SIZE", &v),
        }
    }
    if let Some(v) = read("ARBOR_BUSY_TIMEOUT_MS") {
        match parse_u32_range(&v, 0, MAX_BUSY_TIMEOUT_MS) {
            Some(n) => settings.database.busy_timeout_ms = n,
            None => ignored("ARBOR_BUSY_TIMEOUT_MS", &v),
        }
    }
    if let Some(v) = read("ARBOR_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read("ARBOR_LOG_JSON") {
        match parse_bool(&v) {
            Some(b) => settings.logging.json = b,
            None => ignored("ARBOR_LOG_JSON", &v),
        }
    }
}

fn ignored(key: &str, value: &str) {
    warn!(key, value, "invalid env var, ignoring");
}

fn validate(settings: &ArborSettings) -> Result<()> {
    let db = &settings.database;
    if db.path.trim().is_empty() {
        return Err(SettingsError::InvalidValue(
            "database.path must not be empty".into(),
        ));
    }
    if !(1..=MAX_POOL_SIZE).contains(&db.pool_size) {
        return Err(SettingsError::InvalidValue(format!(
            "database.poolSize must be between 1 and {MAX_POOL_SIZE}, got {}",
            db.pool_size
        )));
    }
    if db.busy_timeout_ms > MAX_BUSY_TIMEOUT_MS {
        return Err(SettingsError::InvalidValue(format!(
            "database.busyTimeoutMs must be at most {MAX_BUSY_TIMEOUT_MS}, got {}",
            db.busy_timeout_ms
        )));
    }
    Ok(())
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u32` within an inclusive range.
pub fn parse_u32_range(val: &str, min: u32, max: u32) -> Option<u32> {
    let n: u32 = val.trim().parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
