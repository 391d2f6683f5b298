//! # arbor-settings
//!
//! Layered configuration for the arbor task store.
//!
//! Settings are resolved from three layers (in priority order):
//! 1. **Compiled defaults**: [`ArborSettings::default()`]
//! 2. **User file**: `~/.arbor/settings.json`, deep-merged over the defaults
//! 3. **Environment**: `ARBOR_*` overrides
//!
//! The result is range-checked before it is returned.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, apply_overrides, deep_merge, load_settings, load_settings_from_path,
    settings_path,
};
pub use types::{ArborSettings, DatabaseSettings, LoggingSettings, arbor_home};
