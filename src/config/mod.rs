//! Engine Configuration Module
//!
//! Provides zone definitions and engine tunables loaded from TOML files.
//!
//! ## Loading Order
//!
//! 1. `THERMAL_CONFIG` environment variable (path to TOML file)
//! 2. `thermal_zones.toml` in the current working directory
//! 3. Built-in defaults (no zones)
//!
//! ## Usage
//!
//! Call `config::init()` once at startup, then `config::get()` anywhere:
//!
//! ```ignore
//! // In main():
//! config::init(EngineConfig::load());
//!
//! // Anywhere in the binary:
//! let interval = config::get().persistence.save_interval_secs;
//! ```
//!
//! Zone engines never read the global directly; they receive an
//! `EngineSettings` copy so several engines can run side by side in tests.

mod engine_config;
pub mod defaults;

pub use engine_config::*;

use std::sync::OnceLock;

/// Global engine configuration, initialized once at startup.
static ENGINE_CONFIG: OnceLock<EngineConfig> = OnceLock::new();

/// Initialize the global engine configuration.
///
/// Later calls are ignored with a warning.
pub fn init(config: EngineConfig) {
    if ENGINE_CONFIG.set(config).is_err() {
        tracing::warn!("config::init() called more than once, ignoring");
    }
}

/// Get the global engine configuration.
///
/// Falls back to built-in defaults when `init()` has not been called.
pub fn get() -> &'static EngineConfig {
    ENGINE_CONFIG.get_or_init(EngineConfig::default)
}

/// Check whether the config has been initialized.
pub fn is_initialized() -> bool {
    ENGINE_CONFIG.get().is_some()
}
