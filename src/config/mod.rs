//! Configuration Module
//!
//! Provides the source registry and HTTP settings, loaded from TOML files
//! on top of a built-in station table.
//!
//! ## Loading Order
//!
//! 1. `WINDFETCH_CONFIG` environment variable (path to TOML file)
//! 2. `windfetch.toml` in the current working directory
//! 3. Built-in defaults
//!
//! ## Usage
//!
//! Call `config::init()` once at startup, then `config::get()` anywhere:
//!
//! ```ignore
//! // In main():
//! config::init(WindfetchConfig::load());
//!
//! // Anywhere in the codebase:
//! let timeout = config::get().http.timeout_secs;
//! ```

mod registry;
pub mod defaults;
pub mod validation;

pub use registry::*;

use std::sync::OnceLock;

/// Global configuration, initialized once at startup.
static WINDFETCH_CONFIG: OnceLock<WindfetchConfig> = OnceLock::new();

/// Initialize the global configuration.
///
/// Later calls are ignored with a warning.
pub fn init(config: WindfetchConfig) {
    if WINDFETCH_CONFIG.set(config).is_err() {
        tracing::warn!("config::init() called more than once, ignoring");
    }
}

/// Get the global configuration, initializing it with built-in defaults
/// if `init()` has not been called.
pub fn get() -> &'static WindfetchConfig {
    WINDFETCH_CONFIG.get_or_init(WindfetchConfig::default)
}
