#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
//! Layered configuration for the Keystone plugin runtime.
//!
//! # Usage
//!
//! ```rust,no_run
//! use keystone_config::Config;
//!
//! let resolved = Config::load(Some(std::path::Path::new("."))).unwrap();
//! println!("trip after {} failures", resolved.config.breaker.failure_threshold);
//! ```
//!
//! # Precedence
//!
//! From highest to lowest:
//!
//! 1. **Workspace** (`{workspace}/.keystone/config.toml`)
//! 2. **User** (`~/.keystone/config.toml`, else `$KEYSTONE_HOME/config.toml`)
//! 3. **Environment** (`KEYSTONE_*`), only for fields no file set
//! 4. **Embedded defaults**
//!
//! [`Config::load_explicit`] puts one named file in place of the workspace
//! and user files.
//!
//! This crate depends on no other keystone crate. The CLI turns these types
//! into runtime types at startup.

/// Environment variable fallbacks.
pub mod env;
/// Configuration error types.
pub mod error;
/// Config file discovery and loading.
pub mod loader;
/// Layered TOML merging.
pub mod merge;
/// The resolved configuration and its rendering.
pub mod show;
/// Configuration structs.
pub mod types;
/// Validation rules.
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use merge::{ConfigLayer, FieldSources};
pub use show::{ResolvedConfig, ShowFormat};
pub use types::*;

impl Config {
    /// Load configuration from every layer.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if a config file is malformed or the merged
    /// configuration fails validation.
    pub fn load(workspace_root: Option<&std::path::Path>) -> ConfigResult<ResolvedConfig> {
        loader::load(workspace_root, None)
    }

    /// Load configuration with `keystone_home` standing in for `~/.keystone`.
    ///
    /// # Errors
    ///
    /// See [`Config::load`].
    pub fn load_with_home(
        workspace_root: Option<&std::path::Path>,
        keystone_home: &std::path::Path,
    ) -> ConfigResult<ResolvedConfig> {
        loader::load(workspace_root, Some(keystone_home))
    }

    /// Load the defaults, `path`, then `KEYSTONE_*` fallbacks, recording
    /// where each field came from.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read, parsed, or fails
    /// validation.
    pub fn load_explicit(path: &std::path::Path) -> ConfigResult<ResolvedConfig> {
        loader::load_explicit(path)
    }

    /// Load a single file with no layering.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read, parsed, or fails
    /// validation.
    pub fn load_file(path: &std::path::Path) -> ConfigResult<Self> {
        loader::load_file(path)
    }
}
