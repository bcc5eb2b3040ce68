//! Configuration types for the Keystone runtime.
//!
//! These types do not depend on any other keystone crate. The CLI converts
//! them into runtime types at startup. Every struct implements [`Default`]
//! so a bare `[section]` header produces a working configuration.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Circuit breaker thresholds.
    pub breaker: BreakerSection,
    /// Where plugin manifests come from and which start disabled.
    pub plugins: PluginsSection,
    /// Log level and output format.
    pub logging: LoggingSection,
}

/// `[breaker]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerSection {
    /// Failures within the window that trip a breaker.
    pub failure_threshold: u32,
    /// Sliding failure window in milliseconds.
    pub failure_window_ms: u64,
    /// Cool-down before an open breaker admits trial calls, in milliseconds.
    pub cool_down_ms: u64,
}

impl Default for BreakerSection {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            failure_window_ms: 5_000,
            cool_down_ms: 30_000,
        }
    }
}

/// `[plugins]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginsSection {
    /// Path of the TOML manifest file, relative to the working directory.
    pub manifest_path: String,
    /// Plugin ids that start switched off regardless of their manifest.
    pub disabled: Vec<String>,
}

impl Default for PluginsSection {
    fn default() -> Self {
        Self {
            manifest_path: "plugins.toml".to_owned(),
            disabled: Vec::new(),
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Default level (`trace`, `debug`, `info`, `warn`, `error`).
    pub level: String,
    /// Output format: `pretty`, `compact`, `json` or `full`.
    pub format: String,
    /// Extra per-target directives such as `keystone_plugins=debug`.
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "pretty".to_owned(),
            directives: Vec::new(),
        }
    }
}
