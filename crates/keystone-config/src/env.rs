//! Environment variable fallbacks.
//!
//! `KEYSTONE_*` variables only fill fields that no config file set. A value
//! that came from the embedded defaults counts as unset.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::merge::{ConfigLayer, FieldSources, set_path};

/// Prefix shared by every recognised variable.
pub const ENV_PREFIX: &str = "KEYSTONE_";

#[derive(Debug, Clone, Copy)]
enum Kind {
    Text,
    Integer,
}

/// Variable name, dotted config field, value kind.
const FALLBACKS: &[(&str, &str, Kind)] = &[
    ("KEYSTONE_LOG_LEVEL", "logging.level", Kind::Text),
    ("KEYSTONE_LOG_FORMAT", "logging.format", Kind::Text),
    ("KEYSTONE_MANIFEST_PATH", "plugins.manifest_path", Kind::Text),
    ("KEYSTONE_BREAKER_THRESHOLD", "breaker.failure_threshold", Kind::Integer),
    ("KEYSTONE_BREAKER_WINDOW_MS", "breaker.failure_window_ms", Kind::Integer),
    ("KEYSTONE_BREAKER_COOL_DOWN_MS", "breaker.cool_down_ms", Kind::Integer),
];

/// Snapshot every `KEYSTONE_*` variable from the process environment.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars()
        .filter(|(key, _)| key.starts_with(ENV_PREFIX))
        .collect()
}

/// Apply fallbacks from `env` to the merged tree.
///
/// Returns the number of fields that were filled. Values that do not parse
/// are logged and skipped.
pub fn apply_env_fallbacks(
    merged: &mut toml::Value,
    sources: &mut FieldSources,
    env: &HashMap<String, String>,
) -> usize {
    let mut applied: usize = 0;

    for &(var, field, kind) in FALLBACKS {
        let Some(raw) = env.get(var) else {
            continue;
        };

        if sources
            .get(field)
            .is_some_and(|layer| *layer != ConfigLayer::Defaults)
        {
            debug!(var, field, "Config file already sets field, ignoring environment");
            continue;
        }

        let value = match kind {
            Kind::Text => toml::Value::String(raw.trim().to_owned()),
            Kind::Integer => match raw.trim().parse::<i64>() {
                Ok(n) => toml::Value::Integer(n),
                Err(e) => {
                    warn!(var, value = %raw, error = %e, "Ignoring non-numeric environment value");
                    continue;
                },
            },
        };

        if set_path(merged, field, value) {
            sources.insert(field.to_owned(), ConfigLayer::Environment);
            applied = applied.saturating_add(1);
        }
    }

    applied
}
