//! Post-merge validation.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// Log formats the telemetry layer understands.
pub const LOG_FORMATS: &[&str] = &["pretty", "compact", "json", "full"];

/// Check a merged configuration.
///
/// # Errors
///
/// Returns the first [`ConfigError::ValidationError`] found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_breaker(config)?;
    validate_plugins(config)?;
    validate_logging(config)?;
    Ok(())
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_owned(),
        message: message.into(),
    }
}

fn validate_breaker(config: &Config) -> ConfigResult<()> {
    let b = &config.breaker;

    if b.failure_threshold == 0 {
        return Err(invalid(
            "breaker.failure_threshold",
            "failure_threshold must be at least 1",
        ));
    }
    if b.failure_window_ms == 0 {
        return Err(invalid(
            "breaker.failure_window_ms",
            "failure_window_ms must be at least 1",
        ));
    }
    if b.cool_down_ms == 0 {
        return Err(invalid("breaker.cool_down_ms", "cool_down_ms must be at least 1"));
    }

    Ok(())
}

fn validate_plugins(config: &Config) -> ConfigResult<()> {
    if config.plugins.manifest_path.trim().is_empty() {
        return Err(invalid("plugins.manifest_path", "manifest_path must not be empty"));
    }
    if let Some(blank) = config.plugins.disabled.iter().find(|id| id.trim().is_empty()) {
        return Err(invalid(
            "plugins.disabled",
            format!("disabled contains an empty plugin id ({blank:?})"),
        ));
    }
    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let l = &config.logging;

    if l.level.trim().is_empty() {
        return Err(invalid("logging.level", "level must not be empty"));
    }
    if !LOG_FORMATS.contains(&l.format.as_str()) {
        return Err(invalid(
            "logging.format",
            format!(
                "unsupported format '{}'; expected one of: {}",
                l.format,
                LOG_FORMATS.join(", ")
            ),
        ));
    }

    Ok(())
}
