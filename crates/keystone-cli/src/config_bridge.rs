//! Conversion from `keystone_config` types to runtime types.

use std::time::Duration;

use keystone_config::{BreakerSection, Config};
use keystone_plugins::BreakerConfig;
use keystone_telemetry::{LogConfig, LogFormat};

/// Breaker tuning from the `[breaker]` section.
pub(crate) fn breaker_config(section: &BreakerSection) -> BreakerConfig {
    BreakerConfig {
        failure_threshold: section.failure_threshold,
        failure_window: Duration::from_millis(section.failure_window_ms),
        cool_down: Duration::from_millis(section.cool_down_ms),
    }
}

/// Logging setup from the `[logging]` section, with `--verbose` raising the
/// level to `debug`.
pub(crate) fn log_config(config: &Config, verbose: bool) -> LogConfig {
    let mut log = LogConfig::from_section(&config.logging)
        .unwrap_or_else(|_| LogConfig::new(config.logging.level.clone()).with_format(LogFormat::Compact));
    if verbose {
        "debug".clone_into(&mut log.level);
    }
    log
}
