//! Keystone Telemetry - logging setup for the Keystone plugin runtime.
//!
//! # Example
//!
//! ```rust,no_run
//! use keystone_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), keystone_telemetry::TelemetryError> {
//! let config = LogConfig::new("info")
//!     .with_format(LogFormat::Compact)
//!     .with_directive("keystone_plugins=debug");
//!
//! setup_logging(&config)?;
//! tracing::info!("runtime starting");
//! # Ok(())
//! # }
//! ```
//!
//! With the `config` feature, [`LogConfig::from_section`] builds a config
//! from the `[logging]` section loaded by `keystone-config`.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{
    FileRotation, LogConfig, LogFormat, LogTarget, setup_default_logging, setup_logging,
};
