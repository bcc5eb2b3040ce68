//! Keystone Test - Shared test utilities for the Keystone runtime.
//!
//! This crate provides fixtures and mock implementations that can be used
//! across Keystone crates as a dev-dependency.
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! keystone-test.workspace = true
//! ```
//!
//! Then use in your tests:
//!
//! ```rust,ignore
//! use keystone_test::{boot_runtime, plugin_id, voice_assistant_manifests};
//!
//! #[test]
//! fn test_mic_toggle() {
//!     let (mut runtime, _clock) = boot_runtime(voice_assistant_manifests());
//!     runtime.toggle_plugin(&plugin_id("core.mic")).unwrap();
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod fixtures;
pub mod mocks;

pub use fixtures::*;
pub use mocks::*;

/// Install a test-friendly tracing subscriber once per process.
///
/// Honors `RUST_LOG`; defaults to `warn`. Safe to call from every test.
pub fn init_test_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
