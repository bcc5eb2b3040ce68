//! Keystone Plugins - dependency and fault management for plugins.
//!
//! This crate provides:
//! - [`CapabilityRegistry`]: the authoritative plugin list, published as
//!   immutable snapshots
//! - [`DependencyGraph`]: capability resolution, topological layers and cycle
//!   detection
//! - [`FaultPropagator`]: breadth-first failure and recovery cascades
//! - [`BreakerManager`]: per-plugin circuit breakers evaluated against an
//!   injectable clock
//! - [`ExecutionGuard`]: breaker-aware wrapper around plugin calls
//! - [`PluginRuntime`]: the facade that runs every mutation as one batch
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use keystone_core::{CapabilityName, PluginId, PluginManifest, PluginStatus, SystemClock};
//! use keystone_plugins::{BreakerConfig, PluginRuntime};
//!
//! let mic = PluginManifest::new(PluginId::new("core.mic").unwrap(), "Microphone")
//!     .with_provides(CapabilityName::new("audio_in").unwrap());
//! let stt = PluginManifest::new(PluginId::new("stt.engine").unwrap(), "Speech to text")
//!     .with_requires(CapabilityName::new("audio_in").unwrap());
//!
//! let (mut runtime, errors) =
//!     PluginRuntime::boot(BreakerConfig::default(), Arc::new(SystemClock), [mic, stt]);
//! assert!(errors.is_empty());
//!
//! runtime.toggle_plugin(&PluginId::new("core.mic").unwrap()).unwrap();
//!
//! let stt = runtime.get(&PluginId::new("stt.engine").unwrap()).unwrap();
//! assert_eq!(stt.status, PluginStatus::PausedDependency);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod breaker;
mod error;
mod graph;
mod guard;
mod propagation;
mod registry;
mod runtime;
#[cfg(test)]
mod test_support;

pub use breaker::{Admission, BreakerConfig, BreakerManager, BreakerTransition};
pub use error::{GuardError, InvocationError, PluginError, PluginResult};
pub use graph::DependencyGraph;
pub use guard::{ExecutionGuard, PluginInvoker};
pub use propagation::{FaultPropagator, PropagationReport};
pub use registry::CapabilityRegistry;
pub use runtime::{PluginRuntime, RuntimeHealth, SharedRuntime};
