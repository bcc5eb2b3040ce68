//! Keystone Core - shared types for the Keystone plugin runtime.
//!
//! Everything the dependency and fault-management layer passes between its
//! components lives here, so that observers (dashboards, the CLI, the event
//! bus) can depend on the data model without pulling in the runtime itself:
//!
//! - [`PluginId`] / [`CapabilityName`]: validated identifiers
//! - [`PluginManifest`]: what a plugin provides and requires
//! - [`RuntimePlugin`] / [`PluginStatus`] / [`StatusReason`]: live plugin state
//! - [`RegistrySnapshot`]: an immutable, versioned view of every plugin
//! - [`GraphNode`] / [`GraphEdge`] / [`GraphData`]: the dependency graph
//! - [`BreakerState`] / [`BreakerStatus`]: circuit breaker state per plugin
//! - [`Clock`]: injectable time source ([`SystemClock`], [`ManualClock`])

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod breaker;
pub mod clock;
pub mod error;
pub mod graph;
pub mod id;
pub mod manifest;
pub mod snapshot;
pub mod status;

pub use breaker::{BreakerState, BreakerStatus};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CoreError, CoreResult};
pub use graph::{GraphData, GraphEdge, GraphNode};
pub use id::{CapabilityName, PluginId};
pub use manifest::PluginManifest;
pub use snapshot::RegistrySnapshot;
pub use status::{PluginStatus, RuntimePlugin, StatusReason};
