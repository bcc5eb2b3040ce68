//! Prelude module - commonly used types for convenient import.
//!
//! Use `use keystone_core::prelude::*;` to import all essential types.

// Identifiers
pub use crate::{CapabilityName, PluginId};

// Manifests and runtime state
pub use crate::{PluginManifest, PluginStatus, RegistrySnapshot, RuntimePlugin, StatusReason};

// Graph data
pub use crate::{GraphData, GraphEdge, GraphNode};

// Breakers
pub use crate::{BreakerState, BreakerStatus};

// Time
pub use crate::{Clock, ManualClock, SystemClock};

// Errors
pub use crate::{CoreError, CoreResult};
