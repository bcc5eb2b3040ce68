//! Prelude module - commonly used types for convenient import.
//!
//! Use `use keystone_plugins::prelude::*;` to import all essential types.

pub use crate::{PluginRuntime, RuntimeHealth, SharedRuntime};

pub use crate::{BreakerConfig, ExecutionGuard, PluginInvoker};

pub use crate::{GuardError, InvocationError, PluginError, PluginResult};
