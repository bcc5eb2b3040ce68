//! Plugin runtime error types.

use chrono::{DateTime, Utc};

use keystone_core::{CoreError, PluginId, PluginStatus, StatusReason};

/// Errors from registry, graph and breaker operations.
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    /// The requested plugin was not found in the registry.
    #[error("plugin not found: {0}")]
    NotFound(PluginId),

    /// A plugin with this ID is already registered.
    #[error("plugin already registered: {0}")]
    AlreadyRegistered(PluginId),

    /// The manifest failed validation.
    #[error("manifest validation failed: {0}")]
    Validation(#[from] CoreError),

    /// The registry snapshot handed to the graph builder is structurally
    /// invalid. The previous graph stays in place.
    #[error("corrupt registry snapshot: {0}")]
    CorruptSnapshot(String),
}

/// Result type for plugin runtime operations.
pub type PluginResult<T> = Result<T, PluginError>;

/// Failure reported by the invocation layer for a single call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct InvocationError {
    /// What went wrong.
    pub message: String,
}

impl InvocationError {
    /// Create a new invocation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors returned to callers of the [`ExecutionGuard`](crate::ExecutionGuard).
#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    /// No plugin with this ID is registered.
    #[error("plugin not found: {0}")]
    NotFound(PluginId),

    /// The breaker is open; the plugin was not invoked.
    #[error("circuit breaker open for {plugin_id}")]
    BreakerOpen {
        /// The guarded plugin.
        plugin_id: PluginId,
        /// When a trial call will be allowed.
        retry_at: Option<DateTime<Utc>>,
    },

    /// The plugin is not active; the plugin was not invoked.
    #[error("plugin {plugin_id} is unavailable ({status})")]
    Unavailable {
        /// The plugin that was called.
        plugin_id: PluginId,
        /// Its current status.
        status: PluginStatus,
        /// Why it has that status, if known.
        reason: Option<StatusReason>,
    },

    /// The plugin was invoked and the call failed.
    #[error("plugin {plugin_id} call failed: {source}")]
    Invocation {
        /// The plugin that was called.
        plugin_id: PluginId,
        /// The underlying failure.
        #[source]
        source: InvocationError,
    },
}
