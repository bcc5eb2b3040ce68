//! Core error types.

use thiserror::Error;

/// Validation errors for identifiers and manifests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// The plugin ID is malformed.
    #[error("invalid plugin id: {0}")]
    InvalidId(String),

    /// A capability name is malformed.
    #[error("invalid capability name: {0}")]
    InvalidCapability(String),

    /// The manifest breaks a structural rule.
    #[error("invalid manifest for {plugin_id}: {message}")]
    InvalidManifest {
        /// The offending plugin.
        plugin_id: String,
        /// What is wrong with it.
        message: String,
    },
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
