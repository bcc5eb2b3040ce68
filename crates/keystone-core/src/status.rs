//! Runtime plugin state.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::{CapabilityName, PluginId};
use crate::manifest::PluginManifest;

/// Effective status of a registered plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PluginStatus {
    /// Enabled by the user and every required capability has a live provider.
    Active,
    /// Turned off by the user.
    Disabled,
    /// Enabled by the user but waiting on a missing or inactive provider.
    PausedDependency,
    /// Cyclic dependency or tripped circuit breaker.
    Error,
}

impl PluginStatus {
    /// Whether the plugin is currently serving its capabilities.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }
}

impl fmt::Display for PluginStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Active => "ACTIVE",
            Self::Disabled => "DISABLED",
            Self::PausedDependency => "PAUSED_DEPENDENCY",
            Self::Error => "ERROR",
        })
    }
}

/// Why a plugin is not active.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatusReason {
    /// No registered plugin provides this capability.
    UnresolvedCapability {
        /// The capability nobody provides.
        capability: CapabilityName,
    },
    /// Providers exist for this capability but none is active.
    DependencyInactive {
        /// The capability without a live provider.
        capability: CapabilityName,
    },
    /// The plugin sits on a dependency cycle.
    CircularDependency,
    /// The plugin can only be reached through a dependency cycle.
    DownstreamOfCycle,
    /// The plugin's circuit breaker tripped.
    BreakerOpen,
}

impl fmt::Display for StatusReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnresolvedCapability { capability } => {
                write!(f, "no provider for '{capability}'")
            },
            Self::DependencyInactive { capability } => {
                write!(f, "no active provider for '{capability}'")
            },
            Self::CircularDependency => f.write_str("circular dependency"),
            Self::DownstreamOfCycle => f.write_str("depends on a circular dependency"),
            Self::BreakerOpen => f.write_str("circuit breaker open"),
        }
    }
}

/// A registered plugin together with its user intent and effective status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimePlugin {
    /// The manifest the plugin was registered with.
    pub manifest: PluginManifest,
    /// User intent; changed only by an explicit toggle.
    pub enabled_by_user: bool,
    /// Effective status.
    pub status: PluginStatus,
    /// Explanation for `PausedDependency` and `Error` statuses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<StatusReason>,
}

impl RuntimePlugin {
    /// Wrap a freshly registered manifest.
    ///
    /// The plugin starts `Disabled` or `PausedDependency` depending on the
    /// manifest's initial intent; the runtime settles the real status once
    /// the dependency graph is built.
    #[must_use]
    pub fn new(manifest: PluginManifest) -> Self {
        let enabled_by_user = manifest.enabled;
        Self {
            manifest,
            enabled_by_user,
            status: if enabled_by_user {
                PluginStatus::PausedDependency
            } else {
                PluginStatus::Disabled
            },
            reason: None,
        }
    }

    /// The plugin's ID.
    #[must_use]
    pub fn id(&self) -> &PluginId {
        &self.manifest.id
    }

    /// Set status and reason together.
    pub fn set_status(&mut self, status: PluginStatus, reason: Option<StatusReason>) {
        self.status = status;
        self.reason = reason;
    }

    /// Whether this plugin provides the given capability.
    #[must_use]
    pub fn provides(&self, capability: &CapabilityName) -> bool {
        self.manifest.provides.contains(capability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_plugin_follows_manifest_intent() {
        let on = RuntimePlugin::new(PluginManifest::new(
            PluginId::from_static("core.mic"),
            "Microphone",
        ));
        assert!(on.enabled_by_user);
        assert_eq!(on.status, PluginStatus::PausedDependency);

        let off = RuntimePlugin::new(
            PluginManifest::new(PluginId::from_static("core.mic"), "Microphone")
                .with_enabled(false),
        );
        assert!(!off.enabled_by_user);
        assert_eq!(off.status, PluginStatus::Disabled);
    }

    #[test]
    fn test_status_serializes_screaming_case() {
        let json = serde_json::to_string(&PluginStatus::PausedDependency).unwrap();
        assert_eq!(json, "\"PAUSED_DEPENDENCY\"");
        assert_eq!(PluginStatus::Error.to_string(), "ERROR");
    }

    #[test]
    fn test_reason_display() {
        let reason = StatusReason::UnresolvedCapability {
            capability: CapabilityName::from_static("audio_in"),
        };
        assert_eq!(reason.to_string(), "no provider for 'audio_in'");
        assert_eq!(
            StatusReason::CircularDependency.to_string(),
            "circular dependency"
        );
    }

    #[test]
    fn test_reason_serde_is_tagged() {
        let json = serde_json::to_value(StatusReason::BreakerOpen).unwrap();
        assert_eq!(json["kind"], "breaker_open");
    }
}
