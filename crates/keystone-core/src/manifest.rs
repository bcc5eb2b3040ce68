//! Plugin manifest types.
//!
//! A manifest declares a plugin's identity and the capabilities it provides
//! and requires. Manifests are supplied by an external source at boot; the
//! runtime only consumes them.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::id::{CapabilityName, PluginId};

/// Describes a plugin's identity and its capability relations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Unique plugin identifier.
    pub id: PluginId,
    /// Human-readable display name.
    pub name: String,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Capabilities this plugin offers to others.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provides: Vec<CapabilityName>,
    /// Capabilities this plugin needs before it can become active.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<CapabilityName>,
    /// Initial user intent. Seeds `enabled_by_user` at registration.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl PluginManifest {
    /// Create a manifest with no capability relations.
    #[must_use]
    pub fn new(id: PluginId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
            provides: Vec::new(),
            requires: Vec::new(),
            enabled: true,
        }
    }

    /// Add a provided capability.
    #[must_use]
    pub fn with_provides(mut self, capability: CapabilityName) -> Self {
        self.provides.push(capability);
        self
    }

    /// Add a required capability.
    #[must_use]
    pub fn with_requires(mut self, capability: CapabilityName) -> Self {
        self.requires.push(capability);
        self
    }

    /// Set the initial user intent.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Check the manifest's structural rules.
    ///
    /// A manifest must have a well-formed ID, list each provided and each
    /// required capability at most once, and never both provide and require
    /// the same capability.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidId`] or [`CoreError::InvalidManifest`]
    /// describing the first rule that is broken.
    pub fn validate(&self) -> CoreResult<()> {
        // Ids built through `from_static` skip validation.
        PluginId::new(self.id.as_str())?;

        let invalid = |message: String| CoreError::InvalidManifest {
            plugin_id: self.id.to_string(),
            message,
        };

        let mut provided = HashSet::with_capacity(self.provides.len());
        for cap in &self.provides {
            if !provided.insert(cap) {
                return Err(invalid(format!("capability '{cap}' is provided twice")));
            }
        }

        let mut required = HashSet::with_capacity(self.requires.len());
        for cap in &self.requires {
            if !required.insert(cap) {
                return Err(invalid(format!("capability '{cap}' is required twice")));
            }
            if provided.contains(cap) {
                return Err(invalid(format!(
                    "capability '{cap}' is both provided and required"
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cap(name: &str) -> CapabilityName {
        CapabilityName::from_static(name)
    }

    fn mic() -> PluginManifest {
        PluginManifest::new(PluginId::from_static("core.mic"), "Microphone")
            .with_provides(cap("audio_in"))
    }

    #[test]
    fn test_valid_manifest() {
        assert!(mic().validate().is_ok());
        let stt = PluginManifest::new(PluginId::from_static("stt.engine"), "Whisper STT")
            .with_requires(cap("audio_in"))
            .with_provides(cap("transcript"));
        assert!(stt.validate().is_ok());
    }

    #[test]
    fn test_duplicate_provides_rejected() {
        let m = mic().with_provides(cap("audio_in"));
        let err = m.validate().unwrap_err();
        assert!(matches!(err, CoreError::InvalidManifest { .. }));
        assert!(err.to_string().contains("provided twice"));
    }

    #[test]
    fn test_duplicate_requires_rejected() {
        let m = PluginManifest::new(PluginId::from_static("stt.engine"), "STT")
            .with_requires(cap("audio_in"))
            .with_requires(cap("audio_in"));
        assert!(m.validate().unwrap_err().to_string().contains("required twice"));
    }

    #[test]
    fn test_provide_and_require_same_capability_rejected() {
        let m = mic().with_requires(cap("audio_in"));
        assert!(
            m.validate()
                .unwrap_err()
                .to_string()
                .contains("both provided and required")
        );
    }

    #[test]
    fn test_unvalidated_id_caught() {
        let m = PluginManifest::new(PluginId::from_static(""), "Nameless");
        assert!(matches!(m.validate(), Err(CoreError::InvalidId(_))));
    }

    #[test]
    fn test_manifest_toml_defaults() {
        let parsed: PluginManifest = toml::from_str(
            r#"
            id = "stt.engine"
            name = "Whisper STT"
            requires = ["audio_in"]
            "#,
        )
        .unwrap();
        assert!(parsed.enabled);
        assert!(parsed.provides.is_empty());
        assert_eq!(parsed.requires, vec![cap("audio_in")]);
    }

    #[test]
    fn test_manifest_toml_rejects_bad_capability() {
        let parsed = toml::from_str::<PluginManifest>(
            r#"
            id = "stt.engine"
            name = "Whisper STT"
            requires = ["Audio In"]
            "#,
        );
        assert!(parsed.is_err());
    }
}
