//! Plugin and capability identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Unique, stable, human-readable plugin identifier.
///
/// Plugin IDs are strings like `"core.mic"` or `"stt.engine"`. They must be
/// non-empty, contain only lowercase ASCII letters, digits, `.`, `-` and `_`,
/// and start and end with a letter or digit.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PluginId(String);

/// Deserialize with validation so malformed IDs in manifest files are
/// rejected at parse time.
impl<'de> Deserialize<'de> for PluginId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}

impl PluginId {
    /// Create a new `PluginId`, validating the format.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidId`] if the ID is empty or contains
    /// invalid characters.
    pub fn new(id: impl Into<String>) -> CoreResult<Self> {
        let id = id.into();
        validate_name(&id, &[]).map_err(CoreError::InvalidId)?;
        Ok(Self(id))
    }

    /// Create a `PluginId` without validation (for tests and internal use).
    #[must_use]
    pub fn from_static(id: &str) -> Self {
        Self(id.to_string())
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check whether a string is a valid plugin ID without constructing one.
    #[must_use]
    pub fn is_valid_id(id: &str) -> bool {
        validate_name(id, &[]).is_ok()
    }
}

impl fmt::Display for PluginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PluginId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Name of a capability a plugin provides or requires (e.g. `audio_in`).
///
/// Follows the plugin ID rules and additionally allows `:` and `/`, so
/// namespaced names like `audio:pcm16` or `vision/ocr` are accepted.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct CapabilityName(String);

impl<'de> Deserialize<'de> for CapabilityName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}

impl CapabilityName {
    /// Create a new capability name, validating the format.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidCapability`] if the name is malformed.
    pub fn new(name: impl Into<String>) -> CoreResult<Self> {
        let name = name.into();
        validate_name(&name, &[':', '/']).map_err(CoreError::InvalidCapability)?;
        Ok(Self(name))
    }

    /// Create a capability name without validation (for tests and internal use).
    #[must_use]
    pub fn from_static(name: &str) -> Self {
        Self(name.to_string())
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CapabilityName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CapabilityName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Shared character rules for plugin IDs and capability names.
fn validate_name(name: &str, extra: &[char]) -> Result<(), String> {
    if name.is_empty() {
        return Err("must not be empty".into());
    }
    let allowed = |c: char| {
        c.is_ascii_lowercase()
            || c.is_ascii_digit()
            || matches!(c, '.' | '-' | '_')
            || extra.contains(&c)
    };
    if let Some(bad) = name.chars().find(|c| !allowed(*c)) {
        return Err(format!("unexpected character {bad:?} in {name:?}"));
    }
    let edge_ok = |c: Option<char>| c.is_some_and(|c| c.is_ascii_alphanumeric());
    if !edge_ok(name.chars().next()) || !edge_ok(name.chars().last()) {
        return Err(format!(
            "must start and end with a letter or digit, got: {name}"
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_plugin_ids() {
        assert!(PluginId::new("core.mic").is_ok());
        assert!(PluginId::new("stt.engine").is_ok());
        assert!(PluginId::new("tts-piper").is_ok());
        assert!(PluginId::new("gpu_monitor2").is_ok());
        assert!(PluginId::new("a").is_ok());
    }

    #[test]
    fn test_invalid_plugin_ids() {
        // Empty
        assert!(PluginId::new("").is_err());
        // Uppercase
        assert!(PluginId::new("Core.Mic").is_err());
        // Spaces
        assert!(PluginId::new("core mic").is_err());
        // Leading / trailing separators
        assert!(PluginId::new(".mic").is_err());
        assert!(PluginId::new("mic-").is_err());
        // Capability-only characters
        assert!(PluginId::new("audio:in").is_err());
    }

    #[test]
    fn test_capability_names_allow_namespaces() {
        assert!(CapabilityName::new("audio_in").is_ok());
        assert!(CapabilityName::new("audio:pcm16").is_ok());
        assert!(CapabilityName::new("vision/ocr").is_ok());
        assert!(CapabilityName::new("").is_err());
        assert!(CapabilityName::new("audio in").is_err());
    }

    #[test]
    fn test_plugin_id_display() {
        let id = PluginId::new("core.mic").unwrap();
        assert_eq!(id.to_string(), "core.mic");
        assert_eq!(id.as_str(), "core.mic");
    }

    #[test]
    fn test_plugin_id_deserialize_rejects_malformed() {
        let ok: PluginId = serde_json::from_str("\"stt.engine\"").unwrap();
        assert_eq!(ok.as_str(), "stt.engine");
        assert!(serde_json::from_str::<PluginId>("\"../etc\"").is_err());
    }

    #[test]
    fn test_invalid_id_error_mentions_input() {
        let err = PluginId::new("Bad Id").unwrap_err();
        assert!(matches!(err, CoreError::InvalidId(ref msg) if msg.contains("Bad Id")));
    }
}
