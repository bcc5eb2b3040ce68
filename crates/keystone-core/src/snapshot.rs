//! Immutable registry snapshots.

use serde::{Deserialize, Serialize};

use crate::id::PluginId;
use crate::status::{PluginStatus, RuntimePlugin};

/// A point-in-time copy of every registered plugin.
///
/// Plugins appear in manifest registration order. `generation` increases by
/// one each time a changed snapshot is published, so observers can discard
/// stale copies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    /// Publication counter, starting at 0 for the empty registry.
    pub generation: u64,
    /// Plugins in registration order.
    pub plugins: Vec<RuntimePlugin>,
}

impl RegistrySnapshot {
    /// Look up a plugin by ID.
    #[must_use]
    pub fn get(&self, id: &PluginId) -> Option<&RuntimePlugin> {
        self.plugins.iter().find(|p| p.id() == id)
    }

    /// Status of a plugin, if registered.
    #[must_use]
    pub fn status_of(&self, id: &PluginId) -> Option<PluginStatus> {
        self.get(id).map(|p| p.status)
    }

    /// Number of plugins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Whether no plugins are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}
