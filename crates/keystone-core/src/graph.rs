//! Dependency graph data exposed to observers.

use serde::{Deserialize, Serialize};

use crate::id::{CapabilityName, PluginId};

/// A plugin's position in the dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    /// The plugin this node stands for.
    pub plugin_id: PluginId,
    /// Topological layer. `None` for plugins caught in (or behind) a cycle.
    pub layer: Option<u32>,
}

/// A provider → consumer edge satisfying one required capability.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphEdge {
    /// Provider plugin.
    pub from: PluginId,
    /// Consumer plugin.
    pub to: PluginId,
    /// The requirement this edge satisfies.
    pub capability: CapabilityName,
}

/// Nodes and edges of the dependency graph, in registration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphData {
    /// One node per registered plugin.
    pub nodes: Vec<GraphNode>,
    /// One edge per resolved requirement.
    pub edges: Vec<GraphEdge>,
}

impl GraphData {
    /// Layer of a plugin, if it has one.
    #[must_use]
    pub fn layer_of(&self, id: &PluginId) -> Option<u32> {
        self.nodes
            .iter()
            .find(|n| &n.plugin_id == id)
            .and_then(|n| n.layer)
    }

    /// Whether an edge `from → to` for `capability` exists.
    #[must_use]
    pub fn has_edge(&self, from: &PluginId, to: &PluginId, capability: &CapabilityName) -> bool {
        self.edges
            .iter()
            .any(|e| &e.from == from && &e.to == to && &e.capability == capability)
    }
}
