//! Dependency graph builder.
//!
//! Resolves each plugin's `requires` against the other plugins' `provides`
//! and assigns topological layers.
//!
//! # Provider selection
//!
//! When several plugins provide the same capability, the first one registered
//! is the sole *edge source* for it: only that provider appears in
//! [`GraphData::edges`] and feeds layering and cycle detection. Every provider
//! is still tracked in [`DependencyGraph::providers_of`] and
//! [`DependencyGraph::dependents_of`], so status evaluation and propagation see
//! all of them.
//!
//! # Cycles
//!
//! Layering is Kahn's algorithm over edge sources. Whatever cannot be layered
//! is split with an iterative strongly-connected-components pass: plugins in
//! a component of two or more nodes are on a cycle, the rest merely sit
//! behind one. Both runs are O(V+E) and use explicit stacks.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::{debug, warn};

use keystone_core::{CapabilityName, GraphData, GraphEdge, GraphNode, PluginId, RuntimePlugin, StatusReason};

use crate::error::{PluginError, PluginResult};

/// Dependency graph derived from one registry snapshot.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    data: GraphData,
    providers: HashMap<CapabilityName, Vec<PluginId>>,
    dependents: HashMap<PluginId, Vec<PluginId>>,
    cycle: HashMap<PluginId, StatusReason>,
    unresolved: HashMap<PluginId, Vec<CapabilityName>>,
}

impl DependencyGraph {
    /// A graph with no plugins.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build the graph for `plugins`, given in registration order.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::CorruptSnapshot`] if a manifest is malformed or
    /// two plugins share an ID. Callers keep their previous graph in that case.
    pub fn build(plugins: &[RuntimePlugin]) -> PluginResult<Self> {
        let mut positions: HashSet<&PluginId> = HashSet::with_capacity(plugins.len());
        for plugin in plugins {
            plugin.manifest.validate().map_err(|e| {
                PluginError::CorruptSnapshot(format!("plugin {}: {e}", plugin.id()))
            })?;
            if !positions.insert(plugin.id()) {
                return Err(PluginError::CorruptSnapshot(format!(
                    "duplicate plugin id {}",
                    plugin.id()
                )));
            }
        }

        // Capability -> provider positions, in registration order.
        let mut by_capability: HashMap<&CapabilityName, Vec<usize>> = HashMap::new();
        for (position, plugin) in plugins.iter().enumerate() {
            for capability in &plugin.manifest.provides {
                by_capability.entry(capability).or_default().push(position);
            }
        }

        let count = plugins.len();
        let mut outgoing: Vec<Vec<usize>> = vec![Vec::new(); count];
        let mut incoming: Vec<Vec<usize>> = vec![Vec::new(); count];
        let mut edges = Vec::new();
        let mut unresolved: HashMap<PluginId, Vec<CapabilityName>> = HashMap::new();
        let mut dependents: HashMap<PluginId, Vec<PluginId>> = HashMap::new();
        let mut linked: HashSet<(usize, usize)> = HashSet::new();

        for (to, consumer) in plugins.iter().enumerate() {
            for capability in &consumer.manifest.requires {
                let Some(all) = by_capability.get(capability) else {
                    unresolved
                        .entry(consumer.id().clone())
                        .or_default()
                        .push(capability.clone());
                    continue;
                };

                if let Some(&from) = all.first() {
                    outgoing[from].push(to);
                    incoming[to].push(from);
                    edges.push(GraphEdge {
                        from: plugins[from].id().clone(),
                        to: consumer.id().clone(),
                        capability: capability.clone(),
                    });
                }

                for &provider in all {
                    if linked.insert((provider, to)) {
                        dependents
                            .entry(plugins[provider].id().clone())
                            .or_default()
                            .push(consumer.id().clone());
                    }
                }
            }
        }

        let layers = assign_layers(&outgoing, &incoming);

        let residual: Vec<bool> = layers.iter().map(Option::is_none).collect();
        let mut cycle = HashMap::new();
        if residual.iter().any(|&r| r) {
            let on_cycle = cycle_members(&residual, &outgoing, &incoming);
            for (position, plugin) in plugins.iter().enumerate() {
                if !residual[position] {
                    continue;
                }
                let reason = if on_cycle[position] {
                    StatusReason::CircularDependency
                } else {
                    StatusReason::DownstreamOfCycle
                };
                warn!(plugin_id = %plugin.id(), reason = %reason, "Plugin cannot be layered");
                cycle.insert(plugin.id().clone(), reason);
            }
        }

        let nodes = plugins
            .iter()
            .zip(&layers)
            .map(|(plugin, layer)| GraphNode {
                plugin_id: plugin.id().clone(),
                layer: *layer,
            })
            .collect();

        let providers = by_capability
            .into_iter()
            .map(|(capability, positions)| {
                let ids = positions.iter().map(|&p| plugins[p].id().clone()).collect();
                (capability.clone(), ids)
            })
            .collect();

        debug!(
            node_count = count,
            edge_count = edges.len(),
            cyclic_count = cycle.len(),
            "Rebuilt dependency graph"
        );

        Ok(Self {
            data: GraphData { nodes, edges },
            providers,
            dependents,
            cycle,
            unresolved,
        })
    }

    /// Nodes and edges for observers.
    #[must_use]
    pub fn data(&self) -> &GraphData {
        &self.data
    }

    /// Topological layer of a plugin. `None` if unknown or cyclic.
    #[must_use]
    pub fn layer_of(&self, id: &PluginId) -> Option<u32> {
        self.data.layer_of(id)
    }

    /// Every provider of a capability, in registration order.
    #[must_use]
    pub fn providers_of(&self, capability: &CapabilityName) -> &[PluginId] {
        self.providers.get(capability).map_or(&[], Vec::as_slice)
    }

    /// The provider that sources edges for a capability.
    #[must_use]
    pub fn edge_source(&self, capability: &CapabilityName) -> Option<&PluginId> {
        self.providers_of(capability).first()
    }

    /// Plugins that require something `id` provides, in registration order.
    #[must_use]
    pub fn dependents_of(&self, id: &PluginId) -> &[PluginId] {
        self.dependents.get(id).map_or(&[], Vec::as_slice)
    }

    /// Why a plugin could not be layered, if it could not.
    #[must_use]
    pub fn cycle_reason(&self, id: &PluginId) -> Option<&StatusReason> {
        self.cycle.get(id)
    }

    /// Whether the plugin is on or behind a dependency cycle.
    #[must_use]
    pub fn is_cyclic(&self, id: &PluginId) -> bool {
        self.cycle.contains_key(id)
    }

    /// Requirements of `id` that no registered plugin provides.
    #[must_use]
    pub fn unresolved(&self, id: &PluginId) -> &[CapabilityName] {
        self.unresolved.get(id).map_or(&[], Vec::as_slice)
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.nodes.len()
    }

    /// Whether the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.nodes.is_empty()
    }
}

/// Kahn layering. A node's layer is one more than its deepest provider.
fn assign_layers(outgoing: &[Vec<usize>], incoming: &[Vec<usize>]) -> Vec<Option<u32>> {
    let mut waiting: Vec<usize> = incoming.iter().map(Vec::len).collect();
    let mut depth = vec![0u32; incoming.len()];
    let mut layers = vec![None; incoming.len()];
    let mut queue = VecDeque::new();

    for (node, &degree) in waiting.iter().enumerate() {
        if degree == 0 {
            layers[node] = Some(0);
            queue.push_back(node);
        }
    }

    while let Some(node) = queue.pop_front() {
        let next = depth[node].saturating_add(1);
        for &consumer in &outgoing[node] {
            depth[consumer] = depth[consumer].max(next);
            waiting[consumer] = waiting[consumer].saturating_sub(1);
            if waiting[consumer] == 0 {
                layers[consumer] = Some(depth[consumer]);
                queue.push_back(consumer);
            }
        }
    }

    layers
}

/// Marks residual nodes that belong to a strongly connected component of two
/// or more nodes (Kosaraju, restricted to the residual set).
fn cycle_members(residual: &[bool], outgoing: &[Vec<usize>], incoming: &[Vec<usize>]) -> Vec<bool> {
    let count = residual.len();

    let mut visited = vec![false; count];
    let mut finished = Vec::with_capacity(count);
    for start in 0..count {
        if !residual[start] || visited[start] {
            continue;
        }
        visited[start] = true;
        let mut stack = vec![(start, 0usize)];
        while let Some((node, cursor)) = stack.last_mut() {
            let node = *node;
            if let Some(&next) = outgoing[node].get(*cursor) {
                *cursor = cursor.saturating_add(1);
                if residual[next] && !visited[next] {
                    visited[next] = true;
                    stack.push((next, 0));
                }
            } else {
                finished.push(node);
                stack.pop();
            }
        }
    }

    let mut assigned = vec![false; count];
    let mut on_cycle = vec![false; count];
    for &root in finished.iter().rev() {
        if assigned[root] {
            continue;
        }
        assigned[root] = true;
        let mut component = vec![root];
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            for &provider in &incoming[node] {
                if residual[provider] && !assigned[provider] {
                    assigned[provider] = true;
                    component.push(provider);
                    stack.push(provider);
                }
            }
        }
        if component.len() > 1 {
            for member in component {
                on_cycle[member] = true;
            }
        }
    }

    on_cycle
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{id, plugin};

    fn cap(s: &str) -> CapabilityName {
        CapabilityName::from_static(s)
    }

    #[test]
    fn test_provider_edge_and_layer() {
        let graph = DependencyGraph::build(&[
            plugin("core.mic", &["audio_in"], &[]),
            plugin("stt.engine", &["transcript"], &["audio_in"]),
        ])
        .unwrap();

        assert!(graph.data().has_edge(&id("core.mic"), &id("stt.engine"), &cap("audio_in")));
        assert_eq!(graph.layer_of(&id("core.mic")), Some(0));
        assert_eq!(graph.layer_of(&id("stt.engine")), Some(1));
        assert_eq!(graph.dependents_of(&id("core.mic")), [id("stt.engine")]);
    }

    #[test]
    fn test_layer_is_longest_path() {
        // mic -> stt -> assistant, and mic -> assistant directly.
        let graph = DependencyGraph::build(&[
            plugin("assistant", &[], &["transcript", "audio_in"]),
            plugin("stt.engine", &["transcript"], &["audio_in"]),
            plugin("core.mic", &["audio_in"], &[]),
        ])
        .unwrap();

        assert_eq!(graph.layer_of(&id("core.mic")), Some(0));
        assert_eq!(graph.layer_of(&id("stt.engine")), Some(1));
        assert_eq!(graph.layer_of(&id("assistant")), Some(2));
        for edge in &graph.data().edges {
            let from = graph.layer_of(&edge.from).unwrap();
            let to = graph.layer_of(&edge.to).unwrap();
            assert!(to > from, "{} -> {}", edge.from, edge.to);
        }
    }

    #[test]
    fn test_first_registered_provider_sources_edges() {
        let graph = DependencyGraph::build(&[
            plugin("mic.usb", &["audio_in"], &[]),
            plugin("mic.array", &["audio_in"], &[]),
            plugin("stt.engine", &[], &["audio_in"]),
        ])
        .unwrap();

        assert_eq!(graph.data().edges.len(), 1);
        assert!(graph.data().has_edge(&id("mic.usb"), &id("stt.engine"), &cap("audio_in")));
        assert_eq!(graph.edge_source(&cap("audio_in")), Some(&id("mic.usb")));
        assert_eq!(graph.providers_of(&cap("audio_in")), [id("mic.usb"), id("mic.array")]);
        assert_eq!(graph.dependents_of(&id("mic.array")), [id("stt.engine")]);
    }

    #[test]
    fn test_unresolved_requirement() {
        let graph = DependencyGraph::build(&[plugin("stt.engine", &[], &["audio_in"])]).unwrap();

        assert!(graph.data().edges.is_empty());
        assert_eq!(graph.layer_of(&id("stt.engine")), Some(0));
        assert_eq!(graph.unresolved(&id("stt.engine")), [cap("audio_in")]);
        assert!(!graph.is_cyclic(&id("stt.engine")));
    }

    #[test]
    fn test_mutual_cycle_is_isolated() {
        let graph = DependencyGraph::build(&[
            plugin("core.mic", &["audio_in"], &[]),
            plugin("plugin.c", &["z"], &["y"]),
            plugin("plugin.d", &["y"], &["z"]),
            plugin("stt.engine", &[], &["audio_in"]),
        ])
        .unwrap();

        assert_eq!(graph.cycle_reason(&id("plugin.c")), Some(&StatusReason::CircularDependency));
        assert_eq!(graph.cycle_reason(&id("plugin.d")), Some(&StatusReason::CircularDependency));
        assert_eq!(graph.layer_of(&id("plugin.c")), None);
        assert!(!graph.is_cyclic(&id("core.mic")));
        assert!(!graph.is_cyclic(&id("stt.engine")));
        assert_eq!(graph.layer_of(&id("stt.engine")), Some(1));
    }

    #[test]
    fn test_downstream_of_cycle() {
        let graph = DependencyGraph::build(&[
            plugin("plugin.c", &["z"], &["y"]),
            plugin("plugin.d", &["y"], &["z"]),
            plugin("plugin.e", &[], &["y"]),
        ])
        .unwrap();

        assert_eq!(graph.cycle_reason(&id("plugin.e")), Some(&StatusReason::DownstreamOfCycle));
        assert_eq!(graph.layer_of(&id("plugin.e")), None);
    }

    #[test]
    fn test_plugin_between_two_cycles_is_not_a_member() {
        let graph = DependencyGraph::build(&[
            plugin("c1", &["b"], &["a"]),
            plugin("c2", &["a"], &["b"]),
            plugin("bridge", &["c"], &["b"]),
            plugin("d1", &["e"], &["c", "f"]),
            plugin("d2", &["f"], &["e"]),
        ])
        .unwrap();

        assert_eq!(graph.cycle_reason(&id("bridge")), Some(&StatusReason::DownstreamOfCycle));
        for member in ["c1", "c2", "d1", "d2"] {
            assert_eq!(
                graph.cycle_reason(&id(member)),
                Some(&StatusReason::CircularDependency),
                "{member}"
            );
        }
    }

    #[test]
    #[allow(clippy::arithmetic_side_effects)]
    fn test_long_chain_and_ring_terminate() {
        let mut chain = vec![plugin("p0", &["c0"], &[])];
        for i in 1..5_000 {
            let provides = format!("c{i}");
            let requires = format!("c{}", i - 1);
            chain.push(plugin(&format!("p{i}"), &[&provides], &[&requires]));
        }
        let graph = DependencyGraph::build(&chain).unwrap();
        assert_eq!(graph.layer_of(&id("p4999")), Some(4999));

        let ring: Vec<RuntimePlugin> = (0..5_000)
            .map(|i| {
                let provides = format!("r{i}");
                let requires = format!("r{}", (i + 1) % 5_000);
                plugin(&format!("q{i}"), &[&provides], &[&requires])
            })
            .collect();
        let graph = DependencyGraph::build(&ring).unwrap();
        assert!(graph.is_cyclic(&id("q0")));
        assert!(graph.is_cyclic(&id("q4999")));
    }

    #[test]
    fn test_duplicate_ids_are_corrupt() {
        let result = DependencyGraph::build(&[
            plugin("core.mic", &["audio_in"], &[]),
            plugin("core.mic", &[], &[]),
        ]);
        assert!(matches!(result, Err(PluginError::CorruptSnapshot(_))));
    }

    #[test]
    fn test_malformed_manifest_is_corrupt() {
        let mut bad = plugin("core.mic", &["audio_in"], &[]);
        bad.manifest.requires.push(cap("audio_in"));
        let result = DependencyGraph::build(&[bad]);
        assert!(matches!(result, Err(PluginError::CorruptSnapshot(_))));
    }
}
