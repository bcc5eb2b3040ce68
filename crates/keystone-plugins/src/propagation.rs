//! Fault propagation engine.
//!
//! Cascades a status change along provider → consumer links. Both directions
//! are breadth-first with a visited set scoped to the call, so each consumer is
//! expanded at most once and a pass is O(V+E) even on malformed graphs.
//!
//! Propagation works on a batch (a working copy of the plugin list); the
//! caller decides when to publish it.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::{debug, trace, warn};

use keystone_core::{PluginId, PluginStatus, RuntimePlugin, StatusReason};

use crate::graph::DependencyGraph;

/// Plugins touched by one propagation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropagationReport {
    /// Plugins whose status or reason changed, in visit order.
    pub changed: Vec<PluginId>,
    /// Dependents that were missing from the batch; their subtrees kept
    /// their last known status.
    pub skipped: Vec<PluginId>,
}

impl PropagationReport {
    /// Whether the pass changed nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty()
    }
}

/// Walks a [`DependencyGraph`] over a batch of plugins.
#[derive(Debug)]
pub struct FaultPropagator<'g> {
    graph: &'g DependencyGraph,
    positions: HashMap<PluginId, usize>,
}

impl<'g> FaultPropagator<'g> {
    /// Create a propagator for `plugins`, which must be in the order the
    /// graph was built from.
    #[must_use]
    pub fn new(graph: &'g DependencyGraph, plugins: &[RuntimePlugin]) -> Self {
        let positions = plugins
            .iter()
            .enumerate()
            .map(|(i, p)| (p.id().clone(), i))
            .collect();
        Self { graph, positions }
    }

    fn position(&self, plugins: &[RuntimePlugin], id: &PluginId) -> Option<usize> {
        self.positions
            .get(id)
            .copied()
            .filter(|&i| plugins.get(i).is_some_and(|p| p.id() == id))
    }

    fn is_active(&self, plugins: &[RuntimePlugin], id: &PluginId) -> bool {
        self.position(plugins, id)
            .is_some_and(|i| plugins[i].status.is_active())
    }

    /// First requirement of `plugin` without an active provider.
    ///
    /// Returns `None` when every requirement has at least one active provider.
    #[must_use]
    pub fn requirement_gap(
        &self,
        plugins: &[RuntimePlugin],
        plugin: &RuntimePlugin,
    ) -> Option<StatusReason> {
        for capability in &plugin.manifest.requires {
            let providers = self.graph.providers_of(capability);
            if providers.is_empty() {
                return Some(StatusReason::UnresolvedCapability {
                    capability: capability.clone(),
                });
            }
            if !providers.iter().any(|p| self.is_active(plugins, p)) {
                return Some(StatusReason::DependencyInactive {
                    capability: capability.clone(),
                });
            }
        }
        None
    }

    /// Pause dependents that lost their last active provider.
    ///
    /// `origin` is assumed to have just left `Active`. Consumers that are not
    /// active are left alone and not traversed.
    pub fn propagate_failure(
        &self,
        plugins: &mut [RuntimePlugin],
        origin: &PluginId,
    ) -> PropagationReport {
        let mut report = PropagationReport::default();
        let mut expanded = HashSet::from([origin.clone()]);
        let mut queue = VecDeque::from([origin.clone()]);

        while let Some(provider) = queue.pop_front() {
            for consumer_id in self.graph.dependents_of(&provider) {
                let Some(position) = self.position(plugins, consumer_id) else {
                    warn!(
                        plugin_id = %consumer_id,
                        provider = %provider,
                        "Dependent missing from batch, leaving subtree as is"
                    );
                    report.skipped.push(consumer_id.clone());
                    continue;
                };

                if !plugins[position].status.is_active() {
                    trace!(plugin_id = %consumer_id, "Dependent not active, not traversed");
                    continue;
                }
                let Some(reason) = self.requirement_gap(plugins, &plugins[position]) else {
                    trace!(plugin_id = %consumer_id, "Dependent still satisfied");
                    continue;
                };

                let consumer = &mut plugins[position];
                if consumer.enabled_by_user {
                    debug!(plugin_id = %consumer_id, reason = %reason, "Pausing dependent");
                    consumer.set_status(PluginStatus::PausedDependency, Some(reason));
                } else {
                    consumer.set_status(PluginStatus::Disabled, None);
                }
                report.changed.push(consumer_id.clone());

                if expanded.insert(consumer_id.clone()) {
                    queue.push_back(consumer_id.clone());
                }
            }
        }

        report
    }

    /// Reactivate paused dependents whose requirements are met again.
    ///
    /// `origin` is assumed to have just become `Active`. Only
    /// `PausedDependency` consumers are considered; `Error` and `Disabled`
    /// plugins are never touched. A consumer that stays paused has its reason
    /// refreshed.
    pub fn propagate_recovery(
        &self,
        plugins: &mut [RuntimePlugin],
        origin: &PluginId,
    ) -> PropagationReport {
        let mut report = PropagationReport::default();
        let mut expanded = HashSet::from([origin.clone()]);
        let mut queue = VecDeque::from([origin.clone()]);

        while let Some(provider) = queue.pop_front() {
            for consumer_id in self.graph.dependents_of(&provider) {
                let Some(position) = self.position(plugins, consumer_id) else {
                    warn!(
                        plugin_id = %consumer_id,
                        provider = %provider,
                        "Dependent missing from batch, leaving subtree as is"
                    );
                    report.skipped.push(consumer_id.clone());
                    continue;
                };

                if plugins[position].status != PluginStatus::PausedDependency {
                    continue;
                }

                match self.requirement_gap(plugins, &plugins[position]) {
                    None => {
                        debug!(plugin_id = %consumer_id, "Reactivating dependent");
                        plugins[position].set_status(PluginStatus::Active, None);
                        report.changed.push(consumer_id.clone());
                        if expanded.insert(consumer_id.clone()) {
                            queue.push_back(consumer_id.clone());
                        }
                    },
                    Some(reason) => {
                        if plugins[position].reason.as_ref() != Some(&reason) {
                            plugins[position]
                                .set_status(PluginStatus::PausedDependency, Some(reason));
                            report.changed.push(consumer_id.clone());
                        }
                    },
                }
            }
        }

        report
    }
}
