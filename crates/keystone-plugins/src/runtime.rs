//! The plugin runtime facade.
//!
//! [`PluginRuntime`] owns the registry, the current dependency graph and the
//! breaker manager, and runs every mutation as one batch: take a working copy
//! of the plugin list, rebuild and propagate on it, then publish it with a
//! single commit. Observers never see a half-propagated snapshot.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use keystone_core::{
    BreakerState, BreakerStatus, Clock, GraphData, PluginId, PluginManifest, PluginStatus,
    RegistrySnapshot, RuntimePlugin, StatusReason, SystemClock,
};
use keystone_events::{EventBus, EventMetadata, RuntimeEvent, Subscription};

use crate::breaker::{Admission, BreakerConfig, BreakerManager};
use crate::error::{GuardError, PluginError, PluginResult};
use crate::graph::DependencyGraph;
use crate::propagation::{FaultPropagator, PropagationReport};
use crate::registry::CapabilityRegistry;

/// Event source name for breaker events.
const BREAKER_EVENT_SOURCE: &str = "keystone.breaker";

/// A runtime shared between the owner and one or more execution guards.
pub type SharedRuntime = Arc<tokio::sync::Mutex<PluginRuntime>>;

/// Plugin and breaker counts at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeHealth {
    /// Registered plugins.
    pub plugins: usize,
    /// Plugins in `Active`.
    pub active: usize,
    /// Plugins in `Disabled`.
    pub disabled: usize,
    /// Plugins in `PausedDependency`.
    pub paused: usize,
    /// Plugins in `Error`.
    pub error: usize,
    /// Breakers in `Closed`.
    pub breakers_closed: usize,
    /// Breakers in `Open`.
    pub breakers_open: usize,
    /// Breakers in `HalfOpen`.
    pub breakers_half_open: usize,
}

impl RuntimeHealth {
    /// Whether every plugin the user enabled is active and no breaker is
    /// tripped.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.paused == 0
            && self.error == 0
            && self.breakers_open == 0
            && self.breakers_half_open == 0
    }
}

/// Dependency and fault management for a set of plugins.
pub struct PluginRuntime {
    registry: CapabilityRegistry,
    graph: DependencyGraph,
    breakers: BreakerManager,
    clock: Arc<dyn Clock>,
}

impl PluginRuntime {
    /// Create an empty runtime on the system clock.
    #[must_use]
    pub fn new(config: BreakerConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create an empty runtime on the given clock.
    #[must_use]
    pub fn with_clock(config: BreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            registry: CapabilityRegistry::new(EventBus::new(), Arc::clone(&clock)),
            graph: DependencyGraph::empty(),
            breakers: BreakerManager::new(config, Arc::clone(&clock)),
            clock,
        }
    }

    /// Create a runtime and register `manifests` in one batch.
    ///
    /// Manifests that fail validation are skipped and returned alongside the
    /// runtime; the rest are registered.
    pub fn boot(
        config: BreakerConfig,
        clock: Arc<dyn Clock>,
        manifests: impl IntoIterator<Item = PluginManifest>,
    ) -> (Self, Vec<PluginError>) {
        let mut runtime = Self::with_clock(config, clock);
        let errors = runtime.register_all(manifests);
        info!(
            plugin_count = runtime.registry.len(),
            rejected = errors.len(),
            "Plugin runtime booted"
        );
        (runtime, errors)
    }

    /// Register one manifest.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Validation`] for a malformed manifest and
    /// [`PluginError::AlreadyRegistered`] for a duplicate ID.
    pub fn register(&mut self, manifest: PluginManifest) -> PluginResult<()> {
        match self.register_all([manifest]).pop() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Register several manifests and publish one snapshot for all of them.
    ///
    /// Returns the errors for manifests that were rejected.
    pub fn register_all(
        &mut self,
        manifests: impl IntoIterator<Item = PluginManifest>,
    ) -> Vec<PluginError> {
        let mut batch = self.registry.begin();
        let mut errors = Vec::new();
        let mut added = Vec::new();

        for manifest in manifests {
            let checked = self.registry.check_registration(&manifest).and_then(|()| {
                if added.contains(&manifest.id) {
                    Err(PluginError::AlreadyRegistered(manifest.id.clone()))
                } else {
                    Ok(())
                }
            });
            if let Err(e) = checked {
                warn!(plugin_id = %manifest.id, error = %e, "Rejected plugin manifest");
                errors.push(e);
                continue;
            }
            added.push(manifest.id.clone());
            batch.push(RuntimePlugin::new(manifest));
        }

        if added.is_empty() {
            return errors;
        }

        let graph = match DependencyGraph::build(&batch) {
            Ok(graph) => graph,
            Err(e) => {
                error!(error = %e, "Registration batch produced a corrupt snapshot");
                errors.push(e);
                return errors;
            },
        };
        self.graph = graph;

        for id in &added {
            self.breakers.register(id.clone());
            self.registry.announce_registration(id);
        }

        self.settle(&mut batch);
        self.registry.commit(batch);
        errors
    }

    /// Point-in-time copy of every plugin, in registration order.
    #[must_use]
    pub fn get_all(&self) -> Vec<RuntimePlugin> {
        self.registry.get_all()
    }

    /// The currently published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.registry.snapshot()
    }

    /// A published plugin by ID.
    #[must_use]
    pub fn get(&self, id: &PluginId) -> Option<&RuntimePlugin> {
        self.registry.get(id)
    }

    /// Nodes and edges of the current dependency graph.
    #[must_use]
    pub fn graph_data(&self) -> GraphData {
        self.graph.data().clone()
    }

    /// The current dependency graph.
    #[must_use]
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Rebuild the dependency graph from the published snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::CorruptSnapshot`] if the snapshot cannot be
    /// turned into a graph. The previous graph stays in place.
    pub fn rebuild(&mut self) -> PluginResult<&GraphData> {
        let snapshot = self.registry.snapshot();
        self.graph = DependencyGraph::build(&snapshot.plugins)?;
        Ok(self.graph.data())
    }

    /// Status of every breaker, in registration order.
    ///
    /// Open breakers whose cool-down has elapsed are reported `HalfOpen`.
    pub fn all_status(&mut self) -> Vec<BreakerStatus> {
        let statuses = self.breakers.all_status();
        self.apply_breaker_transitions();
        statuses
    }

    /// Status of one breaker.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::NotFound`] for an unknown plugin.
    pub fn breaker_status(&mut self, id: &PluginId) -> PluginResult<BreakerStatus> {
        let status = self.breakers.status(id)?;
        self.apply_breaker_transitions();
        Ok(status)
    }

    /// The breaker configuration.
    #[must_use]
    pub fn breaker_config(&self) -> &BreakerConfig {
        self.breakers.config()
    }

    /// Call `callback` with every snapshot published from now on.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&RegistrySnapshot) + Send + Sync + 'static,
    {
        self.registry.subscribe(callback)
    }

    /// The event bus snapshots and breaker changes are published on.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        self.registry.events()
    }

    /// The clock breakers are evaluated against.
    #[must_use]
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Flip a plugin's user intent and cascade the result.
    ///
    /// Returns the new value of `enabled_by_user`.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::NotFound`] for an unknown plugin.
    pub fn toggle_plugin(&mut self, id: &PluginId) -> PluginResult<bool> {
        let position = self
            .registry
            .position(id)
            .ok_or_else(|| PluginError::NotFound(id.clone()))?;
        let mut batch = self.registry.begin();

        let enabled = !batch[position].enabled_by_user;
        batch[position].enabled_by_user = enabled;
        info!(plugin_id = %id, enabled, "Toggled plugin");

        self.rebuild_batch(&batch);

        let was_active = batch[position].status.is_active();
        let propagator = FaultPropagator::new(&self.graph, &batch);
        let (status, reason) = self.evaluate(&propagator, &batch, position);
        batch[position].set_status(status, reason);

        let report = match (was_active, status.is_active()) {
            (true, false) => propagator.propagate_failure(&mut batch, id),
            (false, true) => propagator.propagate_recovery(&mut batch, id),
            _ => PropagationReport::default(),
        };
        debug!(plugin_id = %id, status = %status, changed = report.changed.len(), "Toggle propagated");

        self.registry.commit(batch);
        Ok(enabled)
    }

    /// Record a failure as if a call had failed. Trips follow the same rules
    /// as organic failures, including propagation.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::NotFound`] for an unknown plugin.
    pub fn simulate_failure(&mut self, id: &PluginId) -> PluginResult<BreakerStatus> {
        info!(plugin_id = %id, "Simulating plugin failure");
        self.record_failure(id, None)
    }

    /// Record a successful call.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::NotFound`] for an unknown plugin.
    pub fn record_success(&mut self, id: &PluginId, latency_ms: u64) -> PluginResult<BreakerStatus> {
        let status = self.breakers.record_success(id, latency_ms)?;
        self.apply_breaker_transitions();
        Ok(status)
    }

    /// Record a failed call.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::NotFound`] for an unknown plugin.
    pub fn record_failure(
        &mut self,
        id: &PluginId,
        latency_ms: Option<u64>,
    ) -> PluginResult<BreakerStatus> {
        let status = self.breakers.record_failure(id, latency_ms)?;
        self.apply_breaker_transitions();
        Ok(status)
    }

    /// Force a plugin's breaker closed and bring the plugin back if it can be.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::NotFound`] for an unknown plugin.
    pub fn reset_breaker(&mut self, id: &PluginId) -> PluginResult<BreakerStatus> {
        let status = self.breakers.reset(id)?;
        self.apply_breaker_transitions();
        Ok(status)
    }

    /// Pause dependents of a plugin that has just left `Active`.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::NotFound`] for an unknown plugin.
    pub fn propagate_failure(&mut self, id: &PluginId) -> PluginResult<PropagationReport> {
        self.propagate(id, |propagator, batch| propagator.propagate_failure(batch, id))
    }

    /// Reactivate dependents of a plugin that has just become `Active`.
    ///
    /// Calling this twice in a row changes nothing the second time and
    /// publishes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::NotFound`] for an unknown plugin.
    pub fn propagate_recovery(&mut self, id: &PluginId) -> PluginResult<PropagationReport> {
        self.propagate(id, |propagator, batch| propagator.propagate_recovery(batch, id))
    }

    /// Counts per plugin status and breaker state.
    pub fn health(&mut self) -> RuntimeHealth {
        let breakers = self.all_status();
        let mut health = RuntimeHealth::default();

        for plugin in &self.registry.snapshot().plugins {
            health.plugins = health.plugins.saturating_add(1);
            let slot = match plugin.status {
                PluginStatus::Active => &mut health.active,
                PluginStatus::Disabled => &mut health.disabled,
                PluginStatus::PausedDependency => &mut health.paused,
                PluginStatus::Error => &mut health.error,
            };
            *slot = slot.saturating_add(1);
        }
        for breaker in &breakers {
            let slot = match breaker.state {
                BreakerState::Closed => &mut health.breakers_closed,
                BreakerState::Open => &mut health.breakers_open,
                BreakerState::HalfOpen => &mut health.breakers_half_open,
            };
            *slot = slot.saturating_add(1);
        }
        health
    }

    /// Wrap the runtime for sharing with execution guards.
    #[must_use]
    pub fn into_shared(self) -> SharedRuntime {
        Arc::new(tokio::sync::Mutex::new(self))
    }

    /// Breaker check followed by the availability gate.
    pub(crate) fn admit(&mut self, id: &PluginId) -> Result<(), GuardError> {
        let admission = self
            .breakers
            .admit(id)
            .map_err(|_| GuardError::NotFound(id.clone()));
        self.apply_breaker_transitions();

        let state = match admission? {
            Admission::Rejected { retry_at } => {
                return Err(GuardError::BreakerOpen {
                    plugin_id: id.clone(),
                    retry_at,
                });
            },
            Admission::Allowed { state } => state,
        };

        let plugin = self
            .registry
            .get(id)
            .ok_or_else(|| GuardError::NotFound(id.clone()))?;
        if plugin.status.is_active() {
            return Ok(());
        }
        let trial = state == BreakerState::HalfOpen
            && plugin.enabled_by_user
            && plugin.reason == Some(StatusReason::BreakerOpen);
        if trial {
            // The breaker hides any unmet dependency while it is tripped.
            let snapshot = self.registry.snapshot();
            let propagator = FaultPropagator::new(&self.graph, &snapshot.plugins);
            return match propagator.requirement_gap(&snapshot.plugins, plugin) {
                None => Ok(()),
                Some(gap) => {
                    debug!(plugin_id = %id, reason = %gap, "Trial call refused, dependency unmet");
                    Err(GuardError::Unavailable {
                        plugin_id: id.clone(),
                        status: PluginStatus::PausedDependency,
                        reason: Some(gap),
                    })
                },
            };
        }
        Err(GuardError::Unavailable {
            plugin_id: id.clone(),
            status: plugin.status,
            reason: plugin.reason.clone(),
        })
    }

    fn propagate<F>(&mut self, id: &PluginId, pass: F) -> PluginResult<PropagationReport>
    where
        F: FnOnce(&FaultPropagator<'_>, &mut [RuntimePlugin]) -> PropagationReport,
    {
        if !self.registry.contains(id) {
            return Err(PluginError::NotFound(id.clone()));
        }
        let mut batch = self.registry.begin();
        let report = pass(&FaultPropagator::new(&self.graph, &batch), &mut batch);
        self.registry.commit(batch);
        Ok(report)
    }

    /// Rebuild from a batch, keeping the previous graph if it is corrupt.
    fn rebuild_batch(&mut self, batch: &[RuntimePlugin]) {
        match DependencyGraph::build(batch) {
            Ok(graph) => self.graph = graph,
            Err(e) => error!(error = %e, "Keeping previous dependency graph"),
        }
    }

    /// Status before dependencies are considered.
    fn base_status(&self, plugin: &RuntimePlugin) -> (PluginStatus, Option<StatusReason>) {
        if let Some(reason) = self.graph.cycle_reason(plugin.id()) {
            (PluginStatus::Error, Some(reason.clone()))
        } else if self.breakers.is_tripped(plugin.id()) {
            (PluginStatus::Error, Some(StatusReason::BreakerOpen))
        } else if !plugin.enabled_by_user {
            (PluginStatus::Disabled, None)
        } else {
            (PluginStatus::PausedDependency, None)
        }
    }

    /// Status of one plugin given the current state of its providers.
    fn evaluate(
        &self,
        propagator: &FaultPropagator<'_>,
        plugins: &[RuntimePlugin],
        position: usize,
    ) -> (PluginStatus, Option<StatusReason>) {
        let plugin = &plugins[position];
        match self.base_status(plugin) {
            (PluginStatus::PausedDependency, _) => match propagator.requirement_gap(plugins, plugin) {
                None => (PluginStatus::Active, None),
                gap => (PluginStatus::PausedDependency, gap),
            },
            other => other,
        }
    }

    /// Recompute every status from scratch.
    fn settle(&self, plugins: &mut [RuntimePlugin]) {
        for plugin in plugins.iter_mut() {
            let (status, reason) = self.base_status(plugin);
            plugin.set_status(status, reason);
        }

        let propagator = FaultPropagator::new(&self.graph, plugins);
        for position in 0..plugins.len() {
            if plugins[position].status != PluginStatus::PausedDependency
                || propagator.requirement_gap(plugins, &plugins[position]).is_some()
            {
                continue;
            }
            plugins[position].set_status(PluginStatus::Active, None);
            let id = plugins[position].id().clone();
            propagator.propagate_recovery(plugins, &id);
        }

        for position in 0..plugins.len() {
            if plugins[position].status == PluginStatus::PausedDependency {
                plugins[position].reason = propagator.requirement_gap(plugins, &plugins[position]);
            }
        }
    }

    /// Publish queued breaker changes and apply them to plugin status.
    fn apply_breaker_transitions(&mut self) {
        let transitions = self.breakers.drain_transitions();
        if transitions.is_empty() {
            return;
        }

        let mut batch = self.registry.begin();
        let propagator = FaultPropagator::new(&self.graph, &batch);

        for transition in &transitions {
            let id = &transition.plugin_id;
            self.registry.events().publish(RuntimeEvent::BreakerStateChanged {
                metadata: EventMetadata::at(BREAKER_EVENT_SOURCE, transition.at),
                plugin_id: id.clone(),
                from: transition.from,
                to: transition.to,
            });

            let Some(position) = self.registry.position(id) else {
                continue;
            };

            match transition.to {
                BreakerState::Open => {
                    let plugin = &batch[position];
                    if self.graph.is_cyclic(id) || plugin.reason == Some(StatusReason::BreakerOpen) {
                        continue;
                    }
                    let was_active = plugin.status.is_active();
                    batch[position].set_status(PluginStatus::Error, Some(StatusReason::BreakerOpen));
                    info!(plugin_id = %id, "Plugin marked ERROR, circuit breaker open");
                    if was_active {
                        let report = propagator.propagate_failure(&mut batch, id);
                        debug!(plugin_id = %id, changed = report.changed.len(), "Breaker trip propagated");
                    }
                },
                BreakerState::Closed => {
                    if batch[position].reason != Some(StatusReason::BreakerOpen) {
                        continue;
                    }
                    let (status, reason) = self.evaluate(&propagator, &batch, position);
                    batch[position].set_status(status, reason);
                    info!(plugin_id = %id, status = %status, "Circuit breaker closed");
                    if status.is_active() {
                        let report = propagator.propagate_recovery(&mut batch, id);
                        debug!(plugin_id = %id, changed = report.changed.len(), "Breaker recovery propagated");
                    }
                },
                // Stays ERROR until the trial call resolves.
                BreakerState::HalfOpen => {},
            }
        }

        self.registry.commit(batch);
    }
}

impl std::fmt::Debug for PluginRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRuntime")
            .field("registry", &self.registry)
            .field("breakers", &self.breakers)
            .finish_non_exhaustive()
    }
}
