//! Capability registry.
//!
//! Owns the authoritative list of plugins and publishes it as immutable
//! [`RegistrySnapshot`]s. Mutations are staged on a working copy obtained
//! from [`begin`](CapabilityRegistry::begin) and become visible all at once
//! through [`commit`](CapabilityRegistry::commit), which notifies subscribers
//! exactly once per changed batch.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use keystone_core::{Clock, PluginId, PluginManifest, RegistrySnapshot, RuntimePlugin};
use keystone_events::{EventBus, EventMetadata, FilterSubscriber, RuntimeEvent, Subscription};

use crate::error::{PluginError, PluginResult};

/// Event source name for registry events.
const EVENT_SOURCE: &str = "keystone.registry";

/// Registry of plugins in manifest registration order.
pub struct CapabilityRegistry {
    published: Arc<RegistrySnapshot>,
    index: HashMap<PluginId, usize>,
    events: EventBus,
    clock: Arc<dyn Clock>,
}

impl CapabilityRegistry {
    /// Create an empty registry publishing on `events`.
    #[must_use]
    pub fn new(events: EventBus, clock: Arc<dyn Clock>) -> Self {
        Self {
            published: Arc::new(RegistrySnapshot::default()),
            index: HashMap::new(),
            events,
            clock,
        }
    }

    /// Point-in-time copy of every plugin, in registration order.
    #[must_use]
    pub fn get_all(&self) -> Vec<RuntimePlugin> {
        self.published.plugins.clone()
    }

    /// The currently published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        Arc::clone(&self.published)
    }

    /// Get a published plugin by ID.
    #[must_use]
    pub fn get(&self, id: &PluginId) -> Option<&RuntimePlugin> {
        self.index.get(id).map(|&i| &self.published.plugins[i])
    }

    /// Position of a plugin in registration order.
    #[must_use]
    pub fn position(&self, id: &PluginId) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Whether a plugin with this ID is registered.
    #[must_use]
    pub fn contains(&self, id: &PluginId) -> bool {
        self.index.contains_key(id)
    }

    /// Number of registered plugins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.published.plugins.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.published.plugins.is_empty()
    }

    /// Check that a manifest may be registered.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Validation`] for a malformed manifest and
    /// [`PluginError::AlreadyRegistered`] for a duplicate ID.
    pub fn check_registration(&self, manifest: &PluginManifest) -> PluginResult<()> {
        manifest.validate()?;
        if self.contains(&manifest.id) {
            return Err(PluginError::AlreadyRegistered(manifest.id.clone()));
        }
        Ok(())
    }

    /// Start a batch: a mutable copy of the published plugin list.
    #[must_use]
    pub fn begin(&self) -> Vec<RuntimePlugin> {
        self.published.plugins.clone()
    }

    /// Publish a batch.
    ///
    /// If the batch differs from the published snapshot, a new snapshot with
    /// the next generation is installed and subscribers are notified once.
    /// An unchanged batch is dropped silently. Returns the new snapshot when
    /// one was published.
    pub fn commit(&mut self, plugins: Vec<RuntimePlugin>) -> Option<Arc<RegistrySnapshot>> {
        if plugins == self.published.plugins {
            debug!(generation = self.published.generation, "No-op batch, nothing published");
            return None;
        }

        if plugins.len() != self.index.len() {
            self.index = plugins
                .iter()
                .enumerate()
                .map(|(i, p)| (p.id().clone(), i))
                .collect();
        }

        let snapshot = Arc::new(RegistrySnapshot {
            generation: self.published.generation.saturating_add(1),
            plugins,
        });
        self.published = Arc::clone(&snapshot);

        debug!(
            generation = snapshot.generation,
            plugin_count = snapshot.plugins.len(),
            "Published registry snapshot"
        );
        self.events.publish(RuntimeEvent::SnapshotPublished {
            metadata: EventMetadata::at(EVENT_SOURCE, self.clock.now()),
            snapshot: (*snapshot).clone(),
        });

        Some(snapshot)
    }

    /// Announce a newly registered plugin on the event bus.
    pub(crate) fn announce_registration(&self, plugin_id: &PluginId) {
        info!(plugin_id = %plugin_id, "Registered plugin");
        self.events.publish(RuntimeEvent::PluginRegistered {
            metadata: EventMetadata::at(EVENT_SOURCE, self.clock.now()),
            plugin_id: plugin_id.clone(),
        });
    }

    /// Call `callback` with every snapshot published from now on.
    ///
    /// The callback runs synchronously after each completed batch, never in
    /// the middle of one.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&RegistrySnapshot) + Send + Sync + 'static,
    {
        let subscriber = FilterSubscriber::new("registry-snapshot", move |event| {
            if let Some(snapshot) = event.snapshot() {
                callback(snapshot);
            }
        })
        .with_filter(|event| event.snapshot().is_some());
        self.events.subscribe_sync(Arc::new(subscriber))
    }

    /// The event bus snapshots are published on.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }
}

impl std::fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("generation", &self.published.generation)
            .field("plugin_count", &self.published.plugins.len())
            .finish_non_exhaustive()
    }
}
