//! Helpers shared by the unit tests in this crate.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use keystone_core::{CapabilityName, PluginId, PluginManifest, RegistrySnapshot, RuntimePlugin};

use crate::breaker::BreakerConfig;

pub(crate) fn id(s: &str) -> PluginId {
    PluginId::new(s).unwrap()
}

pub(crate) fn manifest(id: &str, provides: &[&str], requires: &[&str]) -> PluginManifest {
    let mut manifest = PluginManifest::new(PluginId::new(id).unwrap(), id);
    manifest.provides = provides.iter().map(|c| CapabilityName::new(*c).unwrap()).collect();
    manifest.requires = requires.iter().map(|c| CapabilityName::new(*c).unwrap()).collect();
    manifest
}

pub(crate) fn plugin(id: &str, provides: &[&str], requires: &[&str]) -> RuntimePlugin {
    RuntimePlugin::new(manifest(id, provides, requires))
}

/// Threshold 3, 5 s window, 30 s cool-down.
pub(crate) fn breaker_config() -> BreakerConfig {
    BreakerConfig {
        failure_threshold: 3,
        failure_window: Duration::from_millis(5000),
        cool_down: Duration::from_millis(30_000),
    }
}

/// Keeps every snapshot handed to a subscriber.
#[derive(Clone, Default)]
pub(crate) struct SnapshotRecorder(Arc<Mutex<Vec<RegistrySnapshot>>>);

impl SnapshotRecorder {
    pub(crate) fn callback(&self) -> impl Fn(&RegistrySnapshot) + Send + Sync + 'static {
        let seen = Arc::clone(&self.0);
        move |snapshot| {
            seen.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(snapshot.clone());
        }
    }

    pub(crate) fn count(&self) -> usize {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub(crate) fn last(&self) -> Option<RegistrySnapshot> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }
}
