//! Mock implementations for testing.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use keystone_core::{ManualClock, PluginId, RegistrySnapshot};
use keystone_plugins::{InvocationError, PluginInvoker};

type Outcome = Result<serde_json::Value, InvocationError>;

/// Mock [`PluginInvoker`] that replays queued outcomes.
///
/// When the queue is empty the call succeeds and echoes its arguments. Every
/// call is logged, and a manual clock can be advanced per call to simulate
/// latency.
#[derive(Debug, Clone, Default)]
pub struct ScriptedInvoker {
    outcomes: Arc<Mutex<VecDeque<Outcome>>>,
    calls: Arc<Mutex<Vec<PluginId>>>,
    latency: Option<(Arc<ManualClock>, i64)>,
}

impl ScriptedInvoker {
    /// Create an invoker that always succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `count` failures.
    #[must_use]
    pub fn with_failures(self, count: usize, message: &str) -> Self {
        for _ in 0..count {
            self.queue(Err(InvocationError::new(message)));
        }
        self
    }

    /// Queue one successful result.
    #[must_use]
    pub fn with_success(self, value: serde_json::Value) -> Self {
        self.queue(Ok(value));
        self
    }

    /// Advance `clock` by `ms` during every call.
    #[must_use]
    pub fn with_latency(mut self, clock: Arc<ManualClock>, ms: i64) -> Self {
        self.latency = Some((clock, ms));
        self
    }

    /// Queue an outcome.
    pub fn queue(&self, outcome: Outcome) {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(outcome);
    }

    /// Plugins called so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<PluginId> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of calls made so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[async_trait]
impl PluginInvoker for ScriptedInvoker {
    async fn call(
        &self,
        plugin_id: &PluginId,
        args: serde_json::Value,
    ) -> Result<serde_json::Value, InvocationError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(plugin_id.clone());
        if let Some((clock, ms)) = &self.latency {
            clock.advance_ms(*ms);
        }
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(Ok(args))
    }
}

/// Collects every snapshot delivered to a registry subscriber.
#[derive(Debug, Clone, Default)]
pub struct SnapshotRecorder {
    snapshots: Arc<Mutex<Vec<RegistrySnapshot>>>,
}

impl SnapshotRecorder {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A callback to pass to `subscribe`.
    pub fn callback(&self) -> impl Fn(&RegistrySnapshot) + Send + Sync + 'static {
        let snapshots = Arc::clone(&self.snapshots);
        move |snapshot| {
            snapshots
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(snapshot.clone());
        }
    }

    /// Number of snapshots received.
    #[must_use]
    pub fn count(&self) -> usize {
        self.snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// The most recent snapshot.
    #[must_use]
    pub fn last(&self) -> Option<RegistrySnapshot> {
        self.snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    /// Generations received, in order.
    #[must_use]
    pub fn generations(&self) -> Vec<u64> {
        self.snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|s| s.generation)
            .collect()
    }
}
