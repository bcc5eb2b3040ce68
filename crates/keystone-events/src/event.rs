//! Event types for the Keystone event bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use keystone_core::{BreakerState, PluginId, RegistrySnapshot};

/// Metadata attached to every event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// When the event was created.
    pub timestamp: DateTime<Utc>,
    /// Source component that generated the event.
    pub source: String,
}

impl EventMetadata {
    /// Create new event metadata stamped with the wall clock.
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self::at(source, Utc::now())
    }

    /// Create new event metadata stamped with an explicit time.
    ///
    /// The runtime stamps events from its injectable clock so that event
    /// timestamps line up with breaker bookkeeping.
    #[must_use]
    pub fn at(source: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp,
            source: source.into(),
        }
    }
}

impl Default for EventMetadata {
    fn default() -> Self {
        Self::new("unknown")
    }
}

/// All events emitted by the Keystone runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuntimeEvent {
    /// A manifest was accepted into the registry.
    PluginRegistered {
        /// Event metadata.
        metadata: EventMetadata,
        /// The new plugin.
        plugin_id: PluginId,
    },

    /// A mutation completed and a new registry snapshot is live.
    SnapshotPublished {
        /// Event metadata.
        metadata: EventMetadata,
        /// The snapshot that was published.
        snapshot: RegistrySnapshot,
    },

    /// A circuit breaker changed state.
    BreakerStateChanged {
        /// Event metadata.
        metadata: EventMetadata,
        /// The guarded plugin.
        plugin_id: PluginId,
        /// Previous state.
        from: BreakerState,
        /// New state.
        to: BreakerState,
    },
}

impl RuntimeEvent {
    /// Short, stable name of the event variant.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::PluginRegistered { .. } => "plugin_registered",
            Self::SnapshotPublished { .. } => "snapshot_published",
            Self::BreakerStateChanged { .. } => "breaker_state_changed",
        }
    }

    /// Metadata of the event.
    #[must_use]
    pub fn metadata(&self) -> &EventMetadata {
        match self {
            Self::PluginRegistered { metadata, .. }
            | Self::SnapshotPublished { metadata, .. }
            | Self::BreakerStateChanged { metadata, .. } => metadata,
        }
    }

    /// The published snapshot, if this is a `SnapshotPublished` event.
    #[must_use]
    pub fn snapshot(&self) -> Option<&RegistrySnapshot> {
        match self {
            Self::SnapshotPublished { snapshot, .. } => Some(snapshot),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_names() {
        let event = RuntimeEvent::BreakerStateChanged {
            metadata: EventMetadata::new("test"),
            plugin_id: PluginId::from_static("stt.engine"),
            from: BreakerState::Closed,
            to: BreakerState::Open,
        };
        assert_eq!(event.event_type(), "breaker_state_changed");
        assert!(event.snapshot().is_none());
        assert_eq!(event.metadata().source, "test");
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = RuntimeEvent::SnapshotPublished {
            metadata: EventMetadata::new("registry"),
            snapshot: RegistrySnapshot::default(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "snapshot_published");
        assert_eq!(json["snapshot"]["generation"], 0);
    }
}
