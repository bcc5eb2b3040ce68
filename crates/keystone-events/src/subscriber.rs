//! Synchronous event subscribers.

use std::sync::{Arc, PoisonError, RwLock, Weak};

use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::event::RuntimeEvent;

/// Filter function type for event subscribers.
pub type EventFilter = Box<dyn Fn(&RuntimeEvent) -> bool + Send + Sync>;

/// Trait for synchronous event subscribers.
///
/// Subscribers run on the publishing thread, after the mutation that caused
/// the event has completed. They should return quickly.
pub trait EventSubscriber: Send + Sync {
    /// Called when an event is published.
    fn on_event(&self, event: &RuntimeEvent);

    /// Return `true` to receive the event. Accepts everything by default.
    fn accepts(&self, event: &RuntimeEvent) -> bool {
        let _ = event;
        true
    }

    /// Optional name for debugging.
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "anonymous"
    }
}

/// Registration handle for a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

type Entry = (SubscriberId, Arc<dyn EventSubscriber>);

/// Registry of synchronous subscribers, notified in registration order.
#[derive(Default)]
pub struct SubscriberRegistry {
    subscribers: RwLock<Vec<Entry>>,
}

impl std::fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberRegistry")
            .field("subscriber_count", &self.len())
            .finish()
    }
}

impl SubscriberRegistry {
    /// Create a new subscriber registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Register a subscriber and return a handle that can remove it again.
    pub fn subscribe(self: &Arc<Self>, subscriber: Arc<dyn EventSubscriber>) -> Subscription {
        let id = self.register(subscriber);
        Subscription {
            id,
            registry: Arc::downgrade(self),
        }
    }

    /// Register a subscriber.
    pub fn register(&self, subscriber: Arc<dyn EventSubscriber>) -> SubscriberId {
        let id = SubscriberId::new();
        let name = subscriber.name().to_string();

        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, subscriber));

        debug!(subscriber_name = %name, "Subscriber registered");
        id
    }

    /// Unregister a subscriber.
    ///
    /// Returns `true` if the subscriber was found and removed.
    pub fn unregister(&self, id: SubscriberId) -> bool {
        let mut subs = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = subs.len();
        subs.retain(|(sid, _)| *sid != id);
        let removed = subs.len() != before;

        if removed {
            debug!("Subscriber unregistered");
        }
        removed
    }

    /// Notify all subscribers of an event.
    ///
    /// The subscriber list is copied before any callback runs, so a callback
    /// may unsubscribe itself (or others) without deadlocking. A panicking
    /// subscriber is logged and does not prevent the others from running.
    pub fn notify(&self, event: &RuntimeEvent) {
        let subs: Vec<Entry> = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for (id, subscriber) in subs {
            if !subscriber.accepts(event) {
                continue;
            }
            trace!(
                subscriber_name = %subscriber.name(),
                event_type = %event.event_type(),
                "Notifying subscriber"
            );

            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                subscriber.on_event(event);
            }));

            if let Err(e) = result {
                warn!(
                    subscriber_id = ?id,
                    subscriber_name = %subscriber.name(),
                    error = ?e,
                    "Subscriber panicked"
                );
            }
        }
    }

    /// Get the number of registered subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Check if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear all subscribers.
    pub fn clear(&self) {
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        debug!("All subscribers cleared");
    }
}

/// Handle returned by [`SubscriberRegistry::subscribe`].
///
/// Dropping the handle leaves the subscriber registered; call
/// [`unsubscribe`](Self::unsubscribe) to remove it.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    registry: Weak<SubscriberRegistry>,
}

impl Subscription {
    /// The subscriber's registration ID.
    #[must_use]
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Remove the subscriber.
    ///
    /// Returns `false` if it was already removed or the registry is gone.
    pub fn unsubscribe(self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.unregister(self.id))
    }
}

/// A closure-backed subscriber with an optional filter.
pub struct FilterSubscriber<F>
where
    F: Fn(&RuntimeEvent) + Send + Sync,
{
    name: String,
    filter: Option<EventFilter>,
    handler: F,
}

impl<F> FilterSubscriber<F>
where
    F: Fn(&RuntimeEvent) + Send + Sync,
{
    /// Create a new filter subscriber.
    pub fn new(name: impl Into<String>, handler: F) -> Self {
        Self {
            name: name.into(),
            filter: None,
            handler,
        }
    }

    /// Add a filter to this subscriber.
    #[must_use]
    pub fn with_filter<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&RuntimeEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }
}

impl<F> EventSubscriber for FilterSubscriber<F>
where
    F: Fn(&RuntimeEvent) + Send + Sync,
{
    fn on_event(&self, event: &RuntimeEvent) {
        (self.handler)(event);
    }

    fn accepts(&self, event: &RuntimeEvent) -> bool {
        match &self.filter {
            Some(f) => f(event),
            None => true,
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventMetadata;
    use keystone_core::{BreakerState, PluginId, RegistrySnapshot};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSubscriber {
        name: String,
        count: AtomicUsize,
    }

    impl CountingSubscriber {
        fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                count: AtomicUsize::new(0),
            }
        }

        fn count(&self) -> usize {
            self.count.load(Ordering::SeqCst)
        }
    }

    impl EventSubscriber for CountingSubscriber {
        fn on_event(&self, _event: &RuntimeEvent) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }

        fn name(&self) -> &str {
            &self.name
        }
    }

    fn snapshot_event() -> RuntimeEvent {
        RuntimeEvent::SnapshotPublished {
            metadata: EventMetadata::new("test"),
            snapshot: RegistrySnapshot::default(),
        }
    }

    fn breaker_event() -> RuntimeEvent {
        RuntimeEvent::BreakerStateChanged {
            metadata: EventMetadata::new("test"),
            plugin_id: PluginId::from_static("stt.engine"),
            from: BreakerState::Closed,
            to: BreakerState::Open,
        }
    }

    #[test]
    fn test_registry_register_unregister() {
        let registry = SubscriberRegistry::new();
        assert!(registry.is_empty());

        let id = registry.register(Arc::new(CountingSubscriber::new("test")));
        assert_eq!(registry.len(), 1);

        assert!(registry.unregister(id));
        assert!(registry.is_empty());
        assert!(!registry.unregister(id));
    }

    #[test]
    fn test_registry_notify() {
        let registry = SubscriberRegistry::new();
        let subscriber = Arc::new(CountingSubscriber::new("test"));
        registry.register(Arc::clone(&subscriber) as Arc<dyn EventSubscriber>);

        registry.notify(&snapshot_event());
        registry.notify(&snapshot_event());
        assert_eq!(subscriber.count(), 2);
    }

    #[test]
    fn test_notify_in_registration_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let registry = SubscriberRegistry::new();
        for name in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            registry.register(Arc::new(FilterSubscriber::new(name, move |_| {
                order.lock().unwrap().push(name);
            })));
        }

        registry.notify(&snapshot_event());
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_filter_subscriber() {
        let received = Arc::new(AtomicUsize::new(0));
        let received_clone = Arc::clone(&received);

        let subscriber = FilterSubscriber::new("snapshots_only", move |_event| {
            received_clone.fetch_add(1, Ordering::SeqCst);
        })
        .with_filter(|e| e.snapshot().is_some());

        let registry = SubscriberRegistry::new();
        registry.register(Arc::new(subscriber));

        registry.notify(&breaker_event());
        assert_eq!(received.load(Ordering::SeqCst), 0);

        registry.notify(&snapshot_event());
        assert_eq!(received.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_subscription_unsubscribe() {
        let registry = Arc::new(SubscriberRegistry::new());
        let subscriber = Arc::new(CountingSubscriber::new("test"));
        let subscription =
            registry.subscribe(Arc::clone(&subscriber) as Arc<dyn EventSubscriber>);

        registry.notify(&snapshot_event());
        assert!(subscription.unsubscribe());
        registry.notify(&snapshot_event());

        assert_eq!(subscriber.count(), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_subscription_outlives_registry() {
        let registry = Arc::new(SubscriberRegistry::new());
        let subscription = registry.subscribe(Arc::new(CountingSubscriber::new("test")));
        drop(registry);
        assert!(!subscription.unsubscribe());
    }

    #[test]
    fn test_panicking_subscriber_does_not_block_others() {
        let registry = SubscriberRegistry::new();
        registry.register(Arc::new(FilterSubscriber::new("boom", |_| {
            panic!("subscriber failure");
        })));
        let survivor = Arc::new(CountingSubscriber::new("survivor"));
        registry.register(Arc::clone(&survivor) as Arc<dyn EventSubscriber>);

        registry.notify(&snapshot_event());
        assert_eq!(survivor.count(), 1);
    }

    #[test]
    fn test_subscriber_can_unregister_itself_during_notify() {
        let registry = Arc::new(SubscriberRegistry::new());
        let slot: Arc<Mutex<Option<SubscriberId>>> = Arc::new(Mutex::new(None));

        let weak = Arc::downgrade(&registry);
        let slot_clone = Arc::clone(&slot);
        let id = registry.register(Arc::new(FilterSubscriber::new("once", move |_| {
            if let (Some(reg), Some(id)) = (weak.upgrade(), *slot_clone.lock().unwrap()) {
                reg.unregister(id);
            }
        })));
        *slot.lock().unwrap() = Some(id);

        registry.notify(&snapshot_event());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_registry_clear() {
        let registry = SubscriberRegistry::new();
        registry.register(Arc::new(CountingSubscriber::new("sub1")));
        registry.register(Arc::new(CountingSubscriber::new("sub2")));
        assert_eq!(registry.len(), 2);

        registry.clear();
        assert!(registry.is_empty());
    }
}
