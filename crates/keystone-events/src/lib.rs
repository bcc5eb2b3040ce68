//! Keystone Events - Event bus for the Keystone plugin runtime.
//!
//! This crate provides:
//! - [`RuntimeEvent`]: registrations, published snapshots and breaker transitions
//! - [`EventBus`]: broadcast-based fan-out to async receivers
//! - [`SubscriberRegistry`]: synchronous, callback-based subscribers with
//!   [`Subscription`] handles for unsubscribing
//!
//! # Example
//!
//! ```rust
//! use keystone_core::RegistrySnapshot;
//! use keystone_events::{EventBus, EventMetadata, RuntimeEvent};
//!
//! # async fn example() {
//! let bus = EventBus::new();
//! let mut receiver = bus.subscribe();
//!
//! bus.publish(RuntimeEvent::SnapshotPublished {
//!     metadata: EventMetadata::new("registry"),
//!     snapshot: RegistrySnapshot::default(),
//! });
//!
//! let event = receiver.recv().await.unwrap();
//! assert_eq!(event.event_type(), "snapshot_published");
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod bus;
mod event;
mod subscriber;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, EventBus, EventReceiver};
pub use event::{EventMetadata, RuntimeEvent};
pub use subscriber::{
    EventFilter, EventSubscriber, FilterSubscriber, SubscriberId, SubscriberRegistry,
    Subscription,
};
