//! Prelude module - commonly used types for convenient import.
//!
//! Use `use keystone_events::prelude::*;` to import all essential types.

pub use crate::{EventBus, EventMetadata, EventReceiver, RuntimeEvent};

pub use crate::{EventSubscriber, FilterSubscriber, SubscriberRegistry, Subscription};
