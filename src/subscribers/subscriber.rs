//! # Subscriber trait.
//!
//! [`Subscribe`] is how user code observes a pool: admissions, evictions,
//! attempts, worker churn and shutdown all arrive as [`Event`]s.
//!
//! A subscriber never runs on the admission path. The pool's listener hands
//! each event to a [`SubscriberSet`](crate::SubscriberSet), which queues it
//! for the subscriber's own worker task.
//!
//! ## Rules
//! - Delivery is FIFO per subscriber; nothing is ordered across subscribers.
//! - A full queue drops the event for that subscriber and publishes
//!   `EventKind::SubscriberOverflow`.
//! - A panic in `on_event` is caught and published as `EventKind::SubscriberPanicked`.
//! - Kinds rejected by [`Subscribe::accepts`] are never queued.
//!
//! ## Example
//! ```rust
//! use std::sync::atomic::{AtomicU64, Ordering};
//! use async_trait::async_trait;
//! use evictpool::{Event, EventKind, Subscribe};
//!
//! #[derive(Default)]
//! struct EvictionCounter(AtomicU64);
//!
//! #[async_trait]
//! impl Subscribe for EvictionCounter {
//!     async fn on_event(&self, _ev: &Event) {
//!         self.0.fetch_add(1, Ordering::Relaxed);
//!     }
//!
//!     fn name(&self) -> &'static str { "eviction_counter" }
//!
//!     fn accepts(&self, kind: EventKind) -> bool {
//!         kind == EventKind::TaskEvicted
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};

/// Observer of pool events.
///
/// Implementations should stay non-blocking and keep their errors to themselves.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles one event on the subscriber's worker task.
    async fn on_event(&self, event: &Event);

    /// Name reported in overflow and panic events.
    ///
    /// Defaults to the type name.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Capacity of this subscriber's queue; values below 1 are raised to 1.
    fn queue_capacity(&self) -> usize {
        1024
    }

    /// Whether events of `kind` should be delivered at all.
    fn accepts(&self, kind: EventKind) -> bool {
        let _ = kind;
        true
    }
}
