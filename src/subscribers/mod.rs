//! # Event subscribers.
//!
//! This module provides the [`Subscribe`] trait and the [`SubscriberSet`] used by
//! the pool to fan events out to user code.
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   worker ── publish(Event) ──► Bus ──► pool listener ──► SubscriberSet
//!                                                              │
//!                                               ┌──────────────┼──────────┐
//!                                               ▼              ▼          ▼
//!                                           LogWriter       Metrics     Custom
//! ```

#[cfg(feature = "logging")]
mod log;
mod subscriber;
mod subscriber_set;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use subscriber::Subscribe;
pub use subscriber_set::SubscriberSet;

pub(crate) use subscriber_set::panic_message;
