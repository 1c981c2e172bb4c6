//! # evictpool
//!
//! **evictpool** is a bounded async worker pool with a preemptive admission
//! policy: when every worker is busy and the queue is full, a new submission
//! is admitted by cancelling the **oldest admitted** task and re-admitting
//! that task's payload later.
//!
//! Cancellation is cooperative. Every job receives a
//! [`CancellationToken`](tokio_util::sync::CancellationToken) and is expected
//! to return [`JobError::Canceled`] once it observes it.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │   JobSpec    │   │   JobSpec    │   │   JobSpec    │
//!     │ (+ timeout,  │   │              │   │              │
//!     │   fallback)  │   │              │   │              │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼ submit()         ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Pool                                                             │
//! │  - admission (placement: core → queue → max → evict oldest)       │
//! │  - Registry (admitted tasks ordered by (timestamp, sequence))     │
//! │  - bounded queue + per-worker handoffs                            │
//! │  - Bus (broadcast events) → SubscriberSet                         │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │   worker w1  │   │   worker w2  │   │   worker wN  │
//!     │  run_once()  │   │  run_once()  │   │  run_once()  │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//!      JobHandle resolves exactly once: Ok(v) | Cancelled | Failed(e)
//! ```
//!
//! ### Eviction
//! ```text
//! submit(t4) on a saturated pool holding t1 < t2 < t3 (admission order):
//!   registry.pop_oldest() → t1
//!     ├─ t1 running → cancel t1's WorkerHandle; t4 is handed to that worker
//!     └─ t1 queued  → t1 leaves the queue; t4 takes its place
//!   t1's payload is re-admitted (fresh TaskId); if the pool is still
//!   saturated it waits for a free worker instead of evicting again
//!   (the oldest waiting payload is cancelled once `deferred_capacity` is hit);
//!   t1's JobHandle resolves when the re-admitted instance finishes.
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                      |
//! |-------------------|---------------------------------------------------------------|-----------------------------------------|
//! | **Pool**          | Submit work, observe counters, drain on shutdown.             | [`Pool`], [`PoolBuilder`], [`PoolStats`]|
//! | **Jobs**          | Define jobs as closures, decorate with timeout and fallback.  | [`Job`], [`JobFn`], [`JobSpec`]         |
//! | **Results**       | Await outcomes or receive them through a callback.            | [`JobHandle`], [`PoolError`]            |
//! | **Registry**      | Ordered index of admitted tasks.                              | [`Registry`], [`AdmissionKey`]          |
//! | **Subscriber API**| Hook into lifecycle events (logging, metrics, custom).        | [`Subscribe`], [`Event`]                |
//! | **Configuration** | Construction-time sizing and defaults.                        | [`PoolConfig`]                          |
//!
//! ## Optional features
//! - `logging`: exports a built-in [`LogWriter`] that renders events through `tracing`.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use evictpool::{JobError, JobFn, JobRef, JobSpec, Pool, PoolConfig};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut cfg = PoolConfig::fixed(2, 0);
//!     cfg.timeout = Duration::from_millis(500);
//!
//!     #[cfg(feature = "logging")]
//!     let subs: Vec<Arc<dyn evictpool::Subscribe>> = vec![Arc::new(evictpool::LogWriter)];
//!     #[cfg(not(feature = "logging"))]
//!     let subs: Vec<Arc<dyn evictpool::Subscribe>> = Vec::new();
//!
//!     let pool: Pool<String> = Pool::builder(cfg.clone()).with_subscribers(subs).build();
//!
//!     let job: JobRef<String> = JobFn::arc("greet", |ctx: CancellationToken| async move {
//!         if ctx.is_cancelled() {
//!             return Err(JobError::Canceled);
//!         }
//!         Ok("hello".to_string())
//!     });
//!
//!     let spec = JobSpec::with_defaults(job, &cfg).with_fallback(|| "FALLBACK!".to_string());
//!     assert_eq!(pool.submit(spec).await?, "hello");
//!
//!     pool.shutdown(Duration::from_secs(1)).await?;
//!     Ok(())
//! }
//! ```

mod core;
mod error;
mod events;
mod jobs;
mod subscribers;

// ---- Public re-exports ----

pub use core::{
    AdmissionKey, Entry, Pool, PoolBuilder, PoolConfig, PoolState, PoolStats, Registry, TaskId,
    WorkerHandle, WorkerId,
};
pub use error::{JobError, PoolError, RegistryError, RuntimeError};
pub use events::{Bus, Event, EventKind};
pub use jobs::{BoxJobFuture, Fallback, Job, JobFn, JobHandle, JobRef, JobSpec};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose a simple built-in tracing subscriber.
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
