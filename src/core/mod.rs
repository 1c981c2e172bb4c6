//! Pool core: admission, workers and lifecycle.
//!
//! The public API from this module is [`Pool`] (with [`PoolBuilder`]), its
//! configuration, and the identities that appear in events and errors.
//!
//! Internal modules:
//! - [`registry`]: ordered index of admitted tasks, finds the eviction candidate;
//! - [`admission`]: placement and eviction under the pool lock;
//! - [`pool`]: front door, event fan-out wiring, drain;
//! - [`worker`]: worker loop and per-assignment cancellation handle;
//! - [`runner`]: executes one attempt with timeout and panic isolation;
//! - [`shutdown`]: cross-platform termination signal handling.

mod admission;
mod config;
mod pool;
mod registry;
mod runner;
mod shutdown;
mod worker;

pub use config::PoolConfig;
pub use pool::{Pool, PoolBuilder, PoolState, PoolStats};
pub use registry::{AdmissionKey, Entry, Registry, TaskId};
pub use worker::{WorkerHandle, WorkerId};
