//! # Job abstractions and specifications.
//!
//! This module provides the payload boundary of the pool:
//! - [`Job`] - trait for implementing async cancelable jobs
//! - [`JobFn`] - function-backed job implementation
//! - [`JobRef`] - shared reference to a job (`Arc<dyn Job<T>>`)
//! - [`JobSpec`] - job bundled with its timeout/fallback decoration
//! - [`JobHandle`] - future resolving exactly once with the outcome

mod handle;
mod job;
mod job_fn;
mod spec;

pub use handle::JobHandle;
pub use job::{BoxJobFuture, Job, JobRef};
pub use job_fn::JobFn;
pub use spec::{Fallback, JobSpec};

pub(crate) use handle::{Resolver, callback, channel};
