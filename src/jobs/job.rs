//! # Job abstraction.
//!
//! This module defines the [`Job`] trait: a named, cancelable unit of work
//! that produces a value of type `T` or fails. The common handle type is
//! [`JobRef`], an `Arc<dyn Job<T>>` suitable for sharing across the pool.
//!
//! A job receives a [`CancellationToken`] and must check it at bounded
//! intervals; the pool never pre-empts a job, it only signals.

use std::{future::Future, pin::Pin, sync::Arc};

use tokio_util::sync::CancellationToken;

use crate::error::JobError;

/// Boxed future returned by [`Job::spawn`].
pub type BoxJobFuture<T> = Pin<Box<dyn Future<Output = Result<T, JobError>> + Send + 'static>>;

/// Shared handle to a job.
pub type JobRef<T> = Arc<dyn Job<T>>;

/// # Asynchronous, cancelable unit of work.
///
/// [`spawn`](Job::spawn) is called once per admission: an evicted job is
/// spawned again when it is re-admitted, so every call must produce a fresh future.
///
/// # Example
/// ```
/// use tokio_util::sync::CancellationToken;
/// use evictpool::{BoxJobFuture, Job, JobError};
///
/// struct Answer;
///
/// impl Job<u32> for Answer {
///     fn name(&self) -> &str { "answer" }
///
///     fn spawn(&self, ctx: CancellationToken) -> BoxJobFuture<u32> {
///         Box::pin(async move {
///             if ctx.is_cancelled() {
///                 return Err(JobError::Canceled);
///             }
///             Ok(42)
///         })
///     }
/// }
/// ```
pub trait Job<T>: Send + Sync + 'static {
    /// Returns a stable, human-readable job name.
    fn name(&self) -> &str;

    /// Creates a new future executing the job.
    ///
    /// Implementations should return `Err(JobError::Canceled)` promptly once
    /// `ctx` is cancelled.
    fn spawn(&self, ctx: CancellationToken) -> BoxJobFuture<T>;
}
