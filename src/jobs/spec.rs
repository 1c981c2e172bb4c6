//! # Job specification.
//!
//! Defines [`JobSpec`], the payload handed to [`Pool::submit`](crate::Pool::submit):
//! the job itself plus the timeout/fallback decoration applied to every attempt.
//!
//! A spec can be created:
//! - **Explicitly** with [`JobSpec::new`] and the `with_*` setters
//! - **From config** with [`JobSpec::with_defaults`] (inherit the default timeout)
//!
//! ## Rules
//! - The timeout applies **per attempt**: a re-admitted job gets a fresh budget.
//! - The fallback replaces a *failure* (error, timeout, panic). Cancellation is
//!   never replaced by the fallback.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::{core::PoolConfig, jobs::JobRef};

/// Produces the static fallback value.
pub type Fallback<T> = Arc<dyn Fn() -> T + Send + Sync>;

/// Specification for running a job in the pool.
///
/// ## Example
/// ```rust
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
/// use evictpool::{JobError, JobFn, JobRef, JobSpec, PoolConfig};
///
/// let job: JobRef<String> = JobFn::arc("lookup", |_ctx: CancellationToken| async move {
///     Err::<String, _>(JobError::fail("backend down"))
/// });
///
/// let spec = JobSpec::new(job.clone())
///     .with_timeout(Some(Duration::from_millis(500)))
///     .with_fallback(|| "FALLBACK!".to_string());
/// assert_eq!(spec.timeout(), Some(Duration::from_millis(500)));
///
/// // `cfg.timeout = 0s` is treated as `None`.
/// let spec2 = JobSpec::with_defaults(job, &PoolConfig::default());
/// assert!(spec2.timeout().is_none());
/// ```
pub struct JobSpec<T> {
    job: JobRef<T>,
    timeout: Option<Duration>,
    fallback: Option<Fallback<T>>,
}

impl<T: 'static> Clone for JobSpec<T> {
    fn clone(&self) -> Self {
        Self {
            job: Arc::clone(&self.job),
            timeout: self.timeout,
            fallback: self.fallback.clone(),
        }
    }
}

impl<T: 'static> fmt::Debug for JobSpec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobSpec")
            .field("name", &self.name())
            .field("timeout", &self.timeout)
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

impl<T: 'static> JobSpec<T> {
    /// Creates a spec with no timeout and no fallback.
    pub fn new(job: JobRef<T>) -> Self {
        Self {
            job,
            timeout: None,
            fallback: None,
        }
    }

    /// Creates a spec inheriting the default timeout from the pool config.
    ///
    /// Uses `PoolConfig::default_timeout()` so that `0s` in config is treated as `None`.
    pub fn with_defaults(job: JobRef<T>, cfg: &PoolConfig) -> Self {
        Self {
            job,
            timeout: cfg.default_timeout(),
            fallback: None,
        }
    }

    /// Returns reference to the job.
    pub fn job(&self) -> &JobRef<T> {
        &self.job
    }

    /// Convenience: returns the job name.
    pub fn name(&self) -> &str {
        self.job.name()
    }

    /// Returns the per-attempt timeout, if configured.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Returns true if a fallback is configured.
    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    /// Returns a new spec with updated timeout (`Some(0s)` means no timeout).
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout.filter(|d| *d > Duration::ZERO);
        self
    }

    /// Returns a new spec whose failures resolve to `fallback()` instead of an error.
    pub fn with_fallback(mut self, fallback: impl Fn() -> T + Send + Sync + 'static) -> Self {
        self.fallback = Some(Arc::new(fallback));
        self
    }

    /// Computes the fallback value, if one is configured.
    pub(crate) fn fallback_value(&self) -> Option<T> {
        self.fallback.as_ref().map(|f| f())
    }
}

impl<T: 'static> From<JobRef<T>> for JobSpec<T> {
    fn from(job: JobRef<T>) -> Self {
        JobSpec::new(job)
    }
}
