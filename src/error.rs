//! Error types used by the pool runtime and by jobs.
//!
//! This module defines four enums:
//!
//! - [`JobError`]: what a job body returns when it does not produce a value.
//! - [`PoolError`]: what a [`JobHandle`](crate::JobHandle) resolves to when no value is produced.
//! - [`RuntimeError`]: errors raised by the pool itself (e.g. a drain that overran its timeout).
//! - [`RegistryError`]: registry misuse; internal invariant violations.
//!
//! All of them provide `as_label` for logs/metrics.

use std::time::Duration;
use thiserror::Error;

use crate::core::{TaskId, WorkerId};

/// # Errors produced by the pool runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Drain timeout was exceeded; remaining jobs were signalled to stop.
    #[error("drain timeout {grace:?} exceeded; stuck: {stuck:?}; forcing termination")]
    GraceExceeded {
        /// The drain timeout that was given to `shutdown`.
        grace: Duration,
        /// Names of the tasks still admitted when the timeout hit.
        stuck: Vec<String>,
    },

    /// Termination signal listeners could not be installed.
    #[error("failed to listen for termination signals: {source}")]
    Signal {
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use evictpool::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::Signal { .. } => "runtime_signal_setup",
        }
    }
}

/// # Errors produced by job execution.
///
/// A job body returns `Err(JobError::Canceled)` when it observes its
/// cancellation token; everything else is a failure of the body.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    /// The attempt exceeded its per-attempt timeout.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// The job body failed.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// The job body panicked; the worker survived.
    #[error("job panicked: {message}")]
    Panicked {
        /// Panic payload rendered as text.
        message: String,
    },

    /// The job observed cancellation and stopped.
    #[error("context cancelled")]
    Canceled,
}

impl JobError {
    /// Shorthand for [`JobError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        JobError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use evictpool::JobError;
    /// use std::time::Duration;
    ///
    /// let err = JobError::Timeout { timeout: Duration::from_secs(1) };
    /// assert_eq!(err.as_label(), "job_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            JobError::Timeout { .. } => "job_timeout",
            JobError::Fail { .. } => "job_failed",
            JobError::Panicked { .. } => "job_panicked",
            JobError::Canceled => "job_canceled",
        }
    }

    /// True for [`JobError::Canceled`].
    pub fn is_cancellation(&self) -> bool {
        matches!(self, JobError::Canceled)
    }
}

/// # Errors observed through a [`JobHandle`](crate::JobHandle).
///
/// Only policy violations and job-body failures are user visible;
/// registry races are resolved inside the pool.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// Submission after shutdown began. Never retried.
    #[error("pool is shutting down")]
    Shutdown,

    /// The task was cancelled and will not be re-admitted.
    ///
    /// Shutdown ends here, and so does an evicted payload shed from a full
    /// deferred list.
    #[error("task cancelled")]
    Cancelled,

    /// The job body failed; the error is propagated verbatim.
    #[error(transparent)]
    Failed(#[from] JobError),
}

impl PoolError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            PoolError::Shutdown => "pool_shutdown",
            PoolError::Cancelled => "task_cancelled",
            PoolError::Failed(e) => e.as_label(),
        }
    }
}

/// # Registry misuse.
///
/// Raised when the pool's bookkeeping is driven out of order. These are
/// programmer errors: the affected operation is aborted and logged.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    /// A task identity was recorded twice.
    #[error("task {0} already recorded")]
    DuplicateEntry(TaskId),

    /// A worker was attached to a task that was never recorded.
    #[error("task {0} is not recorded")]
    UnknownTask(TaskId),

    /// A task was handed to a worker that already holds one.
    #[error("worker {0} already holds a handoff")]
    HandoffTaken(WorkerId),
}

impl RegistryError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RegistryError::DuplicateEntry(_) => "registry_duplicate_entry",
            RegistryError::UnknownTask(_) => "registry_unknown_task",
            RegistryError::HandoffTaken(_) => "registry_handoff_taken",
        }
    }
}
