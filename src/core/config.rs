//! # Pool configuration.
//!
//! Provides [`PoolConfig`], the settings accepted at pool construction.
//!
//! Config is used in two ways:
//! 1. **Pool creation**: `Pool::builder(config)` / `Pool::new(config)`
//! 2. **JobSpec defaults**: `JobSpec::with_defaults(job, &config)`
//!
//! ## Sentinel values
//! - `queue_capacity = 0` → no buffering; work is only handed directly to an idle worker
//! - `deferred_capacity = 0` → `queue_capacity + max_workers` evicted payloads may wait
//! - `timeout = 0s` → no per-attempt timeout
//! - `core_workers > max_workers` → maximum is raised to the core size (logged)

use std::time::Duration;

use tracing::warn;

/// Construction-time configuration of a [`Pool`](crate::Pool).
///
/// ## Field semantics
/// - `core_workers`: workers kept alive while idle (started lazily, one per early submission)
/// - `max_workers`: hard cap on live workers; beyond core they retire after `keep_alive`
/// - `queue_capacity`: bounded FIFO in front of the workers
/// - `deferred_capacity`: evicted payloads waiting for a free worker (`0` = derived)
/// - `keep_alive`: idle time after which a worker above `core_workers` retires
/// - `drain_timeout`: default drain budget for [`Pool::shutdown_on_signal`](crate::Pool::shutdown_on_signal)
/// - `timeout`: default per-attempt timeout (`0s` = none)
/// - `bus_capacity`: event bus ring buffer size (min 1)
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Number of workers that never retire for idleness.
    pub core_workers: usize,

    /// Maximum number of live workers.
    ///
    /// Saturation means `max_workers` busy workers **and** a full queue.
    pub max_workers: usize,

    /// Capacity of the admission queue.
    pub queue_capacity: usize,

    /// Evicted payloads that may wait for a free worker.
    ///
    /// Past this the oldest waiting payload resolves `Cancelled`.
    pub deferred_capacity: usize,

    /// Idle time before a non-core worker retires.
    pub keep_alive: Duration,

    /// Drain budget used by `shutdown_on_signal`.
    pub drain_timeout: Duration,

    /// Default per-attempt timeout.
    ///
    /// Used by `JobSpec::with_defaults()`. Can be overridden per job.
    pub timeout: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    pub bus_capacity: usize,
}

impl PoolConfig {
    /// Returns a config with `core_workers == max_workers == workers` and the given queue.
    pub fn fixed(workers: usize, queue_capacity: usize) -> Self {
        Self {
            core_workers: workers,
            max_workers: workers,
            queue_capacity,
            ..Self::default()
        }
    }

    /// Returns the core size, at least 1 when the maximum is zero too.
    #[inline]
    pub fn effective_core(&self) -> usize {
        if self.core_workers == 0 && self.max_workers == 0 {
            1
        } else {
            self.core_workers
        }
    }

    /// Returns the worker cap, never below the core size and never zero.
    #[inline]
    pub fn effective_max(&self) -> usize {
        self.max_workers.max(self.effective_core()).max(1)
    }

    /// Returns the deferred capacity; `0` derives it from the queue and worker cap.
    #[inline]
    pub fn effective_deferred(&self) -> usize {
        if self.deferred_capacity == 0 {
            self.queue_capacity + self.effective_max()
        } else {
            self.deferred_capacity
        }
    }

    /// Returns the default per-attempt timeout as an `Option`.
    #[inline]
    pub fn default_timeout(&self) -> Option<Duration> {
        if self.timeout == Duration::ZERO {
            None
        } else {
            Some(self.timeout)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Logs settings that get adjusted at construction.
    pub(crate) fn report_adjustments(&self) {
        if self.core_workers > self.max_workers {
            warn!(
                core_workers = self.core_workers,
                max_workers = self.max_workers,
                "max_workers is below core_workers; raising maximum to the core size"
            );
        }
        if self.core_workers == 0 && self.max_workers == 0 {
            warn!("pool configured with zero workers; using one");
        }
    }
}

impl Default for PoolConfig {
    /// Default configuration:
    ///
    /// - `core_workers = 10`, `max_workers = 10`
    /// - `queue_capacity = 0` (direct hand-off)
    /// - `deferred_capacity = 0` (`queue_capacity + max_workers`)
    /// - `keep_alive = 60s`, `drain_timeout = 60s`
    /// - `timeout = 0s` (no timeout)
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            core_workers: 10,
            max_workers: 10,
            queue_capacity: 0,
            deferred_capacity: 0,
            keep_alive: Duration::from_secs(60),
            drain_timeout: Duration::from_secs(60),
            timeout: Duration::ZERO,
            bus_capacity: 1024,
        }
    }
}
