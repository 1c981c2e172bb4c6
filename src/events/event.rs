//! # Runtime events emitted by the pool, its workers and the admission path.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Admission events**: a task entered the pool, was evicted, re-admitted or rejected
//! - **Execution events**: an attempt started and how it ended
//! - **Worker events**: workers spawned and retired
//! - **Shutdown events**: drain progress
//!
//! The [`Event`] struct carries metadata such as task name, identity, worker,
//! reasons and timeouts.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use evictpool::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::TaskFailed)
//!     .with_task("fetch")
//!     .with_reason("boom")
//!     .with_attempt(3)
//!     .with_timeout(Duration::from_secs(5));
//!
//! assert_eq!(ev.kind, EventKind::TaskFailed);
//! assert_eq!(ev.task.as_deref(), Some("fetch"));
//! assert_eq!(ev.reason.as_deref(), Some("boom"));
//! assert_eq!(ev.timeout_ms, Some(5_000));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::core::{TaskId, WorkerId};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets: `task` (subscriber name), `reason` (panic message).
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `task` (subscriber name), `reason` ("full" / "closed").
    SubscriberOverflow,

    // === Shutdown events ===
    /// `shutdown` was called; admission is closed.
    ShutdownRequested,

    /// Every worker exited within the drain timeout.
    AllDrainedWithin,

    /// Drain timeout exceeded; remaining jobs were signalled.
    ///
    /// Sets: `timeout_ms` (drain timeout), `reason` (stuck task names).
    GraceExceeded,

    // === Admission events ===
    /// A task instance was recorded in the registry (queued, handed off or running).
    ///
    /// Sets: `task`, `task_id`, `attempt` (admission count, 1-based).
    TaskAdmitted,

    /// The oldest admitted task was chosen to make room for a newcomer.
    ///
    /// Sets: `task`, `task_id`, `worker` (only if it was running).
    TaskEvicted,

    /// An evicted payload is being submitted again under a fresh identity.
    ///
    /// Sets: `task`, `task_id` (new identity), `attempt`, `reason`.
    TaskReadmitted,

    /// A submission was refused.
    ///
    /// Sets: `task`, `task_id`, `attempt`, `reason` (`pool_shutdown`).
    SubmitRejected,

    /// The registry refused an operation (programmer error).
    ///
    /// Sets: `task_id`, `reason`.
    RegistryViolation,

    // === Execution events ===
    /// A worker started executing a task instance.
    ///
    /// Sets: `task`, `task_id`, `worker`, `attempt`.
    TaskStarting,

    /// The job produced its value.
    TaskCompleted,

    /// The job body failed (error, timeout or panic).
    ///
    /// Sets: `reason`.
    TaskFailed,

    /// The attempt stopped on cancellation (eviction or forced shutdown), or an
    /// unstarted task was dropped: still queued at forced shutdown, or shed
    /// from a full deferred list.
    TaskCancelled,

    /// The attempt exceeded its timeout (always followed by `TaskFailed`).
    ///
    /// Sets: `timeout_ms`.
    TimeoutHit,

    /// A failure was replaced by the job's fallback value.
    FallbackUsed,

    // === Worker events ===
    /// A new worker was started.
    ///
    /// Sets: `worker`.
    WorkerSpawned,

    /// A worker exited (keep-alive elapsed or pool shutting down).
    ///
    /// Sets: `worker`.
    WorkerRetired,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs only; admission order never uses it)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Name of the task, if applicable.
    pub task: Option<Arc<str>>,
    /// Identity of the task instance.
    pub task_id: Option<TaskId>,
    /// Worker involved.
    pub worker: Option<WorkerId>,
    /// Admission count (starting from 1).
    pub attempt: Option<u32>,
    /// Timeout in milliseconds (compact).
    pub timeout_ms: Option<u32>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            task: None,
            task_id: None,
            worker: None,
            attempt: None,
            timeout_ms: None,
            reason: None,
        }
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a task name.
    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Attaches a task instance identity.
    #[inline]
    pub fn with_task_id(mut self, id: TaskId) -> Self {
        self.task_id = Some(id);
        self
    }

    /// Attaches a worker identity.
    #[inline]
    pub fn with_worker(mut self, worker: WorkerId) -> Self {
        self.worker = Some(worker);
        self
    }

    /// Attaches an admission count.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a timeout duration (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.timeout_ms = Some(ms);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_task(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_task(subscriber)
            .with_reason(info)
    }

    /// True for `SubscriberOverflow`; such events never report their own overflow.
    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_is_monotonic() {
        let a = Event::new(EventKind::TaskAdmitted);
        let b = Event::new(EventKind::TaskStarting);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_timeout_saturates() {
        let ev = Event::new(EventKind::TimeoutHit).with_timeout(Duration::from_secs(u64::MAX));
        assert_eq!(ev.timeout_ms, Some(u32::MAX));
    }

    #[test]
    fn test_overflow_constructor() {
        let ev = Event::subscriber_overflow("metrics", "full");
        assert!(ev.is_subscriber_overflow());
        assert_eq!(ev.task.as_deref(), Some("metrics"));
        assert_eq!(ev.reason.as_deref(), Some("subscriber=metrics reason=full"));
    }
}
