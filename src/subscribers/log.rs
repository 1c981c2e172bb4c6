//! # Logging subscriber.
//!
//! [`LogWriter`] renders pool events through `tracing` with structured fields.
//! Install any `tracing` subscriber (e.g. `tracing_subscriber::fmt`) to see them.
//!
//! ## Output (fmt subscriber)
//! ```text
//! INFO evictpool: admitted task="fetch" id=#3 attempt=1
//! WARN evictpool: evicted task="fetch" id=#1 worker=w1
//! INFO evictpool: completed task="fetch" id=#3
//! ```

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// `tracing`-backed logging subscriber.
///
/// Enabled via the `logging` feature.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogWriter;

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let task = e.task.as_deref().unwrap_or("-");
        let id = e.task_id.map(|id| id.to_string());
        let id = id.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");

        match e.kind {
            EventKind::TaskAdmitted => {
                info!(target: "evictpool", task, id, attempt = e.attempt, "admitted")
            }
            EventKind::TaskStarting => {
                debug!(target: "evictpool", task, id, worker = ?e.worker, "starting")
            }
            EventKind::TaskCompleted => info!(target: "evictpool", task, id, "completed"),
            EventKind::TaskFailed => warn!(target: "evictpool", task, id, reason, "failed"),
            EventKind::TaskCancelled => info!(target: "evictpool", task, id, "cancelled"),
            EventKind::TimeoutHit => {
                warn!(target: "evictpool", task, id, timeout_ms = e.timeout_ms, "timeout")
            }
            EventKind::FallbackUsed => info!(target: "evictpool", task, id, "fallback"),
            EventKind::TaskEvicted => {
                warn!(target: "evictpool", task, id, worker = ?e.worker, "evicted")
            }
            EventKind::TaskReadmitted => {
                info!(target: "evictpool", task, attempt = e.attempt, "readmitted")
            }
            EventKind::SubmitRejected => warn!(target: "evictpool", task, reason, "rejected"),
            EventKind::RegistryViolation => {
                error!(target: "evictpool", id, reason, "registry violation")
            }
            EventKind::WorkerSpawned => debug!(target: "evictpool", worker = ?e.worker, "worker spawned"),
            EventKind::WorkerRetired => {
                debug!(target: "evictpool", worker = ?e.worker, "worker retired")
            }
            EventKind::ShutdownRequested => info!(target: "evictpool", "shutdown requested"),
            EventKind::AllDrainedWithin => info!(target: "evictpool", "all drained within grace"),
            EventKind::GraceExceeded => {
                error!(target: "evictpool", timeout_ms = e.timeout_ms, stuck = reason, "grace exceeded")
            }
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked => {
                warn!(target: "evictpool", subscriber = task, reason, "subscriber")
            }
        }
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
