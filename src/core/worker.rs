//! # Worker: one execution unit of the pool.
//!
//! A worker is a tokio task bound to at most one job at a time. It runs the
//! job, settles the outcome, and then looks for more work: its own handoff
//! first, then the queue head, then deferred re-admissions. With nothing to
//! do it parks until woken, until its keep-alive elapses (non-core workers
//! only), or until the pool is forced down.
//!
//! ## Architecture
//! ```text
//! spawn(first) ──► loop {
//!                    ├─► run_once(job, handle)        (one attempt, child token)
//!                    ├─► lock: registry.remove(id)    (None = evicted meanwhile)
//!                    ├─► settle:
//!                    │     Ok(v)                      → resolve Ok(v)
//!                    │     Canceled + evicted + Open  → re-admit payload (new TaskId)
//!                    │     Canceled                   → resolve Cancelled
//!                    │     Timeout/Fail/Panicked      → fallback or resolve Failed
//!                    └─► next_assignment():
//!                          handoff → queue → deferred → park (notify / keep-alive / runtime)
//!                  }
//! ```
//!
//! ## Rules
//! - The body's own result wins a race with eviction: only a body that returns
//!   `Canceled` after losing its registry entry is re-admitted.
//! - `idle` is incremented and the wakeup is armed in one critical section;
//!   it is decremented in the same critical section that takes the next task.
//! - A worker retires only when it finds nothing to take.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::{
    core::{
        admission::{Assignment, Pending},
        pool::{PoolState, Shared},
        runner::run_once,
    },
    error::{JobError, PoolError},
    events::{Event, EventKind},
    subscribers::panic_message,
};

static NEXT_WORKER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(u64);

impl WorkerId {
    /// Allocates a fresh process-unique identity.
    pub fn next() -> Self {
        WorkerId(NEXT_WORKER_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[cfg(test)]
    pub(crate) fn from_raw(raw: u64) -> Self {
        WorkerId(raw)
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "w{}", self.0)
    }
}

/// Cancellation handle of one assignment.
///
/// Each assignment gets a fresh child of the pool's runtime token, so
/// [`cancel`](WorkerHandle::cancel) reaches only the job the worker is
/// executing at that moment. Cancelling twice is a no-op.
#[derive(Clone, Debug)]
pub struct WorkerHandle {
    id: WorkerId,
    token: CancellationToken,
}

impl WorkerHandle {
    /// Binds `token` to worker `id`.
    pub fn new(id: WorkerId, token: CancellationToken) -> Self {
        Self { id, token }
    }

    /// Worker executing the assignment.
    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Requests cooperative cancellation of the assignment.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// True once the assignment was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// Runs a worker starting on `first` until it retires.
pub(crate) async fn run<T: Send + 'static>(shared: Arc<Shared<T>>, first: Assignment<T>) {
    let worker = first.handle.id();
    shared.publish(Event::new(EventKind::WorkerSpawned).with_worker(worker));
    debug!(%worker, "worker spawned");

    let mut next = Some(first);
    while let Some(Assignment { pending, handle }) = next.take() {
        let res = run_once(&pending.spec, &pending.ticket, &handle, &shared.bus).await;

        let readmit = {
            let mut inner = shared.lock();
            let evicted = !inner.finish(pending.id(), handle.id());
            evicted && inner.state == PoolState::Open
        };
        settle(&shared, pending, res, readmit);

        next = next_assignment(&shared, handle.id()).await;
    }

    shared.publish(Event::new(EventKind::WorkerRetired).with_worker(worker));
    debug!(%worker, "worker retired");
}

/// Turns an attempt outcome into the caller's result (or a re-admission).
fn settle<T: Send + 'static>(
    shared: &Arc<Shared<T>>,
    pending: Pending<T>,
    res: Result<T, JobError>,
    readmit: bool,
) {
    match res {
        Ok(v) => pending.resolve(Ok(v)),
        Err(JobError::Canceled) if readmit => shared.readmit(pending),
        Err(JobError::Canceled) => pending.resolve(Err(PoolError::Cancelled)),
        Err(e) => {
            if !pending.spec.has_fallback() {
                pending.resolve(Err(PoolError::Failed(e)));
                return;
            }
            match catch_unwind(AssertUnwindSafe(|| pending.spec.fallback_value())) {
                Ok(Some(v)) => {
                    shared.publish(
                        Event::new(EventKind::FallbackUsed)
                            .with_task(pending.ticket.name.clone())
                            .with_task_id(pending.id())
                            .with_reason(e.to_string()),
                    );
                    pending.resolve(Ok(v));
                }
                Ok(None) => pending.resolve(Err(PoolError::Failed(e))),
                Err(panic) => pending.resolve(Err(PoolError::Failed(JobError::Panicked {
                    message: panic_message(&*panic),
                }))),
            }
        }
    }
}

/// Finds the next assignment for `worker`, parking while there is none.
///
/// Returns `None` when the worker retires; the worker count is already
/// decremented at that point.
async fn next_assignment<T: Send + 'static>(
    shared: &Arc<Shared<T>>,
    worker: WorkerId,
) -> Option<Assignment<T>> {
    let core = shared.cfg.effective_core();
    let mut parked = false;
    let mut expired = false;

    loop {
        let notified = shared.wake.notified();
        tokio::pin!(notified);

        let may_expire = {
            let mut inner = shared.lock();
            if parked {
                inner.idle -= 1;
                parked = false;
            }
            let taken = inner.next_for(worker, &shared.runtime);
            match taken {
                Some(Ok(a)) => return Some(a),
                Some(Err((p, e))) => {
                    drop(inner);
                    shared.violation(p, e);
                    continue;
                }
                None => {}
            }

            let retire = inner.state != PoolState::Open
                || shared.runtime.is_cancelled()
                || (expired && inner.workers > core);
            if retire {
                inner.workers -= 1;
                return None;
            }

            inner.idle += 1;
            parked = true;
            notified.as_mut().enable();
            inner.workers > core
        };

        trace!(%worker, "worker parked");
        expired = false;
        tokio::select! {
            _ = &mut notified => {}
            _ = time::sleep(shared.cfg.keep_alive), if may_expire => { expired = true; }
            _ = shared.runtime.cancelled() => {}
        }
    }
}
