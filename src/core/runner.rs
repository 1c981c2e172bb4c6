//! # Run a single attempt of a job.
//!
//! Executes one admission of a payload on a worker, with optional timeout and
//! panic isolation, and publishes lifecycle events to [`Bus`].
//!
//! ## Event flow
//!
//! ```text
//! TaskStarting
//!   job.spawn(ctx) → Ok(v)              → TaskCompleted
//!                  → Err(Canceled)      → TaskCancelled
//!                  → Err(Fail)          → TaskFailed
//!                  → panic              → TaskFailed (Panicked)
//!   timeout exceeded → cancel ctx → TimeoutHit → TaskFailed (Timeout)
//! ```
//!
//! ## Rules
//! - Always publishes **exactly one** terminal event per attempt
//! - `Canceled` is a cancellation, never a failure
//! - `ctx` is the assignment's [`WorkerHandle`] token: eviction and timeout
//!   cancel the same token, and neither affects other assignments
//! - A panicking body never takes the worker down

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use tokio::time;

use crate::{
    core::{admission::Ticket, worker::WorkerHandle},
    error::JobError,
    events::{Bus, Event, EventKind},
    jobs::JobSpec,
    subscribers::panic_message,
};

/// Executes one attempt of `spec` under `handle`, publishing lifecycle events to `bus`.
///
/// The body receives the handle's token. It **should** return
/// `Err(JobError::Canceled)` once it observes cancellation.
pub(crate) async fn run_once<T: Send + 'static>(
    spec: &JobSpec<T>,
    ticket: &Ticket,
    handle: &WorkerHandle,
    bus: &Bus,
) -> Result<T, JobError> {
    bus.publish(attempt_event(EventKind::TaskStarting, ticket, handle));

    let ctx = handle.token().clone();
    let job = spec.job();
    let body = AssertUnwindSafe(async move { job.spawn(ctx).await })
        .catch_unwind()
        .map(|res| {
            res.unwrap_or_else(|panic| {
                Err(JobError::Panicked {
                    message: panic_message(&*panic),
                })
            })
        });

    let res = match spec.timeout() {
        Some(dur) => match time::timeout(dur, body).await {
            Ok(r) => r,
            Err(_elapsed) => {
                handle.cancel();
                publish_timeout(bus, ticket, handle, dur);
                Err(JobError::Timeout { timeout: dur })
            }
        },
        None => body.await,
    };

    match &res {
        Ok(_) => bus.publish(attempt_event(EventKind::TaskCompleted, ticket, handle)),
        Err(JobError::Canceled) => {
            bus.publish(attempt_event(EventKind::TaskCancelled, ticket, handle))
        }
        Err(e) => bus.publish(
            attempt_event(EventKind::TaskFailed, ticket, handle).with_reason(e.to_string()),
        ),
    }
    res
}

fn attempt_event(kind: EventKind, ticket: &Ticket, handle: &WorkerHandle) -> Event {
    Event::new(kind)
        .with_task(ticket.name.clone())
        .with_task_id(ticket.id)
        .with_worker(handle.id())
        .with_attempt(ticket.attempt)
}

/// Publishes `TimeoutHit` (always followed by `TaskFailed`).
fn publish_timeout(bus: &Bus, ticket: &Ticket, handle: &WorkerHandle, dur: Duration) {
    bus.publish(attempt_event(EventKind::TimeoutHit, ticket, handle).with_timeout(dur));
}
