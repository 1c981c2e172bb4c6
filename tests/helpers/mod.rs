//! Job builders and event helpers shared by the integration tests.
//!
//! Run with: `cargo test --test pool_test --test eviction_test`.

#![allow(dead_code)]

use std::time::Duration;

use evictpool::{Event, EventKind, JobError, JobFn, JobRef};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Upper bound for any single await in these tests.
pub const GUARD: Duration = Duration::from_secs(5);

/// Runs until cancelled.
pub fn blocking(name: &'static str) -> JobRef<String> {
    JobFn::arc(name, |ctx: CancellationToken| async move {
        ctx.cancelled().await;
        Err::<String, _>(JobError::Canceled)
    })
}

/// Returns `value` after `delay` unless cancelled first.
pub fn sleeper(name: &'static str, delay: Duration, value: &'static str) -> JobRef<String> {
    JobFn::arc(name, move |ctx: CancellationToken| async move {
        tokio::select! {
            _ = ctx.cancelled() => Err(JobError::Canceled),
            _ = tokio::time::sleep(delay) => Ok(value.to_string()),
        }
    })
}

/// Fails immediately.
pub fn failing(name: &'static str) -> JobRef<String> {
    JobFn::arc(name, |_ctx: CancellationToken| async move {
        Err::<String, _>(JobError::fail("boom"))
    })
}

/// Everything the receiver holds right now.
pub fn drain_events(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut out = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        out.push(ev);
    }
    out
}

pub fn count(events: &[Event], kind: EventKind) -> usize {
    events.iter().filter(|e| e.kind == kind).count()
}
