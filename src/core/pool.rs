//! # Pool: bounded, preemptive-admission worker pool.
//!
//! The [`Pool`] owns the workers, the admission queue, the task registry and
//! the event bus. It is the only entry point for work.
//!
//! ## Architecture
//! ```text
//! submit(spec) ──► Shared::admit ──lock──► Inner::admit ──► Step
//!                                                            ├─ Spawn     → tracker.spawn(worker::run)
//!                                                            ├─ Queued    → wake.notify_one()
//!                                                            ├─ Evicted   → TaskEvicted (+ re-admit queued victim)
//!                                                            ├─ HandedOff → settling worker takes it next
//!                                                            ├─ Deferred  → waits for a free worker (oldest shed when full)
//!                                                            └─ Violation → RegistryViolation, handle Failed
//!
//! Event flow:
//!   admission / workers ── publish(Event) ──► Bus ──► listener ──► SubscriberSet
//!
//! Shutdown path:
//!   shutdown(drain)
//!     ├─► Open → ShuttingDown, publish ShutdownRequested
//!     ├─► wake parked workers (they retire once the queue is empty)
//!     └─► timeout(drain, tracker.wait()):
//!           ├─ Ok       → Closed, publish AllDrainedWithin
//!           └─ Timeout  → cancel runtime token, unstarted tasks → Cancelled,
//!                         Closed, publish GraceExceeded, Err(GraceExceeded)
//! ```
//!
//! ## Rules
//! - `submit` never blocks and never awaits; it must be called inside a tokio runtime.
//! - Every admitted task resolves its handle exactly once.
//! - Submissions after shutdown began resolve `PoolError::Shutdown` without
//!   touching the registry.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use evictpool::{JobError, JobFn, JobRef, JobSpec, Pool, PoolConfig};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool: Pool<String> = Pool::new(PoolConfig::fixed(2, 4));
//!
//!     let job: JobRef<String> = JobFn::arc("hello", |ctx: CancellationToken| async move {
//!         tokio::select! {
//!             _ = ctx.cancelled() => Err(JobError::Canceled),
//!             _ = tokio::time::sleep(Duration::from_millis(10)) => Ok("hello".to_string()),
//!         }
//!     });
//!
//!     let handle = pool.submit(JobSpec::new(job).with_fallback(|| "fallback".to_string()));
//!     assert_eq!(handle.await?, "hello");
//!
//!     pool.shutdown(Duration::from_secs(1)).await?;
//!     Ok(())
//! }
//! ```

use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{Notify, broadcast};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::{
    core::{
        admission::{Assignment, Inner, Pending, Step, Ticket, Victim},
        config::PoolConfig,
        registry::TaskId,
        shutdown, worker,
    },
    error::{JobError, PoolError, RegistryError, RuntimeError},
    events::{Bus, Event, EventKind},
    jobs::{self, JobHandle, JobSpec},
    subscribers::{Subscribe, SubscriberSet},
};

/// Lifecycle state of a pool: `Open → ShuttingDown → Closed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PoolState {
    /// Admitting work.
    Open,
    /// Draining; new submissions are rejected.
    ShuttingDown,
    /// Drained (or forced down). No further transitions.
    Closed,
}

impl PoolState {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            PoolState::Open => "open",
            PoolState::ShuttingDown => "shutting_down",
            PoolState::Closed => "closed",
        }
    }
}

impl fmt::Display for PoolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Point-in-time snapshot of pool counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolStats {
    /// Lifecycle state.
    pub state: PoolState,
    /// Live workers.
    pub workers: usize,
    /// Workers parked waiting for work.
    pub idle: usize,
    /// Workers bound to a task.
    pub running: usize,
    /// Tasks buffered in the admission queue.
    pub queued: usize,
    /// Re-admitted payloads waiting for a free worker.
    pub deferred: usize,
    /// Tasks in the registry (queued, handed off or running).
    pub admitted: usize,
}

/// Forwards bus events to the subscriber set until stopped.
struct Listener {
    stop: CancellationToken,
    handle: JoinHandle<()>,
}

/// State shared by the pool front door and its workers.
pub(crate) struct Shared<T> {
    pub(crate) cfg: PoolConfig,
    pub(crate) bus: Bus,
    /// Parent of every assignment token; cancelled only when a drain overruns.
    pub(crate) runtime: CancellationToken,
    pub(crate) wake: Notify,
    inner: Mutex<Inner<T>>,
    tracker: TaskTracker,
    listener: Mutex<Option<Listener>>,
}

impl<T: Send + 'static> Shared<T> {
    pub(crate) fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn publish(&self, ev: Event) {
        self.bus.publish(ev);
    }

    /// Admits `p`, evicting the oldest admitted task if the pool is saturated.
    pub(crate) fn admit(self: &Arc<Self>, p: Pending<T>) {
        let ticket = p.ticket.clone();
        let step = {
            let mut inner = self.lock();
            if inner.state != PoolState::Open {
                drop(inner);
                self.refuse(p);
                return;
            }
            inner.admit(p, &self.cfg, &self.runtime)
        };

        match step {
            Step::Spawn(a) => {
                self.publish_admitted(&ticket);
                self.spawn_worker(a);
            }
            Step::Queued => {
                self.publish_admitted(&ticket);
                self.wake.notify_one();
            }
            Step::Evicted(victim) => {
                self.publish_admitted(&ticket);
                self.evicted(&ticket, victim);
            }
            Step::HandedOff(worker) => {
                debug!(task = %ticket.name, id = %ticket.id, %worker, "handed to settling worker");
                self.publish_admitted(&ticket);
            }
            Step::Deferred(shed) => {
                debug!(task = %ticket.name, id = %ticket.id, attempt = ticket.attempt, "pool saturated; deferred");
                if let Some(old) = shed {
                    warn!(task = %old.ticket.name, id = %old.id(), "deferred capacity exceeded; cancelling oldest");
                    self.publish(
                        ticket_event(EventKind::TaskCancelled, &old.ticket)
                            .with_reason("deferred capacity exceeded"),
                    );
                    old.resolve(Err(PoolError::Cancelled));
                }
            }
            Step::Violation(back, e) => self.violation(back, e),
        }
    }

    /// Re-admits an evicted payload under a fresh identity.
    pub(crate) fn readmit(self: &Arc<Self>, p: Pending<T>) {
        let prev = p.id();
        let p = p.readmission();
        debug!(task = %p.ticket.name, %prev, id = %p.id(), attempt = p.ticket.attempt, "re-admitting evicted task");
        self.publish(
            ticket_event(EventKind::TaskReadmitted, &p.ticket).with_reason(format!("evicted as {prev}")),
        );
        self.admit(p);
    }

    /// Aborts the operation on `p` after a registry misuse.
    pub(crate) fn violation(&self, p: Pending<T>, err: RegistryError) {
        error!(
            task = %p.ticket.name,
            id = %p.id(),
            label = err.as_label(),
            error = %err,
            "registry violation"
        );
        self.publish(
            ticket_event(EventKind::RegistryViolation, &p.ticket).with_reason(err.to_string()),
        );
        p.resolve(Err(PoolError::Failed(JobError::fail(err.to_string()))));
    }

    /// Rejects `p` because the pool is no longer open.
    fn refuse(&self, p: Pending<T>) {
        if p.ticket.attempt == 1 {
            debug!(task = %p.ticket.name, "submit after shutdown");
            self.publish(
                ticket_event(EventKind::SubmitRejected, &p.ticket)
                    .with_reason(PoolError::Shutdown.as_label()),
            );
            p.resolve(Err(PoolError::Shutdown));
        } else {
            self.publish(
                ticket_event(EventKind::TaskCancelled, &p.ticket).with_reason("pool shutting down"),
            );
            p.resolve(Err(PoolError::Cancelled));
        }
    }

    fn evicted(self: &Arc<Self>, by: &Ticket, victim: Victim<T>) {
        match victim {
            Victim::Running { id, name, worker } => {
                debug!(task = %name, %id, %worker, by = %by.id, "evicted running task");
                self.publish(
                    Event::new(EventKind::TaskEvicted)
                        .with_task(name)
                        .with_task_id(id)
                        .with_worker(worker)
                        .with_reason(format!("running; replaced by {}", by.id)),
                );
            }
            Victim::Queued(p) => {
                debug!(task = %p.ticket.name, id = %p.id(), by = %by.id, "evicted queued task");
                self.publish(
                    ticket_event(EventKind::TaskEvicted, &p.ticket)
                        .with_reason(format!("queued; replaced by {}", by.id)),
                );
                let this = Arc::clone(self);
                self.tracker.spawn(async move { this.readmit(p) });
            }
        }
    }

    fn spawn_worker(self: &Arc<Self>, a: Assignment<T>) {
        self.tracker.spawn(worker::run(Arc::clone(self), a));
    }

    fn publish_admitted(&self, ticket: &Ticket) {
        self.publish(ticket_event(EventKind::TaskAdmitted, ticket));
    }

    /// Stops event forwarding after delivering what the bus already holds.
    async fn stop_listener(&self) {
        let listener = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(Listener { stop, handle }) = listener {
            stop.cancel();
            let _ = handle.await;
        }
    }
}

fn ticket_event(kind: EventKind, ticket: &Ticket) -> Event {
    Event::new(kind)
        .with_task(ticket.name.clone())
        .with_task_id(ticket.id)
        .with_attempt(ticket.attempt)
}

/// Subscribes to the bus and forwards events to the subscriber set.
async fn listen(mut rx: broadcast::Receiver<Event>, set: SubscriberSet, stop: CancellationToken) {
    loop {
        tokio::select! {
            biased;
            ev = rx.recv() => match ev {
                Ok(ev) => set.emit(&ev),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event listener lagged behind the bus");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = stop.cancelled() => break,
        }
    }
    set.shutdown().await;
}

/// Builder for a [`Pool`] with optional subscribers.
pub struct PoolBuilder<T> {
    cfg: PoolConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
    _payload: PhantomData<fn() -> T>,
}

impl<T: Send + 'static> PoolBuilder<T> {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: PoolConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            _payload: PhantomData,
        }
    }

    /// Sets event subscribers.
    ///
    /// Subscribers receive lifecycle events through dedicated workers with
    /// bounded queues; a slow or panicking subscriber never stalls the pool.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the pool. Must be called inside a tokio runtime when subscribers are set.
    ///
    /// Workers are started lazily, on submission.
    pub fn build(self) -> Pool<T> {
        self.cfg.report_adjustments();
        let bus = Bus::new(self.cfg.bus_capacity_clamped());

        let listener = if self.subscribers.is_empty() {
            None
        } else {
            let rx = bus.subscribe();
            let set = SubscriberSet::new(self.subscribers, bus.clone());
            let stop = CancellationToken::new();
            let handle = tokio::spawn(listen(rx, set, stop.clone()));
            Some(Listener { stop, handle })
        };

        Pool {
            shared: Arc::new(Shared {
                cfg: self.cfg,
                bus,
                runtime: CancellationToken::new(),
                wake: Notify::new(),
                inner: Mutex::new(Inner::new()),
                tracker: TaskTracker::new(),
                listener: Mutex::new(listener),
            }),
        }
    }
}

/// Bounded worker pool that, when saturated, admits new work by evicting the
/// oldest admitted task and re-admitting its payload.
///
/// Cloning is cheap; clones share the same pool.
pub struct Pool<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Pool<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool").field("cfg", &self.shared.cfg).finish()
    }
}

impl<T: Send + 'static> Pool<T> {
    /// Creates a pool without subscribers.
    pub fn new(cfg: PoolConfig) -> Self {
        PoolBuilder::new(cfg).build()
    }

    /// Starts building a pool.
    pub fn builder(cfg: PoolConfig) -> PoolBuilder<T> {
        PoolBuilder::new(cfg)
    }

    /// Submits a job; the returned handle resolves exactly once.
    ///
    /// Never blocks. When the pool is saturated the oldest admitted task is
    /// evicted to make room and its payload is re-admitted.
    pub fn submit(&self, spec: impl Into<JobSpec<T>>) -> JobHandle<T> {
        let spec = spec.into();
        let id = TaskId::next();
        let name: Arc<str> = Arc::from(spec.name());
        let (resolver, handle) = jobs::channel(id, Arc::clone(&name));
        self.shared.admit(Pending::new(id, name, spec, resolver));
        handle
    }

    /// Submits a job and invokes `on_complete` exactly once with its outcome.
    ///
    /// Returns the identity of the first admission.
    pub fn submit_with<F>(&self, spec: impl Into<JobSpec<T>>, on_complete: F) -> TaskId
    where
        F: FnOnce(Result<T, PoolError>) + Send + 'static,
    {
        let spec = spec.into();
        let id = TaskId::next();
        let name: Arc<str> = Arc::from(spec.name());
        let resolver = jobs::callback(Box::new(on_complete));
        self.shared.admit(Pending::new(id, name, spec, resolver));
        id
    }

    /// Stops admitting, then waits up to `drain` for admitted work to finish.
    ///
    /// On timeout every running job is signalled, unstarted tasks resolve
    /// `Cancelled`, and [`RuntimeError::GraceExceeded`] lists what was left.
    pub async fn shutdown(&self, drain: Duration) -> Result<(), RuntimeError> {
        self.drain(drain, "requested").await
    }

    /// Waits for a termination signal, then shuts down with `drain_timeout`.
    pub async fn shutdown_on_signal(&self) -> Result<(), RuntimeError> {
        let signal = shutdown::wait_for_shutdown_signal()
            .await
            .map_err(|source| RuntimeError::Signal { source })?;
        info!(%signal, "termination signal received");
        self.drain(self.shared.cfg.drain_timeout, signal.as_str())
            .await
    }

    /// Returns a snapshot of the pool counters.
    pub fn stats(&self) -> PoolStats {
        self.shared.lock().stats()
    }

    /// Returns the lifecycle state.
    pub fn state(&self) -> PoolState {
        self.shared.lock().state
    }

    /// Returns a receiver of every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.shared.bus.subscribe()
    }

    /// Returns the construction-time configuration.
    pub fn config(&self) -> &PoolConfig {
        &self.shared.cfg
    }

    async fn drain(&self, drain: Duration, reason: &str) -> Result<(), RuntimeError> {
        let first = {
            let mut inner = self.shared.lock();
            match inner.state {
                PoolState::Open => {
                    inner.state = PoolState::ShuttingDown;
                    true
                }
                PoolState::ShuttingDown => false,
                PoolState::Closed => return Ok(()),
            }
        };

        if first {
            info!(?drain, reason, "pool shutting down");
            self.shared.publish(
                Event::new(EventKind::ShutdownRequested)
                    .with_timeout(drain)
                    .with_reason(reason),
            );
            self.shared.wake.notify_waiters();
            self.shared.tracker.close();
        }

        let res = match time::timeout(drain, self.shared.tracker.wait()).await {
            Ok(()) => {
                self.shared.lock().state = PoolState::Closed;
                if first {
                    info!("pool drained");
                    self.shared
                        .publish(Event::new(EventKind::AllDrainedWithin).with_timeout(drain));
                }
                Ok(())
            }
            Err(_elapsed) => {
                let (stuck, unstarted) = {
                    let mut inner = self.shared.lock();
                    inner.state = PoolState::Closed;
                    let stuck = inner.registry.names();
                    (stuck, inner.take_unstarted())
                };
                self.shared.runtime.cancel();
                for p in unstarted {
                    self.shared.publish(
                        ticket_event(EventKind::TaskCancelled, &p.ticket)
                            .with_reason("drain timeout exceeded"),
                    );
                    p.resolve(Err(PoolError::Cancelled));
                }
                warn!(?drain, ?stuck, "drain timeout exceeded; forcing termination");
                self.shared.publish(
                    Event::new(EventKind::GraceExceeded)
                        .with_timeout(drain)
                        .with_reason(stuck.join(", ")),
                );
                Err(RuntimeError::GraceExceeded { grace: drain, stuck })
            }
        };

        self.shared.stop_listener().await;
        res
    }
}
