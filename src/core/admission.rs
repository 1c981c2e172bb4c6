//! # Admission controller.
//!
//! Decides where an incoming task goes and, when the pool is saturated,
//! which admitted task gives up its place.
//!
//! Everything here runs on [`Inner`], the pool state guarded by a single
//! mutex. Each method is one critical section; the caller acts on the returned
//! [`Step`] (spawn a worker, wake one, re-admit a victim, publish events) after
//! the lock is released.
//!
//! ## Placement
//! ```text
//! workers < core (or no workers at all)   → Spawn     new worker starts on the task
//! queued  < queue_capacity + idle         → Queue     idle workers pick it up
//! workers < max                           → Spawn
//! otherwise                               → Saturated → evict_for()  (first admission)
//!                                                       → defer()      (re-admission)
//! ```
//!
//! A re-admitted payload never evicts. It waits in `deferred` until a worker
//! frees up, so one overflow displaces exactly one task. `deferred` holds at
//! most `effective_deferred` payloads; past that the oldest one is shed and
//! resolves `Cancelled`.
//!
//! ## Eviction
//! ```text
//! evict_for(newcomer):
//!   registry empty            → hand newcomer to a settling worker (else defer)
//!   record(newcomer)
//!   pop_oldest() = victim     (select + remove: exactly once)
//!     ├─ running → cancel its WorkerHandle, handoffs[worker] = newcomer
//!     └─ queued  → take victim's slot (queue or handoff), victim payload returned
//! ```
//!
//! ## Rules
//! - A newcomer is recorded before the victim is popped, so it is never its own victim.
//! - A worker owns at most one handoff; a worker with a handoff no longer has a
//!   registry entry and cannot be chosen again.
//! - A settling worker has finished its attempt but not yet asked for more
//!   work. With an empty registry every busy worker is settling, so a fresh
//!   submission is never turned away.
//! - Deferred payloads are not admitted: they have no registry entry until a
//!   worker takes them, and they get a fresh admission time then.
//! - Live workers never exceed `effective_max`; the queue never holds more than
//!   `queue_capacity` tasks beyond those waiting for an idle worker.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::core::config::PoolConfig;
use crate::core::pool::{PoolState, PoolStats};
use crate::core::registry::{Registry, TaskId};
use crate::core::worker::{WorkerHandle, WorkerId};
use crate::error::{PoolError, RegistryError};
use crate::jobs::{JobSpec, Resolver};

/// Identity of one admission of a payload.
#[derive(Clone, Debug)]
pub(crate) struct Ticket {
    pub(crate) id: TaskId,
    pub(crate) name: Arc<str>,
    /// Admission count of the payload, starting at 1.
    pub(crate) attempt: u32,
}

/// An admitted (or about to be admitted) payload.
pub(crate) struct Pending<T> {
    pub(crate) ticket: Ticket,
    pub(crate) spec: JobSpec<T>,
    resolver: Resolver<T>,
}

impl<T> Pending<T> {
    pub(crate) fn new(id: TaskId, name: Arc<str>, spec: JobSpec<T>, resolver: Resolver<T>) -> Self {
        Self {
            ticket: Ticket {
                id,
                name,
                attempt: 1,
            },
            spec,
            resolver,
        }
    }

    pub(crate) fn id(&self) -> TaskId {
        self.ticket.id
    }

    /// Same payload and resolver under a fresh admission identity.
    pub(crate) fn readmission(self) -> Self {
        Self {
            ticket: Ticket {
                id: TaskId::next(),
                name: self.ticket.name,
                attempt: self.ticket.attempt.saturating_add(1),
            },
            ..self
        }
    }

    /// Resolves the caller's handle.
    pub(crate) fn resolve(self, res: Result<T, PoolError>) {
        self.resolver.resolve(res);
    }
}

/// A payload bound to the worker that executes it.
pub(crate) struct Assignment<T> {
    pub(crate) pending: Pending<T>,
    pub(crate) handle: WorkerHandle,
}

/// Where a task can go right now.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Placement {
    Spawn,
    Queue,
    Saturated,
}

/// The task that gave up its place.
pub(crate) enum Victim<T> {
    /// Its worker was signalled; the worker re-admits the payload once the body stops.
    Running {
        id: TaskId,
        name: Arc<str>,
        worker: WorkerId,
    },
    /// Removed before it started; the payload must be re-admitted by the caller.
    Queued(Pending<T>),
}

/// Result of one admission critical section.
pub(crate) enum Step<T> {
    /// A new worker must be spawned on this assignment.
    Spawn(Assignment<T>),
    /// Queued; one idle worker should be woken.
    Queued,
    /// Took the place of an evicted task.
    Evicted(Victim<T>),
    /// Parked until a worker frees up; carries the payload shed to make room.
    Deferred(Option<Pending<T>>),
    /// Handed to a worker that is settling its previous attempt.
    HandedOff(WorkerId),
    /// The registry refused the task.
    Violation(Pending<T>, RegistryError),
}

/// Pool state serialized under one lock.
pub(crate) struct Inner<T> {
    pub(crate) state: PoolState,
    pub(crate) registry: Registry,
    queue: VecDeque<Pending<T>>,
    handoffs: HashMap<WorkerId, Pending<T>>,
    deferred: VecDeque<Pending<T>>,
    settling: HashSet<WorkerId>,
    pub(crate) workers: usize,
    pub(crate) idle: usize,
}

impl<T> Inner<T> {
    pub(crate) fn new() -> Self {
        Self {
            state: PoolState::Open,
            registry: Registry::new(),
            queue: VecDeque::new(),
            handoffs: HashMap::new(),
            deferred: VecDeque::new(),
            settling: HashSet::new(),
            workers: 0,
            idle: 0,
        }
    }

    /// Non-blocking placement decision for one more task.
    pub(crate) fn placement(&self, cfg: &PoolConfig) -> Placement {
        if self.workers == 0 || self.workers < cfg.effective_core() {
            Placement::Spawn
        } else if self.queue.len() < cfg.queue_capacity + self.idle {
            Placement::Queue
        } else if self.workers < cfg.effective_max() {
            Placement::Spawn
        } else {
            Placement::Saturated
        }
    }

    /// Records and places `p`. When saturated, a first admission evicts the
    /// oldest admitted task and a re-admission is deferred.
    pub(crate) fn admit(
        &mut self,
        p: Pending<T>,
        cfg: &PoolConfig,
        runtime: &CancellationToken,
    ) -> Step<T> {
        match self.placement(cfg) {
            Placement::Spawn => {
                if let Err(e) = self.record(&p) {
                    return Step::Violation(p, e);
                }
                match self.bind(WorkerId::next(), p, runtime) {
                    Ok(a) => {
                        self.workers += 1;
                        Step::Spawn(a)
                    }
                    Err((p, e)) => {
                        self.registry.remove(p.id());
                        Step::Violation(p, e)
                    }
                }
            }
            Placement::Queue => {
                if let Err(e) = self.record(&p) {
                    return Step::Violation(p, e);
                }
                self.queue.push_back(p);
                Step::Queued
            }
            Placement::Saturated if p.ticket.attempt > 1 => self.defer(p, cfg),
            Placement::Saturated => self.evict_for(p, cfg),
        }
    }

    /// Marks the attempt of `id` on `worker` as over.
    ///
    /// Returns false when the entry was already gone, i.e. the task was evicted.
    pub(crate) fn finish(&mut self, id: TaskId, worker: WorkerId) -> bool {
        self.settling.insert(worker);
        self.registry.remove(id).is_some()
    }

    /// Evicts the oldest admitted task in favour of `p`.
    fn evict_for(&mut self, p: Pending<T>, cfg: &PoolConfig) -> Step<T> {
        if self.registry.is_empty() {
            return self.hand_to_settling(p, cfg);
        }
        if let Err(e) = self.record(&p) {
            return Step::Violation(p, e);
        }
        let Some(victim) = self.registry.pop_oldest() else {
            self.registry.remove(p.id());
            return self.hand_to_settling(p, cfg);
        };

        if let Some(handle) = victim.worker {
            handle.cancel();
            if let Some(displaced) = self.handoffs.insert(handle.id(), p) {
                self.registry.remove(displaced.id());
                return Step::Violation(displaced, RegistryError::HandoffTaken(handle.id()));
            }
            return Step::Evicted(Victim::Running {
                id: victim.id,
                name: victim.name,
                worker: handle.id(),
            });
        }

        if let Some(pos) = self.queue.iter().position(|q| q.id() == victim.id) {
            if let Some(evicted) = self.queue.remove(pos) {
                self.queue.push_back(p);
                return Step::Evicted(Victim::Queued(evicted));
            }
        }
        if let Some(slot) = self.handoffs.values_mut().find(|q| q.id() == victim.id) {
            let evicted = std::mem::replace(slot, p);
            return Step::Evicted(Victim::Queued(evicted));
        }

        // A queued entry with neither a queue nor a handoff slot.
        self.registry.remove(p.id());
        Step::Violation(p, RegistryError::UnknownTask(victim.id))
    }

    /// Gives `p` to a worker that finished its attempt and has not asked for
    /// more work yet. Defers it when there is none.
    fn hand_to_settling(&mut self, p: Pending<T>, cfg: &PoolConfig) -> Step<T> {
        let free = self
            .settling
            .iter()
            .copied()
            .find(|w| !self.handoffs.contains_key(w));
        let Some(worker) = free else {
            return self.defer(p, cfg);
        };
        if let Err(e) = self.record(&p) {
            return Step::Violation(p, e);
        }
        self.handoffs.insert(worker, p);
        Step::HandedOff(worker)
    }

    /// Parks `p` until a worker frees up, shedding the oldest deferred
    /// payload when the deferred list is full.
    fn defer(&mut self, p: Pending<T>, cfg: &PoolConfig) -> Step<T> {
        let shed = if self.deferred.len() >= cfg.effective_deferred() {
            self.deferred.pop_front()
        } else {
            None
        };
        self.deferred.push_back(p);
        Step::Deferred(shed)
    }

    /// Hands the next task to `worker`: its handoff first, then the queue
    /// head, then the oldest deferred re-admission.
    pub(crate) fn next_for(
        &mut self,
        worker: WorkerId,
        runtime: &CancellationToken,
    ) -> Option<Result<Assignment<T>, (Pending<T>, RegistryError)>> {
        self.settling.remove(&worker);
        if let Some(p) = self
            .handoffs
            .remove(&worker)
            .or_else(|| self.queue.pop_front())
        {
            return Some(self.bind(worker, p, runtime));
        }
        let p = self.deferred.pop_front()?;
        if let Err(e) = self.record(&p) {
            return Some(Err((p, e)));
        }
        Some(self.bind(worker, p, runtime).inspect_err(|(p, _)| {
            self.registry.remove(p.id());
        }))
    }

    /// Stops tracking every task that has not started, returning them.
    pub(crate) fn take_unstarted(&mut self) -> Vec<Pending<T>> {
        let mut out: Vec<Pending<T>> = self.queue.drain(..).collect();
        out.extend(self.handoffs.drain().map(|(_, p)| p));
        out.extend(self.deferred.drain(..));
        for p in &out {
            self.registry.remove(p.id());
        }
        out
    }

    /// Snapshot of counters.
    pub(crate) fn stats(&self) -> PoolStats {
        PoolStats {
            state: self.state,
            workers: self.workers,
            idle: self.idle,
            running: self.workers - self.idle,
            queued: self.queue.len().saturating_sub(self.idle),
            deferred: self.deferred.len(),
            admitted: self.registry.len(),
        }
    }

    fn record(&mut self, p: &Pending<T>) -> Result<(), RegistryError> {
        self.registry
            .record(p.id(), Arc::clone(&p.ticket.name), Instant::now())
            .map(|_| ())
    }

    /// Attaches a fresh per-assignment handle for `worker` to `p`.
    fn bind(
        &mut self,
        worker: WorkerId,
        p: Pending<T>,
        runtime: &CancellationToken,
    ) -> Result<Assignment<T>, (Pending<T>, RegistryError)> {
        let handle = WorkerHandle::new(worker, runtime.child_token());
        match self.registry.attach_worker(p.id(), handle.clone()) {
            Ok(()) => Ok(Assignment { pending: p, handle }),
            Err(e) => Err((p, e)),
        }
    }
}
