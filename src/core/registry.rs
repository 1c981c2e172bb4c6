//! # Task registry - ordered index of admitted tasks.
//!
//! The registry holds exactly the task instances that are queued or running.
//! It is the only structure consulted on overflow, to find the eviction candidate.
//!
//! ## Architecture
//! ```text
//! record(id, name, at) ──► AdmissionKey { at, seq } ──► BTreeMap<AdmissionKey, Entry>
//!                                                           ▲
//!                               HashMap<TaskId, AdmissionKey>  (id → key index)
//!
//! oldest()      = first entry of the BTreeMap           O(log n)
//! pop_oldest()  = select + remove in one step           O(log n)
//! remove(id)    = index lookup + BTreeMap removal       O(log n)
//! ```
//!
//! ## Rules
//! - Keys are computed once on `record` and never change.
//! - `seq` breaks timestamp ties, so "oldest" is always unique.
//! - `remove` is idempotent; an already removed entry is a no-op.
//! - The registry is not synchronized on its own: the pool serializes every
//!   call under the same lock that guards its queue.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::core::worker::WorkerHandle;
use crate::error::RegistryError;

/// Process-wide task identity counter.
static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one admission instance.
///
/// A re-admitted payload receives a new identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    /// Allocates a fresh process-unique identity.
    pub fn next() -> Self {
        TaskId(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[cfg(test)]
    pub(crate) fn from_raw(raw: u64) -> Self {
        TaskId(raw)
    }

    /// Raw numeric value.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Eviction priority: smaller is older.
///
/// `at` is a monotonic instant and only meaningful inside this process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AdmissionKey {
    /// Admission instant.
    pub at: Instant,
    /// Registry insertion sequence (tie-breaker).
    pub seq: u64,
}

/// One admitted task instance.
#[derive(Clone, Debug)]
pub struct Entry {
    /// Instance identity.
    pub id: TaskId,
    /// Ordering key.
    pub key: AdmissionKey,
    /// Job name (for logs and stuck-task reports).
    pub name: Arc<str>,
    /// Worker executing the task; `None` while queued.
    pub worker: Option<WorkerHandle>,
}

impl Entry {
    /// True once a worker has been attached.
    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }
}

/// Ordered index of admitted tasks.
#[derive(Debug, Default)]
pub struct Registry {
    order: BTreeMap<AdmissionKey, Entry>,
    index: HashMap<TaskId, AdmissionKey>,
    next_seq: u64,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a newly admitted task.
    pub fn record(
        &mut self,
        id: TaskId,
        name: Arc<str>,
        at: Instant,
    ) -> Result<AdmissionKey, RegistryError> {
        if self.index.contains_key(&id) {
            return Err(RegistryError::DuplicateEntry(id));
        }
        let key = AdmissionKey {
            at,
            seq: self.next_seq,
        };
        self.next_seq += 1;

        self.index.insert(id, key);
        self.order.insert(
            key,
            Entry {
                id,
                key,
                name,
                worker: None,
            },
        );
        Ok(key)
    }

    /// Removes a task; returns the entry if it was still present.
    pub fn remove(&mut self, id: TaskId) -> Option<Entry> {
        let key = self.index.remove(&id)?;
        self.order.remove(&key)
    }

    /// Returns the entry with the smallest `(at, seq)` key.
    pub fn oldest(&self) -> Option<&Entry> {
        self.order.first_key_value().map(|(_, e)| e)
    }

    /// Selects and removes the oldest entry in one step.
    ///
    /// Once popped, no other path can select the same entry again.
    pub fn pop_oldest(&mut self) -> Option<Entry> {
        let (_, entry) = self.order.pop_first()?;
        self.index.remove(&entry.id);
        Some(entry)
    }

    /// Marks a queued task as running on `worker`.
    pub fn attach_worker(&mut self, id: TaskId, worker: WorkerHandle) -> Result<(), RegistryError> {
        let key = self
            .index
            .get(&id)
            .ok_or(RegistryError::UnknownTask(id))?;
        let entry = self
            .order
            .get_mut(key)
            .ok_or(RegistryError::UnknownTask(id))?;
        entry.worker = Some(worker);
        Ok(())
    }

    /// Returns the entry for `id`, if admitted.
    pub fn get(&self, id: TaskId) -> Option<&Entry> {
        self.index.get(&id).and_then(|key| self.order.get(key))
    }

    /// True if `id` is admitted.
    pub fn contains(&self, id: TaskId) -> bool {
        self.index.contains_key(&id)
    }

    /// Number of admitted tasks.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// True if nothing is admitted.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Returns names of admitted tasks in admission order.
    pub fn names(&self) -> Vec<String> {
        self.order.values().map(|e| e.name.to_string()).collect()
    }
}
