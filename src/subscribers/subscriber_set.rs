//! # Event fan-out.
//!
//! [`SubscriberSet`] gives every subscriber a bounded queue and a worker task,
//! so [`emit`](SubscriberSet::emit) never waits on user code.
//!
//! ```text
//! emit(event) ─┬─ accepts? ──► [queue 1] ──► worker 1 ──► on_event()
//!              │                                 └──────► panic → SubscriberPanicked
//!              └─ accepts? ──► [queue N] ──► worker N ──► on_event()
//!                   full/closed → SubscriberOverflow
//! ```
//!
//! A subscriber that panics while holding a lock may leave its own state
//! inconsistent; the panic is caught with `AssertUnwindSafe`.

use std::sync::Arc;

use futures::FutureExt;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::events::{Bus, Event};
use crate::subscribers::Subscribe;

struct Route {
    sub: Arc<dyn Subscribe>,
    tx: mpsc::Sender<Arc<Event>>,
}

/// Subscribers of one pool, each behind its own queue.
pub struct SubscriberSet {
    routes: Vec<Route>,
    workers: Vec<JoinHandle<()>>,
    bus: Bus,
}

impl SubscriberSet {
    /// Spawns one worker per subscriber. Must be called inside a tokio runtime.
    ///
    /// Overflow and panic reports go to `bus`.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>, bus: Bus) -> Self {
        let mut routes = Vec::with_capacity(subs.len());
        let mut workers = Vec::with_capacity(subs.len());

        for sub in subs {
            let (tx, rx) = mpsc::channel::<Arc<Event>>(sub.queue_capacity().max(1));
            workers.push(tokio::spawn(deliver(Arc::clone(&sub), rx, bus.clone())));
            routes.push(Route { sub, tx });
        }
        Self {
            routes,
            workers,
            bus,
        }
    }

    /// Queues `event` for every subscriber that accepts its kind.
    ///
    /// Never blocks. A subscriber whose queue is full or closed misses the
    /// event, and a `SubscriberOverflow` is published unless the event is one.
    pub fn emit(&self, event: &Event) {
        let mut shared: Option<Arc<Event>> = None;

        for route in self.routes.iter().filter(|r| r.sub.accepts(event.kind)) {
            let ev = Arc::clone(shared.get_or_insert_with(|| Arc::new(event.clone())));
            let reason = match route.tx.try_send(ev) {
                Ok(()) => continue,
                Err(mpsc::error::TrySendError::Full(_)) => "full",
                Err(mpsc::error::TrySendError::Closed(_)) => "closed",
            };
            if !event.is_subscriber_overflow() {
                self.bus
                    .publish(Event::subscriber_overflow(route.sub.name(), reason));
            }
        }
    }

    /// Closes every queue and waits for the workers to finish what they hold.
    pub async fn shutdown(self) {
        drop(self.routes);
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

async fn deliver(sub: Arc<dyn Subscribe>, mut rx: mpsc::Receiver<Arc<Event>>, bus: Bus) {
    while let Some(ev) = rx.recv().await {
        let res = std::panic::AssertUnwindSafe(sub.on_event(&ev))
            .catch_unwind()
            .await;
        if let Err(panic) = res {
            bus.publish(Event::subscriber_panicked(sub.name(), panic_message(&*panic)));
        }
    }
}

/// Renders a panic payload as text.
pub(crate) fn panic_message(any: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = any.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = any.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
