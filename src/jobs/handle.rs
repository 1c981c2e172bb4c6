//! # Completion handle.
//!
//! [`JobHandle`] is the caller's side of a submission: a future that resolves
//! **exactly once** with the job's value or a [`PoolError`]. The pool keeps the
//! matching [`Resolver`], which is consumed by value on resolution, so a second
//! resolution cannot be expressed.
//!
//! The handle follows the payload: when a task is evicted and re-admitted, the
//! same handle resolves when the re-admitted instance finishes.
//!
//! A resolver may also wrap a completion callback (see
//! [`Pool::submit_with`](crate::Pool::submit_with)). A callback resolver that is
//! dropped unresolved still fires once, with [`PoolError::Cancelled`].

use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tracing::warn;

use crate::core::TaskId;
use crate::error::PoolError;
use crate::subscribers::panic_message;

/// Future resolving to the outcome of a submitted job.
///
/// Dropping the handle does not cancel the job.
#[derive(Debug)]
#[must_use = "a JobHandle does nothing unless polled; drop it explicitly to detach"]
pub struct JobHandle<T> {
    id: TaskId,
    name: Arc<str>,
    rx: oneshot::Receiver<Result<T, PoolError>>,
}

impl<T> JobHandle<T> {
    /// Identity assigned to the first admission of this payload.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Job name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<T> Future for JobHandle<T> {
    type Output = Result<T, PoolError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(res)) => Poll::Ready(res),
            // Resolver dropped without an outcome: the runtime went away under the job.
            Poll::Ready(Err(_)) => Poll::Ready(Err(PoolError::Cancelled)),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Boxed completion callback.
pub(crate) type OnComplete<T> = Box<dyn FnOnce(Result<T, PoolError>) + Send + 'static>;

enum Sink<T> {
    Channel(oneshot::Sender<Result<T, PoolError>>),
    Callback(OnComplete<T>),
}

/// Pool side of a [`JobHandle`] or a completion callback.
pub(crate) struct Resolver<T> {
    sink: Option<Sink<T>>,
}

impl<T> Resolver<T> {
    /// Resolves the handle. A receiver that was dropped is not an error.
    pub(crate) fn resolve(mut self, res: Result<T, PoolError>) {
        if let Some(sink) = self.sink.take() {
            deliver(sink, res);
        }
    }
}

impl<T> Drop for Resolver<T> {
    fn drop(&mut self) {
        if let Some(Sink::Callback(f)) = self.sink.take() {
            deliver(Sink::Callback(f), Err(PoolError::Cancelled));
        }
    }
}

fn deliver<T>(sink: Sink<T>, res: Result<T, PoolError>) {
    match sink {
        Sink::Channel(tx) => {
            let _ = tx.send(res);
        }
        Sink::Callback(f) => {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(move || f(res))) {
                warn!(panic = %panic_message(&*panic), "completion callback panicked");
            }
        }
    }
}

/// Creates a connected resolver/handle pair.
pub(crate) fn channel<T>(id: TaskId, name: Arc<str>) -> (Resolver<T>, JobHandle<T>) {
    let (tx, rx) = oneshot::channel();
    (
        Resolver {
            sink: Some(Sink::Channel(tx)),
        },
        JobHandle { id, name, rx },
    )
}

/// Creates a resolver that invokes `f` with the outcome.
pub(crate) fn callback<T>(f: OnComplete<T>) -> Resolver<T> {
    Resolver {
        sink: Some(Sink::Callback(f)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[tokio::test]
    async fn test_resolves_once_with_value() {
        let (resolver, handle) = channel::<u8>(TaskId::from_raw(1), "t".into());
        resolver.resolve(Ok(5));
        assert_eq!(handle.await, Ok(5));
    }

    #[tokio::test]
    async fn test_dropped_resolver_reads_as_cancelled() {
        let (resolver, handle) = channel::<u8>(TaskId::from_raw(2), "t".into());
        drop(resolver);
        assert_eq!(handle.await, Err(PoolError::Cancelled));
    }

    #[test]
    fn test_callback_fires_once() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let resolver = callback::<u8>(Box::new(move |res| sink.lock().unwrap().push(res)));

        resolver.resolve(Ok(3));
        assert_eq!(*seen.lock().unwrap(), vec![Ok(3)]);
    }

    #[test]
    fn test_dropped_callback_reports_cancelled() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let resolver = callback::<u8>(Box::new(move |res| sink.lock().unwrap().push(res)));

        drop(resolver);
        assert_eq!(*seen.lock().unwrap(), vec![Err(PoolError::Cancelled)]);
    }

    #[test]
    fn test_panicking_callback_is_contained() {
        let resolver = callback::<u8>(Box::new(|_| panic!("boom")));
        resolver.resolve(Ok(1));
    }
}
