//! Pool lifecycle integration tests: completion, bounds, callbacks, decorators
//! and shutdown.

mod helpers;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use evictpool::{
    EventKind, JobError, JobFn, JobRef, JobSpec, Pool, PoolConfig, PoolError, PoolState,
};
use futures::future::join_all;
use helpers::{GUARD, blocking, count, drain_events, failing, sleeper};
use tokio::task::yield_now;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_idle_pool_completes_quickly() {
    let pool: Pool<String> = Pool::new(PoolConfig::fixed(2, 0));

    let handle = pool.submit(sleeper("quick", Duration::from_millis(10), "done"));
    let res = timeout(Duration::from_millis(100), handle)
        .await
        .expect("resolved within the bound");

    assert_eq!(res, Ok("done".to_string()));
    pool.shutdown(GUARD).await.expect("drained");
}

#[tokio::test]
async fn test_submit_after_shutdown_is_rejected() {
    let pool: Pool<String> = Pool::new(PoolConfig::fixed(2, 0));
    pool.shutdown(GUARD).await.expect("drained");
    assert_eq!(pool.state(), PoolState::Closed);

    let mut rx = pool.subscribe();
    let res = timeout(GUARD, pool.submit(sleeper("late", Duration::from_millis(1), "x")))
        .await
        .expect("resolved immediately");

    assert_eq!(res, Err(PoolError::Shutdown));
    assert_eq!(pool.stats().admitted, 0);

    let events = drain_events(&mut rx);
    assert_eq!(count(&events, EventKind::SubmitRejected), 1);
    assert_eq!(count(&events, EventKind::TaskAdmitted), 0);
}

#[tokio::test]
async fn test_bounds_hold_under_overflow() {
    let cfg = PoolConfig {
        core_workers: 2,
        max_workers: 3,
        queue_capacity: 2,
        ..PoolConfig::default()
    };
    let pool: Pool<String> = Pool::new(cfg);
    let mut rx = pool.subscribe();

    // Capacity is 3 running + 2 queued; the other five each evict once.
    let handles: Vec<_> = (0..10)
        .map(|_| pool.submit(sleeper("work", Duration::from_millis(30), "done")))
        .collect();

    let all = join_all(handles);
    tokio::pin!(all);
    let results = timeout(GUARD, async {
        loop {
            tokio::select! {
                res = &mut all => break res,
                _ = tokio::time::sleep(Duration::from_millis(1)) => {
                    let s = pool.stats();
                    assert!(s.workers <= 3, "workers {}", s.workers);
                    assert!(s.running <= 3, "running {}", s.running);
                    assert!(s.queued <= 2, "queued {}", s.queued);
                    assert!(s.deferred <= 5, "deferred {}", s.deferred);
                }
            }
        }
    })
    .await
    .expect("every task resolved");

    assert!(results.iter().all(|r| r.as_deref() == Ok("done")));

    let events = drain_events(&mut rx);
    assert_eq!(count(&events, EventKind::TaskEvicted), 5);
    assert_eq!(count(&events, EventKind::TaskReadmitted), 5);

    pool.shutdown(GUARD).await.expect("drained");
    assert_eq!(pool.stats().admitted, 0);
}

#[tokio::test]
async fn test_callback_invoked_exactly_once() {
    let pool: Pool<String> = Pool::new(PoolConfig::fixed(2, 1));
    let calls = Arc::new(AtomicUsize::new(0));
    let (tx, mut rx) = mpsc::unbounded_channel();

    let jobs = vec![
        sleeper("a", Duration::from_millis(20), "a"),
        sleeper("b", Duration::from_millis(20), "b"),
        failing("c"),
        sleeper("d", Duration::from_millis(20), "d"),
        sleeper("e", Duration::from_millis(20), "e"),
        sleeper("f", Duration::from_millis(20), "f"),
    ];
    for job in jobs {
        let calls = Arc::clone(&calls);
        let tx = tx.clone();
        pool.submit_with(job, move |res| {
            calls.fetch_add(1, Ordering::SeqCst);
            let _ = tx.send(res);
        });
    }
    drop(tx);

    let mut results = Vec::new();
    timeout(GUARD, async {
        while let Some(res) = rx.recv().await {
            results.push(res);
        }
    })
    .await
    .expect("every callback fired");

    pool.shutdown(GUARD).await.expect("drained");

    assert_eq!(calls.load(Ordering::SeqCst), 6);
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 5);
    assert!(results.contains(&Err(PoolError::Failed(JobError::fail("boom")))));
}

#[tokio::test]
async fn test_timeout_resolves_with_fallback() {
    let pool: Pool<String> = Pool::new(PoolConfig::fixed(2, 0));
    let mut rx = pool.subscribe();

    let spec = JobSpec::new(blocking("slow"))
        .with_timeout(Some(Duration::from_millis(20)))
        .with_fallback(|| "FALLBACK!".to_string());
    let res = timeout(GUARD, pool.submit(spec)).await.expect("resolved");
    assert_eq!(res, Ok("FALLBACK!".to_string()));

    let spec = JobSpec::new(blocking("slow")).with_timeout(Some(Duration::from_millis(20)));
    let res = timeout(GUARD, pool.submit(spec)).await.expect("resolved");
    assert!(matches!(res, Err(PoolError::Failed(JobError::Timeout { .. }))));

    pool.shutdown(GUARD).await.expect("drained");
    let events = drain_events(&mut rx);
    assert_eq!(count(&events, EventKind::TimeoutHit), 2);
    assert_eq!(count(&events, EventKind::FallbackUsed), 1);
}

#[tokio::test]
async fn test_default_timeout_from_config() {
    let mut cfg = PoolConfig::fixed(1, 0);
    cfg.timeout = Duration::from_millis(20);
    let pool: Pool<String> = Pool::new(cfg.clone());

    let spec = JobSpec::with_defaults(blocking("slow"), &cfg).with_fallback(|| "late".to_string());
    let res = timeout(GUARD, pool.submit(spec)).await.expect("resolved");

    assert_eq!(res, Ok("late".to_string()));
    pool.shutdown(GUARD).await.expect("drained");
}

#[tokio::test]
async fn test_panicking_job_fails_without_killing_worker() {
    let pool: Pool<String> = Pool::new(PoolConfig::fixed(1, 1));

    let explode = true;
    let job: JobRef<String> = JobFn::arc("explode", move |_ctx: CancellationToken| async move {
        if explode {
            panic!("kaboom");
        }
        Ok::<String, JobError>("unreachable".to_string())
    });
    let res = timeout(GUARD, pool.submit(job)).await.expect("resolved");
    match res {
        Err(PoolError::Failed(JobError::Panicked { message })) => assert!(message.contains("kaboom")),
        other => panic!("expected a panic failure, got {other:?}"),
    }

    let res = timeout(GUARD, pool.submit(sleeper("after", Duration::from_millis(1), "ok")))
        .await
        .expect("resolved");
    assert_eq!(res, Ok("ok".to_string()));
    pool.shutdown(GUARD).await.expect("drained");
}

#[tokio::test]
async fn test_shutdown_drains_queued_work() {
    let pool: Pool<String> = Pool::new(PoolConfig::fixed(1, 2));
    let mut rx = pool.subscribe();

    let handles: Vec<_> = ["one", "two", "three"]
        .into_iter()
        .map(|v| pool.submit(sleeper("drain", Duration::from_millis(10), v)))
        .collect();

    pool.shutdown(GUARD).await.expect("drained");
    assert_eq!(pool.state(), PoolState::Closed);

    let results = join_all(handles).await;
    assert_eq!(
        results,
        vec![Ok("one".to_string()), Ok("two".to_string()), Ok("three".to_string())]
    );

    let events = drain_events(&mut rx);
    assert_eq!(count(&events, EventKind::ShutdownRequested), 1);
    assert_eq!(count(&events, EventKind::AllDrainedWithin), 1);
    assert_eq!(count(&events, EventKind::WorkerRetired), 1);
}

#[tokio::test]
async fn test_shutdown_twice_is_ok() {
    let pool: Pool<String> = Pool::new(PoolConfig::fixed(1, 0));
    pool.shutdown(GUARD).await.expect("drained");
    pool.shutdown(GUARD).await.expect("already closed");
}

#[tokio::test]
async fn test_submit_while_draining_is_rejected() {
    let pool: Pool<String> = Pool::new(PoolConfig::fixed(1, 0));
    let running = pool.submit(sleeper("long", Duration::from_millis(150), "long"));

    let drain = tokio::spawn({
        let pool = pool.clone();
        async move { pool.shutdown(GUARD).await }
    });
    timeout(GUARD, async {
        while pool.state() != PoolState::ShuttingDown {
            yield_now().await;
        }
    })
    .await
    .expect("shutdown started");

    let mut rx = pool.subscribe();
    let res = timeout(GUARD, pool.submit(sleeper("late", Duration::from_millis(1), "x")))
        .await
        .expect("resolved immediately");
    assert_eq!(res, Err(PoolError::Shutdown));
    assert_eq!(pool.stats().admitted, 1);

    let events = drain_events(&mut rx);
    assert_eq!(count(&events, EventKind::SubmitRejected), 1);
    assert_eq!(count(&events, EventKind::TaskAdmitted), 0);

    drain.await.expect("drain task").expect("drained");
    assert_eq!(timeout(GUARD, running).await.expect("resolved"), Ok("long".to_string()));
}

#[tokio::test]
async fn test_idle_extra_worker_retires_after_keep_alive() {
    let cfg = PoolConfig {
        core_workers: 1,
        max_workers: 2,
        queue_capacity: 0,
        keep_alive: Duration::from_millis(50),
        ..PoolConfig::default()
    };
    let pool: Pool<String> = Pool::new(cfg);
    let mut rx = pool.subscribe();

    let a = pool.submit(sleeper("a", Duration::from_millis(10), "a"));
    let b = pool.submit(sleeper("b", Duration::from_millis(10), "b"));
    assert_eq!(pool.stats().workers, 2);
    let results = timeout(GUARD, join_all([a, b])).await.expect("resolved");
    assert_eq!(results, vec![Ok("a".to_string()), Ok("b".to_string())]);

    timeout(GUARD, async {
        while pool.stats().workers > 1 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("extra worker retired");

    // The core worker outlives further keep-alive periods.
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(pool.stats().workers, 1);

    let events = drain_events(&mut rx);
    assert_eq!(count(&events, EventKind::WorkerSpawned), 2);
    assert_eq!(count(&events, EventKind::WorkerRetired), 1);
    pool.shutdown(GUARD).await.expect("drained");
}
