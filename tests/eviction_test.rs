//! Eviction integration tests: who gets evicted, what happens to the evicted
//! payload, and how eviction interacts with shutdown.

mod helpers;

use std::sync::Arc;
use std::time::{Duration, Instant};

use evictpool::{
    EventKind, JobSpec, Pool, PoolConfig, PoolError, Registry, RuntimeError, TaskId,
};
use futures::FutureExt;
use futures::future::join_all;
use helpers::{GUARD, blocking, count, drain_events, failing, sleeper};
use tokio::sync::mpsc;
use tokio::time::timeout;

#[test]
fn test_registry_selects_oldest_admission() {
    let mut registry = Registry::new();
    let now = Instant::now();
    let (t1, t2, t3) = (TaskId::next(), TaskId::next(), TaskId::next());

    registry.record(t2, Arc::from("t2"), now + Duration::from_millis(2)).expect("recorded");
    registry.record(t1, Arc::from("t1"), now).expect("recorded");
    registry.record(t3, Arc::from("t3"), now + Duration::from_millis(2)).expect("recorded");

    let order: Vec<_> = std::iter::from_fn(|| registry.pop_oldest().map(|e| e.id)).collect();
    assert_eq!(order, vec![t1, t2, t3]);
}

#[tokio::test]
async fn test_saturated_submit_evicts_oldest_running() {
    let pool: Pool<String> = Pool::new(PoolConfig::fixed(3, 0));
    let h1 = pool.submit(blocking("t1"));
    let mut h2 = pool.submit(blocking("t2"));
    let mut h3 = pool.submit(blocking("t3"));

    let mut rx = pool.subscribe();
    let h4 = pool.submit(sleeper("t4", Duration::from_millis(10), "four"));

    // Eviction happens inside `submit`.
    let evicted: Vec<_> = drain_events(&mut rx)
        .into_iter()
        .filter(|e| e.kind == EventKind::TaskEvicted)
        .collect();
    assert_eq!(evicted.len(), 1);
    assert_eq!(evicted[0].task_id, Some(h1.id()));

    assert_eq!(timeout(GUARD, h4).await.expect("resolved"), Ok("four".to_string()));
    assert!((&mut h2).now_or_never().is_none());
    assert!((&mut h3).now_or_never().is_none());

    let err = pool
        .shutdown(Duration::from_millis(50))
        .await
        .expect_err("blocking jobs outlive the drain");
    assert!(matches!(err, RuntimeError::GraceExceeded { .. }));

    for h in [h1, h2, h3] {
        assert_eq!(timeout(GUARD, h).await.expect("resolved"), Err(PoolError::Cancelled));
    }
}

#[tokio::test]
async fn test_fast_task_resolves_before_evicted_ones() {
    let pool: Pool<String> = Pool::new(PoolConfig::fixed(2, 0));

    let mut h1 = pool.submit(blocking("task1"));
    let mut h2 = pool.submit(blocking("task2"));
    let mut rx = pool.subscribe();
    let h3 = pool.submit(JobSpec::new(failing("task3")).with_fallback(|| "fallback3".to_string()));

    let res3 = timeout(GUARD, h3).await.expect("task3 resolved");
    assert_eq!(res3, Ok("fallback3".to_string()));
    assert!((&mut h1).now_or_never().is_none());
    assert!((&mut h2).now_or_never().is_none());

    let evicted: Vec<_> = drain_events(&mut rx)
        .into_iter()
        .filter(|e| e.kind == EventKind::TaskEvicted)
        .collect();
    assert_eq!(evicted.len(), 1);
    assert_eq!(evicted[0].task_id, Some(h1.id()));

    let err = pool
        .shutdown(Duration::from_millis(50))
        .await
        .expect_err("blocking jobs outlive the drain");
    match err {
        RuntimeError::GraceExceeded { mut stuck, .. } => {
            stuck.sort();
            assert_eq!(stuck, vec!["task1".to_string(), "task2".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(timeout(GUARD, h1).await.expect("resolved"), Err(PoolError::Cancelled));
    assert_eq!(timeout(GUARD, h2).await.expect("resolved"), Err(PoolError::Cancelled));
}

#[tokio::test]
async fn test_evicted_task_completes_once_load_subsides() {
    let pool: Pool<String> = Pool::new(PoolConfig::fixed(1, 0));
    let mut rx = pool.subscribe();

    let h1 = pool.submit(sleeper("first", Duration::from_millis(30), "one"));
    let h2 = pool.submit(sleeper("second", Duration::from_millis(10), "two"));

    let (r1, r2) = timeout(GUARD, futures::future::join(h1, h2))
        .await
        .expect("both resolved");
    assert_eq!(r1, Ok("one".to_string()));
    assert_eq!(r2, Ok("two".to_string()));

    let events = drain_events(&mut rx);
    let readmitted: Vec<_> = events
        .iter()
        .filter(|e| e.kind == EventKind::TaskReadmitted)
        .collect();
    assert_eq!(readmitted.len(), 1);
    assert_eq!(readmitted[0].task.as_deref(), Some("first"));
    assert_eq!(readmitted[0].attempt, Some(2));

    pool.shutdown(GUARD).await.expect("drained");
}

#[tokio::test]
async fn test_readmission_waits_instead_of_evicting() {
    let pool: Pool<String> = Pool::new(PoolConfig::fixed(2, 0));
    let mut rx = pool.subscribe();

    let h1 = pool.submit(sleeper("a", Duration::from_millis(40), "a"));
    let h2 = pool.submit(sleeper("b", Duration::from_millis(40), "b"));
    let h3 = pool.submit(sleeper("c", Duration::from_millis(40), "c"));

    let results = timeout(GUARD, futures::future::join3(h1, h2, h3))
        .await
        .expect("all resolved");
    assert_eq!(
        results,
        (Ok("a".to_string()), Ok("b".to_string()), Ok("c".to_string()))
    );

    // One overflow, one eviction: "a" waited for a free worker.
    let events = drain_events(&mut rx);
    assert_eq!(count(&events, EventKind::TaskEvicted), 1);
    assert_eq!(count(&events, EventKind::TaskReadmitted), 1);

    pool.shutdown(GUARD).await.expect("drained");
}

#[tokio::test]
async fn test_grace_exceeded_cancels_unstarted() {
    let pool: Pool<String> = Pool::new(PoolConfig::fixed(1, 2));
    let mut rx = pool.subscribe();

    let running = pool.submit(blocking("running"));
    let q1 = pool.submit(sleeper("queued", Duration::from_millis(1), "q1"));
    let q2 = pool.submit(sleeper("queued", Duration::from_millis(1), "q2"));

    let err = pool
        .shutdown(Duration::from_millis(30))
        .await
        .expect_err("the running job never finishes on its own");
    match err {
        RuntimeError::GraceExceeded { stuck, grace } => {
            assert_eq!(grace, Duration::from_millis(30));
            assert!(stuck.contains(&"running".to_string()));
        }
        other => panic!("unexpected error: {other}"),
    }

    for h in [running, q1, q2] {
        assert_eq!(timeout(GUARD, h).await.expect("resolved"), Err(PoolError::Cancelled));
    }
    let events = drain_events(&mut rx);
    assert_eq!(count(&events, EventKind::GraceExceeded), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_submit_while_worker_settles_is_admitted() {
    let pool: Pool<String> = Pool::new(PoolConfig::fixed(1, 0));
    let mut rx = pool.subscribe();
    let (tx, mut done) = mpsc::unbounded_channel();

    // The callback holds the only worker after its registry entry is gone.
    pool.submit_with(sleeper("slow-callback", Duration::from_millis(1), "first"), move |res| {
        std::thread::sleep(Duration::from_millis(300));
        let _ = tx.send(res);
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let stats = pool.stats();
    assert_eq!((stats.running, stats.admitted), (1, 0));

    let res = timeout(GUARD, pool.submit(sleeper("second", Duration::from_millis(1), "two")))
        .await
        .expect("resolved");
    assert_eq!(res, Ok("two".to_string()));
    assert_eq!(
        timeout(GUARD, done.recv()).await.expect("callback fired"),
        Some(Ok("first".to_string()))
    );

    let events = drain_events(&mut rx);
    assert_eq!(count(&events, EventKind::SubmitRejected), 0);
    assert_eq!(count(&events, EventKind::TaskEvicted), 0);
    pool.shutdown(GUARD).await.expect("drained");
}

#[tokio::test]
async fn test_deferred_work_is_bounded_under_sustained_overload() {
    let cfg = PoolConfig::fixed(1, 0);
    let cap = cfg.effective_deferred();
    let pool: Pool<String> = Pool::new(cfg);
    let mut rx = pool.subscribe();

    let handles: Vec<_> = (0..50)
        .map(|_| pool.submit(sleeper("burst", Duration::from_millis(5), "done")))
        .collect();

    let all = join_all(handles);
    tokio::pin!(all);
    let results = timeout(GUARD, async {
        loop {
            tokio::select! {
                res = &mut all => break res,
                _ = tokio::time::sleep(Duration::from_millis(1)) => {
                    let deferred = pool.stats().deferred;
                    assert!(deferred <= cap, "deferred {deferred} over {cap}");
                }
            }
        }
    })
    .await
    .expect("every task resolved");

    let ok = results.iter().filter(|r| r.as_deref() == Ok("done")).count();
    let shed = results.iter().filter(|r| **r == Err(PoolError::Cancelled)).count();
    assert_eq!(ok + shed, 50);
    assert!(ok >= 1);
    assert!(shed >= 1);

    let shed_events = drain_events(&mut rx)
        .into_iter()
        .filter(|e| {
            e.kind == EventKind::TaskCancelled
                && e.reason.as_deref() == Some("deferred capacity exceeded")
        })
        .count();
    assert_eq!(shed_events, shed);

    pool.shutdown(GUARD).await.expect("drained");
}
