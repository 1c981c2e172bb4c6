//! # Demo: random strings with an induced delay
//!
//! A producer submits a request every 50ms. Each request sleeps for a random
//! 100..1000ms and then returns a random alphanumeric string. Requests that
//! exceed the 500ms timeout resolve to the static fallback. The pool is
//! deliberately small, so bursts saturate it and the oldest admitted request
//! is evicted and re-admitted.
//!
//! Run with:
//! ```bash
//! RUST_LOG=info cargo run --example random_string --features logging
//! ```
//! Stop with Ctrl-C: the pool drains for up to `drain_timeout`.

use std::{sync::Arc, time::Duration};

use evictpool::{
    JobError, JobFn, JobRef, JobSpec, LogWriter, Pool, PoolConfig, PoolError, PoolState, Subscribe,
};
use rand::{Rng, distr::Alphanumeric};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const MAX_STRING_LENGTH: usize = 100;
const MIN_DELAY_MS: u64 = 100;
const MAX_DELAY_MS: u64 = 1000;
const TIMEOUT: Duration = Duration::from_millis(500);
const FALLBACK: &str = "FALLBACK!";

fn random_string() -> String {
    let mut rng = rand::rng();
    let len = rng.random_range(0..MAX_STRING_LENGTH);
    (&mut rng)
        .sample_iter(Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

fn random_string_job() -> JobRef<String> {
    JobFn::arc("random-string", |ctx: CancellationToken| async move {
        let delay = Duration::from_millis(rand::rng().random_range(MIN_DELAY_MS..MAX_DELAY_MS));
        tokio::select! {
            _ = ctx.cancelled() => Err(JobError::Canceled),
            _ = tokio::time::sleep(delay) => Ok(random_string()),
        }
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = PoolConfig {
        core_workers: 4,
        max_workers: 4,
        queue_capacity: 4,
        timeout: TIMEOUT,
        drain_timeout: Duration::from_secs(5),
        ..PoolConfig::default()
    };
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter)];
    let pool: Pool<String> = Pool::builder(cfg.clone()).with_subscribers(subs).build();

    let producer = {
        let pool = pool.clone();
        tokio::spawn(async move {
            let job = random_string_job();
            let mut tick = tokio::time::interval(Duration::from_millis(50));
            let mut request = 0u64;

            while pool.state() == PoolState::Open {
                tick.tick().await;
                request += 1;

                let spec = JobSpec::with_defaults(job.clone(), &cfg)
                    .with_fallback(|| FALLBACK.to_string());
                let handle = pool.submit(spec);
                tokio::spawn(async move {
                    match handle.await {
                        Ok(body) => info!(request, len = body.len(), %body, "response"),
                        Err(PoolError::Shutdown) => {}
                        Err(e) => warn!(request, error = %e, "request failed"),
                    }
                });
            }
        })
    };

    info!("serving random strings; press Ctrl-C to stop");
    pool.shutdown_on_signal().await?;
    producer.await?;

    let stats = pool.stats();
    info!(state = %stats.state, admitted = stats.admitted, "pool closed");
    Ok(())
}
