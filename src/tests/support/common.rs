// Common helpers for scenario tests.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::model::ServiceDescriptor;
use crate::registry::{FailureKind, HeartbeatPolicy, Registrar, RegistrarBuilder, RetryPolicy};
use crate::store::{CoordinationStore, MemoryStore};

pub const TTL: i64 = 9;

pub fn descriptor(service: &str, instance: &str) -> ServiceDescriptor {
    ServiceDescriptor::new(service, instance, "10.0.0.1:8080", TTL)
}

/// Retry policy with a 1s start, doubling, capped at 30s.
pub fn retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        enabled: true,
        max_attempts,
        initial_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(30),
        backoff_multiplier: 2.0,
    }
}

/// Builder over `store` with a fast heartbeat poll.
pub fn builder(store: Arc<dyn CoordinationStore>) -> RegistrarBuilder {
    Registrar::builder(store).heartbeat(HeartbeatPolicy {
        poll_interval: Duration::from_secs(1),
        stale_after_intervals: 3,
    })
}

pub fn memory_store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new())
}

/// Failure callback feeding a channel the test can drain.
pub fn recording_callback() -> (
    impl Fn(FailureKind) + Send + Sync + 'static,
    mpsc::UnboundedReceiver<FailureKind>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let callback = move |kind: FailureKind| {
        let _ = tx.send(kind);
    };
    (callback, rx)
}

/// Polls `cond` every 10ms until it holds or `limit` elapses.
pub async fn wait_until<F, Fut>(limit: Duration, mut cond: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        if cond().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// True when `actual` is within 20ms of `expected`.
pub fn close_to(actual: Duration, expected: Duration) -> bool {
    let diff = if actual > expected { actual - expected } else { expected - actual };
    diff <= Duration::from_millis(20)
}
