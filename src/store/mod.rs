//! Coordination store adapter: the narrow contract this crate needs from a
//! lease-based key/value store, plus the in-memory and etcd implementations.

pub mod error;
pub mod memory;
#[cfg(feature = "etcd")]
pub mod etcd;

#[cfg(test)]
mod memory_test;

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::model::LeaseId;

pub use error::StoreError;
pub use memory::{Call, MemoryStore};
#[cfg(feature = "etcd")]
pub use etcd::{EtcdOptions, EtcdStore};

// Buffered acks between the adapter's renewer and the heartbeat monitor
const RENEWAL_BUFFER: usize = 16;

/// RenewalAck confirms that a lease was extended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenewalAck {
    pub lease_id: LeaseId,
    /// Remaining TTL reported by the store after the renewal.
    pub ttl_seconds: i64,
}

/// RenewalStream is the receiving end of a lease's keep-alive loop.
///
/// The adapter keeps renewing until the stop token is cancelled, the lease
/// is lost, or the receiver is dropped. Closure of `acks` is the
/// authoritative "renewal can no longer be sustained" signal.
pub struct RenewalStream {
    acks: mpsc::Receiver<RenewalAck>,
    stop: CancellationToken,
}

impl RenewalStream {
    /// Creates a stream together with the sender and stop token the
    /// adapter's renewer task drives.
    pub fn channel() -> (mpsc::Sender<RenewalAck>, CancellationToken, RenewalStream) {
        let (tx, acks) = mpsc::channel(RENEWAL_BUFFER);
        let stop = CancellationToken::new();
        let stream = RenewalStream {
            acks,
            stop: stop.clone(),
        };
        (tx, stop, stream)
    }

    /// Splits the stream into a guard that stops renewing when dropped and
    /// the ack receiver.
    pub fn into_parts(self) -> (DropGuard, mpsc::Receiver<RenewalAck>) {
        (self.stop.drop_guard(), self.acks)
    }
}

/// CoordinationStore is the contract every backing store must satisfy.
///
/// Transport and timeout failures must be reported distinctly from
/// [`StoreError::NotFound`] so callers can tell "reachable but empty" from
/// "unreachable".
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    /// Grants a lease of `ttl_seconds`.
    async fn grant_lease(&self, ttl_seconds: i64) -> Result<LeaseId, StoreError>;

    /// Revokes a lease and every key bound to it. Revoking an unknown lease succeeds.
    async fn revoke_lease(&self, lease_id: LeaseId) -> Result<(), StoreError>;

    /// Writes `value` under `key`, bound to `lease_id`.
    async fn put(&self, key: &str, value: Vec<u8>, lease_id: LeaseId) -> Result<(), StoreError>;

    /// Removes `key`. Removing an absent key succeeds.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Reads `key`, failing with [`StoreError::NotFound`] when it is absent.
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Starts renewing `lease_id` and returns the ack stream.
    async fn open_renewal_stream(&self, lease_id: LeaseId) -> Result<RenewalStream, StoreError>;
}

/// Runs a store call under `limit`, mapping expiry to [`StoreError::Timeout`].
pub async fn bounded<T, F>(limit: Duration, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(res) => res,
        Err(_) => Err(StoreError::Timeout(limit)),
    }
}

/// Keep-alive cadence for a lease: a third of the TTL, never below one second.
pub fn renewal_interval(ttl_seconds: i64) -> Duration {
    Duration::from_secs((ttl_seconds.max(3) / 3) as u64)
}
