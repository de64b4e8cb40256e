// Store wrapper recording when the reachability probe hits the store.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::time::Instant;

use crate::model::LeaseId;
use crate::registry::DEFAULT_SENTINEL_KEY;
use crate::store::{CoordinationStore, MemoryStore, RenewalStream, StoreError};

/// ProbeClock delegates to a [`MemoryStore`] and timestamps every read of
/// the sentinel key.
pub struct ProbeClock {
    inner: Arc<MemoryStore>,
    probes: Mutex<Vec<Instant>>,
}

impl ProbeClock {
    pub fn new(inner: Arc<MemoryStore>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            probes: Mutex::new(Vec::new()),
        })
    }

    pub fn probes(&self) -> Vec<Instant> {
        self.probes.lock().clone()
    }

    pub fn probe_count(&self) -> usize {
        self.probes.lock().len()
    }
}

#[async_trait]
impl CoordinationStore for ProbeClock {
    async fn grant_lease(&self, ttl_seconds: i64) -> Result<LeaseId, StoreError> {
        self.inner.grant_lease(ttl_seconds).await
    }

    async fn revoke_lease(&self, lease_id: LeaseId) -> Result<(), StoreError> {
        self.inner.revoke_lease(lease_id).await
    }

    async fn put(&self, key: &str, value: Vec<u8>, lease_id: LeaseId) -> Result<(), StoreError> {
        self.inner.put(key, value, lease_id).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.inner.delete(key).await
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        if key == DEFAULT_SENTINEL_KEY {
            self.probes.lock().push(Instant::now());
        }
        self.inner.get(key).await
    }

    async fn open_renewal_stream(&self, lease_id: LeaseId) -> Result<RenewalStream, StoreError> {
        self.inner.open_renewal_stream(lease_id).await
    }
}

/// ClosingRenewals hands out renewal streams that close at once while the
/// lease itself stays alive in the wrapped store.
pub struct ClosingRenewals {
    inner: Arc<MemoryStore>,
}

impl ClosingRenewals {
    pub fn new(inner: Arc<MemoryStore>) -> Arc<Self> {
        Arc::new(Self { inner })
    }
}

#[async_trait]
impl CoordinationStore for ClosingRenewals {
    async fn grant_lease(&self, ttl_seconds: i64) -> Result<LeaseId, StoreError> {
        self.inner.grant_lease(ttl_seconds).await
    }

    async fn revoke_lease(&self, lease_id: LeaseId) -> Result<(), StoreError> {
        self.inner.revoke_lease(lease_id).await
    }

    async fn put(&self, key: &str, value: Vec<u8>, lease_id: LeaseId) -> Result<(), StoreError> {
        self.inner.put(key, value, lease_id).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.inner.delete(key).await
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.inner.get(key).await
    }

    async fn open_renewal_stream(&self, _lease_id: LeaseId) -> Result<RenewalStream, StoreError> {
        let (tx, _stop, stream) = RenewalStream::channel();
        drop(tx);
        Ok(stream)
    }
}
