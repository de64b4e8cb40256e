// Package store provides an in-process lease store.
//
// MemoryStore honours the full adapter contract (lease-bound keys, revoke
// cascades, renewal streams) and records every call it receives. Faults can
// be switched on at runtime to exercise failure paths.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{renewal_interval, CoordinationStore, RenewalAck, RenewalStream, StoreError};
use crate::model::LeaseId;

/// Call is one adapter operation observed by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    GrantLease(i64),
    RevokeLease(LeaseId),
    Put(String, LeaseId),
    Delete(String),
    Get(String),
    OpenRenewalStream(LeaseId),
}

struct LeaseEntry {
    ttl_seconds: i64,
    keys: BTreeSet<String>,
    // Cancelled when the lease goes away; renewers watch it.
    lost: CancellationToken,
}

#[derive(Default)]
struct State {
    kv: HashMap<String, (Vec<u8>, LeaseId)>,
    leases: HashMap<LeaseId, LeaseEntry>,
}

#[derive(Default)]
struct Faults {
    grant: AtomicBool,
    put: AtomicBool,
    keepalive: AtomicBool,
    unreachable: AtomicBool,
}

/// MemoryStore keeps keys and leases in memory.
pub struct MemoryStore {
    state: Mutex<State>,
    journal: Mutex<Vec<Call>>,
    faults: Faults,
    next_lease: AtomicI64,
    renew_every: Option<Duration>,
}

impl MemoryStore {
    /// Creates a store that renews leases every `ttl/3`.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            journal: Mutex::new(Vec::new()),
            faults: Faults::default(),
            next_lease: AtomicI64::new(1),
            renew_every: None,
        }
    }

    /// Creates a store with a fixed renewal cadence regardless of TTL.
    pub fn with_renewal_interval(interval: Duration) -> Self {
        Self {
            renew_every: Some(interval),
            ..Self::new()
        }
    }

    pub fn fail_grant(&self, on: bool) {
        self.faults.grant.store(on, Ordering::Relaxed);
    }

    pub fn fail_put(&self, on: bool) {
        self.faults.put.store(on, Ordering::Relaxed);
    }

    pub fn fail_keepalive(&self, on: bool) {
        self.faults.keepalive.store(on, Ordering::Relaxed);
    }

    /// Makes every call fail with a transport error.
    pub fn set_unreachable(&self, on: bool) {
        self.faults.unreachable.store(on, Ordering::Relaxed);
    }

    /// Drops a lease as if its TTL ran out store-side: bound keys vanish and
    /// any renewal stream for it closes.
    pub fn expire_lease(&self, lease_id: LeaseId) -> bool {
        let mut state = self.state.lock();
        Self::drop_lease(&mut state, lease_id)
    }

    /// Raw value stored under `key`.
    pub fn value(&self, key: &str) -> Option<Vec<u8>> {
        self.state.lock().kv.get(key).map(|(v, _)| v.clone())
    }

    /// Lease the key is bound to.
    pub fn lease_of(&self, key: &str) -> Option<LeaseId> {
        self.state.lock().kv.get(key).map(|(_, lease)| *lease)
    }

    /// TTL a live lease was granted with.
    pub fn lease_ttl(&self, lease_id: LeaseId) -> Option<i64> {
        self.state.lock().leases.get(&lease_id).map(|l| l.ttl_seconds)
    }

    /// Ids of all leases still alive, ascending.
    pub fn live_leases(&self) -> Vec<LeaseId> {
        let mut ids: Vec<LeaseId> = self.state.lock().leases.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.state.lock().kv.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.journal.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.journal.lock().len()
    }

    fn record(&self, call: Call) -> Result<(), StoreError> {
        self.journal.lock().push(call);
        if self.faults.unreachable.load(Ordering::Relaxed) {
            return Err(StoreError::Transport("connection refused".to_string()));
        }
        Ok(())
    }

    fn drop_lease(state: &mut State, lease_id: LeaseId) -> bool {
        let Some(entry) = state.leases.remove(&lease_id) else {
            return false;
        };
        for key in &entry.keys {
            state.kv.remove(key);
        }
        entry.lost.cancel();
        true
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CoordinationStore for MemoryStore {
    async fn grant_lease(&self, ttl_seconds: i64) -> Result<LeaseId, StoreError> {
        self.record(Call::GrantLease(ttl_seconds))?;
        if self.faults.grant.load(Ordering::Relaxed) {
            return Err(StoreError::Backend("lease grant rejected".to_string()));
        }
        if ttl_seconds <= 0 {
            return Err(StoreError::Backend(format!("invalid lease ttl {ttl_seconds}")));
        }

        let id = self.next_lease.fetch_add(1, Ordering::Relaxed);
        self.state.lock().leases.insert(
            id,
            LeaseEntry {
                ttl_seconds,
                keys: BTreeSet::new(),
                lost: CancellationToken::new(),
            },
        );
        debug!(component = "memory-store", event = "lease_granted", lease_id = id, ttl_seconds);
        Ok(id)
    }

    async fn revoke_lease(&self, lease_id: LeaseId) -> Result<(), StoreError> {
        self.record(Call::RevokeLease(lease_id))?;
        let mut state = self.state.lock();
        if Self::drop_lease(&mut state, lease_id) {
            debug!(component = "memory-store", event = "lease_revoked", lease_id);
        }
        Ok(())
    }

    async fn put(&self, key: &str, value: Vec<u8>, lease_id: LeaseId) -> Result<(), StoreError> {
        self.record(Call::Put(key.to_string(), lease_id))?;
        if self.faults.put.load(Ordering::Relaxed) {
            return Err(StoreError::Backend("put rejected".to_string()));
        }

        let mut state = self.state.lock();
        let Some(entry) = state.leases.get_mut(&lease_id) else {
            return Err(StoreError::LeaseNotFound(lease_id));
        };
        entry.keys.insert(key.to_string());

        if let Some((_, prev)) = state.kv.insert(key.to_string(), (value, lease_id)) {
            if prev != lease_id {
                if let Some(old) = state.leases.get_mut(&prev) {
                    old.keys.remove(key);
                }
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.record(Call::Delete(key.to_string()))?;
        let mut state = self.state.lock();
        if let Some((_, lease_id)) = state.kv.remove(key) {
            if let Some(entry) = state.leases.get_mut(&lease_id) {
                entry.keys.remove(key);
            }
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.record(Call::Get(key.to_string()))?;
        self.state
            .lock()
            .kv
            .get(key)
            .map(|(v, _)| v.clone())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn open_renewal_stream(&self, lease_id: LeaseId) -> Result<RenewalStream, StoreError> {
        self.record(Call::OpenRenewalStream(lease_id))?;
        if self.faults.keepalive.load(Ordering::Relaxed) {
            return Err(StoreError::Backend("keepalive rejected".to_string()));
        }

        let (ttl_seconds, lost) = {
            let state = self.state.lock();
            let entry = state
                .leases
                .get(&lease_id)
                .ok_or(StoreError::LeaseNotFound(lease_id))?;
            (entry.ttl_seconds, entry.lost.clone())
        };
        let every = self.renew_every.unwrap_or_else(|| renewal_interval(ttl_seconds));

        let (tx, stop, stream) = RenewalStream::channel();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = lost.cancelled() => break,
                    _ = ticker.tick() => {
                        let ack = RenewalAck { lease_id, ttl_seconds };
                        match tx.try_send(ack) {
                            Ok(()) | Err(TrySendError::Full(_)) => {}
                            Err(TrySendError::Closed(_)) => break,
                        }
                    }
                }
            }
            debug!(component = "memory-store", event = "renewer_stopped", lease_id);
        });

        Ok(stream)
    }
}
