// Package registry provides the registration state machine.
//
// One Registrar owns one registration. Every caller-facing operation takes
// the exclusive lock over Inner for its whole duration, so operations on the
// identity are totally ordered and a later Register always wins.

use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info, info_span, warn, Instrument, Span};

use super::error::{FailureCallback, FailureKind, RegistryError};
use super::heartbeat::{self, MonitorExit};
use super::policy::{HeartbeatPolicy, ProbePolicy, RetryPolicy};
use super::recovery::{self, RecoveryExit};
use super::supervisor::Supervisor;
use crate::metrics;
use crate::model::{LeaseHandle, LeaseId, Metadata, ServiceDescriptor};
use crate::store::{bounded, CoordinationStore, RenewalAck};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

/// RegistrationState as seen by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationState {
    #[default]
    Unregistered,
    Registered,
}

/// Read-only view of the registrar.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub state: RegistrationState,
    pub descriptor: Option<ServiceDescriptor>,
    pub lease: Option<LeaseHandle>,
    /// True while a recovery run is trying to restore the registration.
    pub recovering: bool,
}

// Everything guarded by the exclusive lock, mutated only as one unit.
#[derive(Default)]
struct Inner {
    state: RegistrationState,
    descriptor: Option<ServiceDescriptor>,
    lease: Option<LeaseHandle>,
    // Dropping the guard stops the adapter's renewer.
    renewal: Option<DropGuard>,
    // Scope of the running monitor or recovery task.
    scope: Option<CancellationToken>,
}

/// Registrar publishes a service instance into the coordination store and
/// keeps it alive.
pub struct Registrar {
    store: Arc<dyn CoordinationStore>,
    retry: RetryPolicy,
    heartbeat: HeartbeatPolicy,
    probe: ProbePolicy,
    request_timeout: Duration,
    on_failure: Option<FailureCallback>,
    span: Span,
    root: CancellationToken,
    inner: RwLock<Inner>,
    supervisor: Supervisor,
}

/// Builder for [`Registrar`].
pub struct RegistrarBuilder {
    store: Arc<dyn CoordinationStore>,
    retry: RetryPolicy,
    heartbeat: HeartbeatPolicy,
    probe: ProbePolicy,
    request_timeout: Duration,
    on_failure: Option<FailureCallback>,
    span: Option<Span>,
    shutdown_token: Option<CancellationToken>,
}

impl RegistrarBuilder {
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn heartbeat(mut self, heartbeat: HeartbeatPolicy) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    pub fn probe(mut self, probe: ProbePolicy) -> Self {
        self.probe = probe;
        self
    }

    /// Bound applied to every grant/put/delete/revoke call.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Callback receiving asynchronous failures.
    pub fn on_failure<F>(mut self, callback: F) -> Self
    where
        F: Fn(FailureKind) + Send + Sync + 'static,
    {
        self.on_failure = Some(Arc::new(callback));
        self
    }

    /// Span every log line and background task of the registrar runs in.
    pub fn span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Parent token; cancelling it stops all supervision.
    pub fn shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown_token = Some(token);
        self
    }

    pub fn build(self) -> Arc<Registrar> {
        Arc::new(Registrar {
            store: self.store,
            retry: self.retry,
            heartbeat: self.heartbeat,
            probe: self.probe,
            request_timeout: self.request_timeout,
            on_failure: self.on_failure,
            span: self.span.unwrap_or_else(|| info_span!("registrar")),
            root: self.shutdown_token.unwrap_or_default(),
            inner: RwLock::new(Inner::default()),
            supervisor: Supervisor::new(),
        })
    }
}

impl Registrar {
    pub fn builder(store: Arc<dyn CoordinationStore>) -> RegistrarBuilder {
        RegistrarBuilder {
            store,
            retry: RetryPolicy::default(),
            heartbeat: HeartbeatPolicy::default(),
            probe: ProbePolicy::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            on_failure: None,
            span: None,
            shutdown_token: None,
        }
    }

    pub fn store(&self) -> &Arc<dyn CoordinationStore> {
        &self.store
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn probe_policy(&self) -> &ProbePolicy {
        &self.probe
    }

    /// Number of live supervision tasks (heartbeat or recovery) for the
    /// currently held identity.
    pub async fn supervision_tasks(&self) -> usize {
        let inner = self.inner.read().await;
        match inner.descriptor.as_ref() {
            Some(d) => self.supervisor.running(&d.identity()),
            None => 0,
        }
    }

    /// Registers `descriptor`, replacing any registration already held.
    pub async fn register(self: &Arc<Self>, descriptor: ServiceDescriptor) -> Result<(), RegistryError> {
        self.register_inner(descriptor).instrument(self.span.clone()).await
    }

    /// Removes the registration from the store and stops supervision,
    /// including an in-flight recovery run.
    pub async fn deregister(&self) -> Result<(), RegistryError> {
        self.deregister_inner().instrument(self.span.clone()).await
    }

    /// Merges `delta` into the held metadata and rewrites the record under
    /// the existing lease. The merged local view is kept even if the write
    /// fails.
    pub async fn update_metadata(&self, delta: Metadata) -> Result<(), RegistryError> {
        self.update_metadata_inner(delta).instrument(self.span.clone()).await
    }

    pub async fn is_registered(&self) -> bool {
        self.inner.read().await.state == RegistrationState::Registered
    }

    pub async fn snapshot(&self) -> Snapshot {
        let inner = self.inner.read().await;
        Snapshot {
            state: inner.state,
            descriptor: inner.descriptor.clone(),
            lease: inner.lease,
            recovering: inner.state == RegistrationState::Unregistered && inner.scope.is_some(),
        }
    }

    /// Deregisters if needed, stops every background task and waits for them.
    pub async fn shutdown(&self) {
        match self.deregister().await {
            Ok(()) | Err(RegistryError::NotRegistered) => {}
            Err(e) => {
                error!(component = "registrar", event = "shutdown_deregister_failed", error = %e);
            }
        }
        self.root.cancel();
        self.supervisor.join_all().await;
    }

    /// Re-registers the last known descriptor on behalf of the recovery run
    /// owning `scope`. Returns `Ok(false)` when that run was superseded.
    pub(crate) async fn rejoin(self: &Arc<Self>, scope: &CancellationToken) -> Result<bool, RegistryError> {
        let mut inner = self.inner.write().await;
        if scope.is_cancelled() {
            return Ok(false);
        }
        let Some(descriptor) = inner.descriptor.clone() else {
            return Ok(false);
        };
        if let Some(stale) = inner.lease.take() {
            self.cleanup_revoke(stale.id).await;
        }
        self.register_locked(&mut inner, descriptor).await?;
        Ok(true)
    }

    /// Ends the recovery run owning `scope`. Returns false if it was
    /// superseded meanwhile.
    pub(crate) async fn abandon(&self, scope: &CancellationToken) -> bool {
        let mut inner = self.inner.write().await;
        if scope.is_cancelled() {
            return false;
        }
        inner.scope = None;
        true
    }

    pub(crate) fn notify(&self, kind: FailureKind) {
        if let Some(callback) = &self.on_failure {
            callback(kind);
        }
    }

    async fn register_inner(self: &Arc<Self>, descriptor: ServiceDescriptor) -> Result<(), RegistryError> {
        let mut inner = self.inner.write().await;
        if inner.state == RegistrationState::Registered {
            info!(
                component = "registrar",
                event = "reregister",
                identity = %descriptor.identity(),
                "already registered, superseding current registration"
            );
        }
        Self::supersede(&mut inner);
        self.register_locked(&mut inner, descriptor).await
    }

    async fn deregister_inner(&self) -> Result<(), RegistryError> {
        let mut inner = self.inner.write().await;
        if inner.state == RegistrationState::Unregistered && inner.scope.is_none() {
            return Err(RegistryError::NotRegistered);
        }

        Self::supersede(&mut inner);
        if let Some(key) = inner.descriptor.as_ref().map(ServiceDescriptor::key) {
            self.cleanup_delete(&key).await;
        }
        if let Some(lease) = inner.lease.take() {
            self.cleanup_revoke(lease.id).await;
        }
        inner.state = RegistrationState::Unregistered;
        metrics::set_registered(false);
        metrics::inc_deregistrations();

        info!(
            component = "registrar",
            event = "deregistered",
            identity = ?inner.descriptor.as_ref().map(|d| d.identity().to_string()),
            "service deregistered"
        );
        Ok(())
    }

    async fn update_metadata_inner(&self, delta: Metadata) -> Result<(), RegistryError> {
        let mut inner = self.inner.write().await;
        if inner.state != RegistrationState::Registered {
            return Err(RegistryError::NotRegistered);
        }
        let lease = inner.lease.ok_or(RegistryError::NotRegistered)?;
        let descriptor = inner.descriptor.as_mut().ok_or(RegistryError::NotRegistered)?;
        descriptor.merge_metadata(delta);
        let key = descriptor.key();
        let value = descriptor.to_bytes()?;

        if let Err(e) = bounded(self.request_timeout, self.store.put(&key, value, lease.id)).await {
            warn!(
                component = "registrar",
                event = "metadata_put_failed",
                key = %key,
                error = %e,
                "metadata update not persisted"
            );
            return Err(RegistryError::PutFailed(e));
        }

        info!(component = "registrar", event = "metadata_updated", key = %key);
        Ok(())
    }

    fn supersede(inner: &mut Inner) {
        if let Some(scope) = inner.scope.take() {
            scope.cancel();
        }
        inner.renewal = None;
    }

    async fn register_locked(
        self: &Arc<Self>,
        inner: &mut Inner,
        descriptor: ServiceDescriptor,
    ) -> Result<(), RegistryError> {
        let identity = descriptor.identity();

        // Retire whatever the previous registration left behind.
        if let Some(prev) = inner.descriptor.as_ref() {
            if prev.identity() != identity && inner.lease.is_some() {
                let key = prev.key();
                self.cleanup_delete(&key).await;
            }
        }
        if let Some(old) = inner.lease.take() {
            self.cleanup_revoke(old.id).await;
        }
        inner.state = RegistrationState::Unregistered;
        metrics::set_registered(false);
        inner.descriptor = Some(descriptor.clone());

        let lease_id = bounded(self.request_timeout, self.store.grant_lease(descriptor.ttl_seconds))
            .await
            .map_err(|e| {
                metrics::inc_registration_failures("lease_grant");
                error!(component = "registrar", event = "lease_grant_failed", identity = %identity, error = %e);
                RegistryError::LeaseGrantFailed(e)
            })?;
        let lease = LeaseHandle::new(lease_id, descriptor.ttl_seconds);

        let key = descriptor.key();
        let value = match descriptor.to_bytes() {
            Ok(value) => value,
            Err(e) => {
                self.cleanup_revoke(lease_id).await;
                return Err(e.into());
            }
        };

        if let Err(e) = bounded(self.request_timeout, self.store.put(&key, value, lease_id)).await {
            metrics::inc_registration_failures("put");
            error!(component = "registrar", event = "put_failed", key = %key, lease_id, error = %e);
            self.cleanup_revoke(lease_id).await;
            return Err(RegistryError::PutFailed(e));
        }

        let stream = match bounded(self.request_timeout, self.store.open_renewal_stream(lease_id)).await {
            Ok(stream) => stream,
            Err(e) => {
                metrics::inc_registration_failures("keepalive");
                error!(component = "registrar", event = "keepalive_start_failed", key = %key, lease_id, error = %e);
                self.cleanup_delete(&key).await;
                self.cleanup_revoke(lease_id).await;
                return Err(RegistryError::KeepAliveStartFailed(e));
            }
        };
        let (renewal, acks) = stream.into_parts();

        let scope = self.root.child_token();
        inner.state = RegistrationState::Registered;
        inner.lease = Some(lease);
        inner.renewal = Some(renewal);
        if let Some(prev) = inner.scope.replace(scope.clone()) {
            prev.cancel();
        }

        let task = supervise(Arc::clone(self), acks, scope, lease).instrument(self.span.clone());
        self.supervisor.spawn(identity.clone(), task);

        metrics::inc_registrations();
        metrics::set_registered(true);
        info!(
            component = "registrar",
            event = "registered",
            identity = %identity,
            key = %key,
            lease_id,
            ttl_seconds = descriptor.ttl_seconds,
            "service registered"
        );
        Ok(())
    }

    // Marks the registration lost after its renewal stream closed. Returns
    // false if the scope was superseded meanwhile.
    async fn mark_lost(&self, scope: &CancellationToken, lease_id: LeaseId) -> bool {
        let mut inner = self.inner.write().await;
        if scope.is_cancelled() {
            return false;
        }
        inner.state = RegistrationState::Unregistered;
        inner.renewal = None;
        if !self.retry.enabled {
            // Unsupervised from here on: drop the record and its lease.
            inner.scope = None;
            if let Some(key) = inner.descriptor.as_ref().map(ServiceDescriptor::key) {
                self.cleanup_delete(&key).await;
            }
            if let Some(lease) = inner.lease.take() {
                self.cleanup_revoke(lease.id).await;
            }
        }
        metrics::set_registered(false);
        warn!(
            component = "registrar",
            event = "registration_lost",
            lease_id,
            retry = self.retry.enabled,
            "heartbeat failed, registration lost"
        );
        true
    }

    async fn cleanup_revoke(&self, lease_id: LeaseId) {
        if let Err(e) = bounded(self.request_timeout, self.store.revoke_lease(lease_id)).await {
            warn!(
                component = "registrar",
                event = "revoke_failed",
                lease_id,
                error = %e,
                "best-effort lease revoke failed, lease will expire via TTL"
            );
        }
    }

    async fn cleanup_delete(&self, key: &str) {
        if let Err(e) = bounded(self.request_timeout, self.store.delete(key)).await {
            warn!(
                component = "registrar",
                event = "delete_failed",
                key = %key,
                error = %e,
                "best-effort key delete failed"
            );
        }
    }
}

// Supervision lifetime of one registration: monitor first, then recovery if
// the stream failed. The two never overlap. Boxed because recovery re-enters
// register, which spawns the next supervision lifetime.
fn supervise(
    registrar: Arc<Registrar>,
    acks: mpsc::Receiver<RenewalAck>,
    scope: CancellationToken,
    lease: LeaseHandle,
) -> BoxFuture<'static, ()> {
    async move {
        let report = heartbeat::monitor(
            acks,
            &scope,
            lease.id,
            registrar.heartbeat.poll_interval,
            registrar.heartbeat.stale_threshold(lease.ttl_seconds),
        )
        .await;
        if report.exit == MonitorExit::Cancelled {
            return;
        }

        if !registrar.mark_lost(&scope, lease.id).await {
            return;
        }
        if !registrar.retry.enabled {
            error!(component = "registrar", event = "keepalive_failed", lease_id = lease.id, "retry disabled");
            registrar.notify(FailureKind::KeepAliveFailed);
            return;
        }

        match recovery::run(&registrar, &scope).await {
            RecoveryExit::Restored { attempts } => {
                debug!(component = "registrar", event = "recovery_restored", lease_id = lease.id, attempts);
            }
            RecoveryExit::Cancelled => {
                debug!(component = "registrar", event = "recovery_cancelled", lease_id = lease.id);
            }
            RecoveryExit::Exhausted { attempts } => {
                warn!(
                    component = "registrar",
                    event = "recovery_exhausted",
                    lease_id = lease.id,
                    attempts,
                    "registration stays down until the next register"
                );
            }
        }
    }
    .boxed()
}
