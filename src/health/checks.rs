// Built-in health checks for the registrar and its coordination store.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::time::Instant;

use super::checker::{HealthChecker, HealthError};
use crate::registry::{probe_store, ProbePolicy, Registrar, RegistrationState};
use crate::store::CoordinationStore;

/// Reports whether the instance is currently registered.
pub struct RegistrationCheck {
    registrar: Arc<Registrar>,
}

impl RegistrationCheck {
    pub fn new(registrar: Arc<Registrar>) -> Self {
        Self { registrar }
    }
}

#[async_trait]
impl HealthChecker for RegistrationCheck {
    fn name(&self) -> &str {
        "registration"
    }

    async fn check(&self, _deadline: Instant) -> Result<(), HealthError> {
        let snapshot = self.registrar.snapshot().await;
        match snapshot.state {
            RegistrationState::Registered => Ok(()),
            RegistrationState::Unregistered if snapshot.recovering => {
                Err(HealthError::Degraded("recovering lost registration".to_string()))
            }
            RegistrationState::Unregistered => Err(HealthError::Unhealthy("not registered".to_string())),
        }
    }
}

/// Probes the coordination store the same way recovery does.
pub struct StoreCheck {
    store: Arc<dyn CoordinationStore>,
    probe: ProbePolicy,
}

impl StoreCheck {
    pub fn new(store: Arc<dyn CoordinationStore>, probe: ProbePolicy) -> Self {
        Self { store, probe }
    }
}

#[async_trait]
impl HealthChecker for StoreCheck {
    fn name(&self) -> &str {
        "coordination_store"
    }

    async fn check(&self, deadline: Instant) -> Result<(), HealthError> {
        let probe = ProbePolicy {
            timeout: self.probe.timeout.min(deadline.saturating_duration_since(Instant::now())),
            ..self.probe.clone()
        };
        probe_store(self.store.as_ref(), &probe)
            .await
            .map_err(|e| HealthError::Unhealthy(e.to_string()))
    }
}
