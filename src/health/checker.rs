// Health checker interface

use async_trait::async_trait;
use serde::Serialize;
use tokio::time::Instant;

/// Status of one check or of the whole report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum HealthError {
    /// Working, but not at full capacity.
    #[error("degraded: {0}")]
    Degraded(String),
    #[error("unhealthy: {0}")]
    Unhealthy(String),
}

impl HealthError {
    pub fn status(&self) -> Status {
        match self {
            HealthError::Degraded(_) => Status::Degraded,
            HealthError::Unhealthy(_) => Status::Unhealthy,
        }
    }
}

/// HealthChecker is implemented by anything that can report its own health.
#[async_trait]
pub trait HealthChecker: Send + Sync {
    fn name(&self) -> &str;

    /// Checks health, finishing before `deadline`.
    async fn check(&self, deadline: Instant) -> Result<(), HealthError>;
}
