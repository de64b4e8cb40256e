// Error definitions for the registrar.

use std::fmt;
use std::sync::Arc;

use crate::store::StoreError;

/// Errors returned synchronously from registrar calls.
///
/// `LeaseGrantFailed`, `PutFailed` and `KeepAliveStartFailed` leave no lease
/// or key behind; cleanup errors are logged, not returned.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("lease grant failed: {0}")]
    LeaseGrantFailed(#[source] StoreError),
    #[error("put failed: {0}")]
    PutFailed(#[source] StoreError),
    #[error("start keepalive failed: {0}")]
    KeepAliveStartFailed(#[source] StoreError),
    #[error("service is not registered")]
    NotRegistered,
    #[error("encode service descriptor: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Failures raised by background supervision, delivered only through the
/// failure callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The renewal stream closed and retry is disabled.
    KeepAliveFailed,
    /// Recovery used up its attempt budget.
    MaxRetriesExceeded,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::KeepAliveFailed => "keepalive_failed",
            FailureKind::MaxRetriesExceeded => "max_retries_exceeded",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Callback invoked with asynchronous failures.
pub type FailureCallback = Arc<dyn Fn(FailureKind) + Send + Sync>;
