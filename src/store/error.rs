// Error definitions for coordination store adapters.

use std::time::Duration;

use crate::model::LeaseId;

#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// The store is reachable and the key is absent.
    #[error("key not found: {0}")]
    NotFound(String),
    #[error("lease {0} not found")]
    LeaseNotFound(LeaseId),
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),
    #[error("store transport error: {0}")]
    Transport(String),
    #[error("store error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}
