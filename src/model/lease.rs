// Lease handle owned by the registrar for one active registration.

use serde::{Deserialize, Serialize};

/// Store-assigned lease identifier.
pub type LeaseId = i64;

/// LeaseHandle is a granted lease together with the TTL it was granted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseHandle {
    pub id: LeaseId,
    pub ttl_seconds: i64,
}

impl LeaseHandle {
    pub fn new(id: LeaseId, ttl_seconds: i64) -> Self {
        Self { id, ttl_seconds }
    }
}
