// Package model provides the service descriptor and its registry key layout.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Root of the registry key namespace.
pub const SERVICES_PREFIX: &str = "/services";

/// Free-form instance metadata. Ordered so encoded records are stable.
pub type Metadata = BTreeMap<String, String>;

/// Identity is the `(service_name, instance_id)` pair naming one registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity {
    pub service_name: String,
    pub instance_id: String,
}

impl Identity {
    pub fn new(service_name: impl Into<String>, instance_id: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            instance_id: instance_id.into(),
        }
    }

    /// Deterministic registry key: `/services/{service_name}/{instance_id}`.
    pub fn key(&self) -> String {
        format!("{}/{}/{}", SERVICES_PREFIX, self.service_name, self.instance_id)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.service_name, self.instance_id)
    }
}

/// ServiceDescriptor describes what is being registered.
///
/// Unknown fields are ignored on decode and `metadata` may be absent, so
/// records written by newer instances remain readable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub service_name: String,
    pub instance_id: String,
    pub address: String,
    pub ttl_seconds: i64,
    #[serde(default)]
    pub metadata: Metadata,
}

impl ServiceDescriptor {
    /// Creates a descriptor without metadata.
    pub fn new(
        service_name: impl Into<String>,
        instance_id: impl Into<String>,
        address: impl Into<String>,
        ttl_seconds: i64,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            instance_id: instance_id.into(),
            address: address.into(),
            ttl_seconds,
            metadata: Metadata::new(),
        }
    }

    /// Adds a metadata pair (builder style).
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn identity(&self) -> Identity {
        Identity::new(self.service_name.clone(), self.instance_id.clone())
    }

    pub fn key(&self) -> String {
        self.identity().key()
    }

    /// Merges `delta` into the metadata, last write wins per key.
    pub fn merge_metadata(&mut self, delta: Metadata) {
        self.metadata.extend(delta);
    }

    /// Encodes the descriptor as the registry record value.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decodes a registry record value.
    pub fn from_bytes(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }
}
