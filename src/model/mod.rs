// Package model provides the registration data model: descriptors, identities and leases.

pub mod descriptor;
pub mod lease;

#[cfg(test)]
mod descriptor_test;

// Re-export main types
pub use descriptor::{Identity, Metadata, ServiceDescriptor, SERVICES_PREFIX};
pub use lease::{LeaseHandle, LeaseId};
