//! Service registration and liveness: the registrar state machine, the
//! heartbeat monitor bound to each registration and the recovery engine
//! that restores a lost registration.

pub mod error;
pub mod heartbeat;
pub mod policy;
pub mod recovery;
pub mod registrar;
pub mod supervisor;

#[cfg(test)]
mod heartbeat_test;
#[cfg(test)]
mod supervisor_test;

// Re-export main types
pub use error::{FailureCallback, FailureKind, RegistryError};
pub use heartbeat::{MonitorExit, MonitorReport};
pub use policy::{Backoff, HeartbeatPolicy, ProbePolicy, RetryPolicy, DEFAULT_SENTINEL_KEY};
pub use recovery::{probe_store, RecoveryExit};
pub use registrar::{Registrar, RegistrarBuilder, RegistrationState, Snapshot};
pub use supervisor::Supervisor;
