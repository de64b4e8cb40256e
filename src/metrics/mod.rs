//! Prometheus metrics functionality.
//
//! Metrics organization:
//! - Registration lifecycle: registrations, failures, registered gauge
//! - Liveness: renewals, heartbeat failures, stale renewal warnings
//! - Recovery: attempts and exhausted runs

pub mod meter;

// Re-export commonly used items
pub use meter::*;
