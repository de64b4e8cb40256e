// Package health provides the health-check provider interface and the
// aggregator that polls providers concurrently.

pub mod aggregator;
pub mod checker;
pub mod checks;


pub use aggregator::{Aggregator, CheckReport, Report};
pub use checker::{HealthChecker, HealthError, Status};
pub use checks::{RegistrationCheck, StoreCheck};
