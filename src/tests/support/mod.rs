// Shared test support code for scenario tests.

pub mod common;
pub mod store;

pub use common::*;
pub use store::{ClosingRenewals, ProbeClock};
