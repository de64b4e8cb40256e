//! Scenario tests for the registrar.
//!
//! Every case runs against the in-memory store, most of them on a paused
//! tokio clock so backoff and heartbeat timing can be asserted exactly.

mod cases_failure_cleanup_test;

pub mod support;
