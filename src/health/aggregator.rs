// Package health provides concurrent fan-out over health checkers.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::checker::{HealthChecker, HealthError, Status};

/// Result of one checker within a report.
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub status: Status,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub duration: String,
}

/// Aggregated health of every registered checker.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub status: Status,
    pub timestamp: DateTime<Utc>,
    pub duration: String,
    pub checks: BTreeMap<String, CheckReport>,
    pub metadata: BTreeMap<String, String>,
}

/// Aggregator polls all checkers concurrently under one shared timeout.
pub struct Aggregator {
    checkers: Vec<Arc<dyn HealthChecker>>,
    timeout: Duration,
    metadata: BTreeMap<String, String>,
}

impl Aggregator {
    pub fn new(timeout: Duration) -> Self {
        Self {
            checkers: Vec::new(),
            timeout,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_checker(mut self, checker: Arc<dyn HealthChecker>) -> Self {
        self.checkers.push(checker);
        self
    }

    /// Static metadata attached to every report (service name, version...).
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Runs every checker and classifies the result: unhealthy if any check
    /// is unhealthy, else degraded if any is degraded, else healthy.
    pub async fn check_all(&self) -> Report {
        let started = Instant::now();
        let timestamp = Utc::now();
        let deadline = started + self.timeout;

        let results = join_all(self.checkers.iter().map(|checker| async move {
            let at = Utc::now();
            let t0 = Instant::now();
            let outcome = match tokio::time::timeout_at(deadline, checker.check(deadline)).await {
                Ok(res) => res,
                Err(_) => Err(HealthError::Unhealthy("deadline exceeded".to_string())),
            };
            (checker.name().to_string(), check_report(outcome, at, t0.elapsed()))
        }))
        .await;

        let status = results
            .iter()
            .map(|(_, r)| r.status)
            .max()
            .unwrap_or(Status::Healthy);

        Report {
            status,
            timestamp,
            duration: format_duration(started.elapsed()),
            checks: results.into_iter().collect(),
            metadata: self.metadata.clone(),
        }
    }
}

fn check_report(outcome: Result<(), HealthError>, at: DateTime<Utc>, took: Duration) -> CheckReport {
    let (status, message, error) = match outcome {
        Ok(()) => (Status::Healthy, "ok".to_string(), None),
        Err(e) => {
            let status = e.status();
            match e {
                HealthError::Degraded(msg) => (status, msg, None),
                HealthError::Unhealthy(msg) => (status, "check failed".to_string(), Some(msg)),
            }
        }
    };
    CheckReport {
        status,
        message,
        error,
        timestamp: at,
        duration: format_duration(took),
    }
}

fn format_duration(d: Duration) -> String {
    // microsecond precision keeps reports readable
    let d = Duration::from_micros(d.as_micros() as u64);
    humantime::format_duration(d).to_string()
}
