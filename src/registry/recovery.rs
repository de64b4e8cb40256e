// Package registry provides the recovery engine that restores a lost
// registration with capped exponential backoff.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::error::FailureKind;
use super::policy::ProbePolicy;
use super::registrar::Registrar;
use crate::metrics;
use crate::store::{bounded, CoordinationStore, StoreError};

/// How a recovery run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryExit {
    /// Registration restored after `attempts` attempts.
    Restored { attempts: u32 },
    /// Deregistered or superseded while recovering.
    Cancelled,
    /// Attempt budget used up.
    Exhausted { attempts: u32 },
}

/// Checks that the store answers within the probe timeout. A missing
/// sentinel key counts as reachable.
pub async fn probe_store(store: &dyn CoordinationStore, probe: &ProbePolicy) -> Result<(), StoreError> {
    match bounded(probe.timeout, store.get(&probe.sentinel_key)).await {
        Ok(_) => Ok(()),
        Err(e) if e.is_not_found() => Ok(()),
        Err(e) => Err(e),
    }
}

/// Runs one recovery lifetime for the registration owning `scope`.
///
/// Each iteration sleeps the current delay (cancellable), probes the store
/// and, if it is reachable, re-registers the last known descriptor. The
/// delay grows after every failed probe or attempt and is never reset
/// within a run.
pub async fn run(registrar: &Arc<Registrar>, scope: &CancellationToken) -> RecoveryExit {
    let policy = registrar.retry_policy().clone();
    let mut backoff = policy.backoff();
    let mut attempt: u32 = 0;

    info!(
        component = "recovery",
        event = "started",
        max_attempts = policy.max_attempts,
        initial_delay = ?policy.initial_delay,
        "recovering lost registration"
    );

    loop {
        if scope.is_cancelled() {
            debug!(component = "recovery", event = "cancelled", attempt);
            return RecoveryExit::Cancelled;
        }

        if policy.is_exhausted(attempt) {
            if !registrar.abandon(scope).await {
                return RecoveryExit::Cancelled;
            }
            metrics::inc_recovery_exhausted();
            error!(
                component = "recovery",
                event = "max_retries_exceeded",
                attempts = attempt,
                "giving up on re-registration"
            );
            registrar.notify(FailureKind::MaxRetriesExceeded);
            return RecoveryExit::Exhausted { attempts: attempt };
        }

        attempt += 1;
        let delay = backoff.current();
        tokio::select! {
            biased;
            _ = scope.cancelled() => {
                debug!(component = "recovery", event = "cancelled", attempt, "cancelled while waiting");
                return RecoveryExit::Cancelled;
            }
            _ = tokio::time::sleep(delay) => {}
        }
        metrics::inc_recovery_attempts();

        if let Err(e) = probe_store(registrar.store().as_ref(), registrar.probe_policy()).await {
            let next = backoff.advance();
            warn!(
                component = "recovery",
                event = "store_unreachable",
                attempt,
                next_delay = ?next,
                error = %e,
                "store probe failed"
            );
            continue;
        }

        match registrar.rejoin(scope).await {
            Ok(true) => {
                info!(component = "recovery", event = "restored", attempts = attempt, "registration restored");
                return RecoveryExit::Restored { attempts: attempt };
            }
            Ok(false) => return RecoveryExit::Cancelled,
            Err(e) => {
                let next = backoff.advance();
                warn!(
                    component = "recovery",
                    event = "register_failed",
                    attempt,
                    next_delay = ?next,
                    error = %e,
                    "re-registration attempt failed"
                );
            }
        }
    }
}
