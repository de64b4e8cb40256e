// Package registry provides the heartbeat monitor bound to one registration.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::metrics;
use crate::model::LeaseId;
use crate::store::RenewalAck;

/// Why the monitor stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorExit {
    /// The registration scope was cancelled (deregister or superseding register).
    Cancelled,
    /// The renewal stream closed on its own.
    StreamClosed,
}

/// Outcome of one monitor lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorReport {
    pub exit: MonitorExit,
    pub renewals: u64,
    pub stale_warnings: u64,
}

/// Consumes renewal acks for `lease_id` until the stream closes or `scope`
/// is cancelled.
///
/// Every `poll_interval` the time since the last ack is compared against
/// `stale_after`; exceeding it only logs a warning. Stream closure is the
/// sole failure signal.
pub async fn monitor(
    mut acks: mpsc::Receiver<RenewalAck>,
    scope: &CancellationToken,
    lease_id: LeaseId,
    poll_interval: Duration,
    stale_after: Duration,
) -> MonitorReport {
    let poll_interval = poll_interval.max(Duration::from_millis(1));
    let mut last_renewal = Instant::now();
    let mut ticker = tokio::time::interval_at(last_renewal + poll_interval, poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut renewals = 0u64;
    let mut stale_warnings = 0u64;
    let report = |exit, renewals, stale_warnings| MonitorReport {
        exit,
        renewals,
        stale_warnings,
    };

    debug!(component = "heartbeat", event = "started", lease_id, "heartbeat monitor started");

    loop {
        tokio::select! {
            biased;
            _ = scope.cancelled() => {
                debug!(component = "heartbeat", event = "cancelled", lease_id, renewals);
                return report(MonitorExit::Cancelled, renewals, stale_warnings);
            }
            ack = acks.recv() => match ack {
                Some(ack) => {
                    last_renewal = Instant::now();
                    renewals += 1;
                    metrics::inc_renewals();
                    debug!(
                        component = "heartbeat",
                        event = "renewed",
                        lease_id,
                        ttl_seconds = ack.ttl_seconds
                    );
                }
                None => {
                    if scope.is_cancelled() {
                        return report(MonitorExit::Cancelled, renewals, stale_warnings);
                    }
                    warn!(
                        component = "heartbeat",
                        event = "stream_closed",
                        lease_id,
                        renewals,
                        "renewal stream closed, lease can no longer be kept alive"
                    );
                    metrics::inc_heartbeat_failures();
                    return report(MonitorExit::StreamClosed, renewals, stale_warnings);
                }
            },
            _ = ticker.tick() => {
                let silent = last_renewal.elapsed();
                if silent > stale_after {
                    stale_warnings += 1;
                    metrics::inc_stale_renewal_warnings();
                    warn!(
                        component = "heartbeat",
                        event = "renewal_stale",
                        lease_id,
                        silent = ?silent,
                        threshold = ?stale_after,
                        "no lease renewal within staleness threshold"
                    );
                }
            }
        }
    }
}
