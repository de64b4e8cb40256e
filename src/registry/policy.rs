// Package registry provides retry, heartbeat and probe policies.

use std::time::Duration;

use crate::store::renewal_interval;

/// Key read by the reachability probe. Its absence means "reachable".
pub const DEFAULT_SENTINEL_KEY: &str = "/services/__probe__";

/// RetryPolicy configures the recovery loop.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub enabled: bool,
    /// 0 means unlimited.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl RetryPolicy {
    /// Policy that never retries.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Reports whether `attempts` used up the budget.
    pub fn is_exhausted(&self, attempts: u32) -> bool {
        self.max_attempts > 0 && attempts >= self.max_attempts
    }

    /// Starts a fresh delay schedule at `initial_delay`.
    pub fn backoff(&self) -> Backoff {
        Backoff {
            current: self.initial_delay.min(self.max_delay),
            max: self.max_delay,
            multiplier: self.backoff_multiplier,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 0,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

/// Backoff is the live delay of one recovery run: grows geometrically,
/// capped at `max`, never decreases.
#[derive(Debug, Clone)]
pub struct Backoff {
    current: Duration,
    max: Duration,
    multiplier: f64,
}

impl Backoff {
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Moves to the next delay and returns it.
    pub fn advance(&mut self) -> Duration {
        let factor = if self.multiplier.is_finite() && self.multiplier >= 1.0 {
            self.multiplier
        } else {
            1.0
        };
        let next = Duration::try_from_secs_f64(self.current.as_secs_f64() * factor).unwrap_or(self.max);
        self.current = next.max(self.current).min(self.max);
        self.current
    }
}

/// HeartbeatPolicy configures the advisory staleness check.
#[derive(Debug, Clone, PartialEq)]
pub struct HeartbeatPolicy {
    pub poll_interval: Duration,
    /// Renewal intervals without an ack before a warning is logged.
    pub stale_after_intervals: u32,
}

impl HeartbeatPolicy {
    /// Silence after which a lease with `ttl_seconds` is considered stale.
    pub fn stale_threshold(&self, ttl_seconds: i64) -> Duration {
        renewal_interval(ttl_seconds) * self.stale_after_intervals.max(1)
    }
}

impl Default for HeartbeatPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            stale_after_intervals: 3,
        }
    }
}

/// ProbePolicy configures the store reachability probe used before each
/// recovery attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbePolicy {
    pub sentinel_key: String,
    pub timeout: Duration,
}

impl Default for ProbePolicy {
    fn default() -> Self {
        Self {
            sentinel_key: DEFAULT_SENTINEL_KEY.to_string(),
            timeout: Duration::from_secs(2),
        }
    }
}
