// Metric name constants
pub const REGISTRATIONS: &str = "leasereg_registrations_total";
pub const REGISTRATION_FAILURES: &str = "leasereg_registration_failures_total";
pub const DEREGISTRATIONS: &str = "leasereg_deregistrations_total";
pub const REGISTERED: &str = "leasereg_registered";

pub const RENEWALS: &str = "leasereg_renewals_total";
pub const HEARTBEAT_FAILURES: &str = "leasereg_heartbeat_failures_total";
pub const STALE_RENEWAL_WARNINGS: &str = "leasereg_stale_renewal_warnings_total";

pub const RECOVERY_ATTEMPTS: &str = "leasereg_recovery_attempts_total";
pub const RECOVERY_EXHAUSTED: &str = "leasereg_recovery_exhausted_total";

/// Counts a successful registration.
pub fn inc_registrations() {
    metrics::counter!(REGISTRATIONS).increment(1);
}

/// Counts a failed registration, labelled by failing step.
pub fn inc_registration_failures(step: &'static str) {
    metrics::counter!(REGISTRATION_FAILURES, "step" => step).increment(1);
}

pub fn inc_deregistrations() {
    metrics::counter!(DEREGISTRATIONS).increment(1);
}

/// Sets the registered gauge (1 registered, 0 not).
pub fn set_registered(registered: bool) {
    metrics::gauge!(REGISTERED).set(if registered { 1.0 } else { 0.0 });
}

pub fn inc_renewals() {
    metrics::counter!(RENEWALS).increment(1);
}

pub fn inc_heartbeat_failures() {
    metrics::counter!(HEARTBEAT_FAILURES).increment(1);
}

pub fn inc_stale_renewal_warnings() {
    metrics::counter!(STALE_RENEWAL_WARNINGS).increment(1);
}

pub fn inc_recovery_attempts() {
    metrics::counter!(RECOVERY_ATTEMPTS).increment(1);
}

pub fn inc_recovery_exhausted() {
    metrics::counter!(RECOVERY_EXHAUSTED).increment(1);
}
