// HTTP API controllers for health, registration and metrics endpoints.

pub mod controller;
pub mod metrics;
pub mod probe;
pub mod registration;

#[cfg(test)]
mod registration_test;

// Re-export controller types for convenience
pub use controller::Controller;
pub use metrics::PrometheusMetricsController;
pub use probe::HealthProbeController;
pub use registration::RegistrationController;
