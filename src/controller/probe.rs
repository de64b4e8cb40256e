// Package api provides the aggregated health probe controller.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::sync::Arc;

use super::Controller;
use crate::health::{Aggregator, Status};

pub const HEALTH_PATH: &str = "/healthz";

/// HealthProbeController serves the aggregated health report.
#[derive(Clone)]
pub struct HealthProbeController {
    aggregator: Arc<Aggregator>,
}

impl HealthProbeController {
    pub fn new(aggregator: Arc<Aggregator>) -> Self {
        Self { aggregator }
    }

    /// 200 for healthy and degraded, 503 for unhealthy.
    async fn probe(&self) -> Response {
        let report = self.aggregator.check_all().await;
        let code = match report.status {
            Status::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
            Status::Healthy | Status::Degraded => StatusCode::OK,
        };
        (code, Json(report)).into_response()
    }
}

impl Controller for HealthProbeController {
    fn add_route(&self, router: Router) -> Router {
        let controller = self.clone();
        router.route(
            HEALTH_PATH,
            get(move || {
                let controller = controller.clone();
                async move { controller.probe().await }
            }),
        )
    }
}
