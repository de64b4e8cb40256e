//! Metrics controller.

use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use super::Controller;

pub const PROMETHEUS_METRICS_PATH: &str = "/metrics";

/// Installs the Prometheus recorder as the global metrics recorder and
/// returns the handle used for rendering.
pub fn init_prometheus_exporter() -> anyhow::Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("failed to install Prometheus recorder: {}", e))
}

/// PrometheusMetricsController renders the metrics endpoint. Without a
/// handle (exporter failed to install) it answers 503.
#[derive(Clone)]
pub struct PrometheusMetricsController {
    handle: Option<PrometheusHandle>,
}

impl PrometheusMetricsController {
    pub fn new(handle: Option<PrometheusHandle>) -> Self {
        Self { handle }
    }

    fn render(&self) -> impl IntoResponse {
        match &self.handle {
            Some(handle) => (
                StatusCode::OK,
                [("content-type", "text/plain; charset=utf-8")],
                handle.render(),
            ),
            None => (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain; charset=utf-8")],
                "# metrics exporter is not installed\n".to_string(),
            ),
        }
    }
}

impl Controller for PrometheusMetricsController {
    fn add_route(&self, router: Router) -> Router {
        let controller = self.clone();
        router.route(
            PROMETHEUS_METRICS_PATH,
            get(move || {
                let controller = controller.clone();
                async move { controller.render() }
            }),
        )
    }
}
