//! HTTP server implementation.
//

use anyhow::{Context, Result};
use axum::Router;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::{Config, ConfigTrait};
use crate::controller::Controller;

const DEFAULT_PORT: &str = "8030";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP server serving the operator endpoints until the shutdown token fires.
pub struct HttpServer {
    shutdown_token: CancellationToken,
    name: String,
    port: String,
    router: Router,
}

impl HttpServer {
    /// Creates a new HTTP server.
    pub fn new(shutdown_token: CancellationToken, config: &Config, controllers: Vec<Box<dyn Controller>>) -> Self {
        let api = config.api();
        let name = api
            .and_then(|a| a.name.clone())
            .unwrap_or_else(|| "leasereg".to_string());
        let port = api
            .and_then(|a| a.port.clone())
            .unwrap_or_else(|| DEFAULT_PORT.to_string());

        Self {
            shutdown_token,
            name,
            port: port.trim_start_matches(':').to_string(),
            router: Self::build_router(controllers),
        }
    }

    /// Starts the HTTP server and blocks until graceful shutdown completes.
    pub async fn listen_and_serve(&self) -> Result<()> {
        let addr: SocketAddr = format!("0.0.0.0:{}", self.port)
            .parse()
            .context("Failed to parse server address")?;

        let listener = TcpListener::bind(&addr)
            .await
            .context("Failed to bind TCP listener")?;

        info!(
            component = "server",
            event = "started",
            name = %self.name,
            port = %self.port,
            "server started"
        );

        let shutdown_token = self.shutdown_token.clone();
        let serve_future = axum::serve(listener, self.router.clone()).with_graceful_shutdown(async move {
            shutdown_token.cancelled().await;
        });

        if let Err(e) = serve_future.await {
            error!(
                component = "server",
                event = "listen_and_serve_failed",
                name = %self.name,
                port = %self.port,
                error = %e,
                "server failed to listen and serve"
            );
            return Err(e.into());
        }

        info!(
            component = "server",
            event = "stopped",
            name = %self.name,
            port = %self.port,
            "server stopped"
        );
        Ok(())
    }

    /// Builds the router with all controllers.
    fn build_router(controllers: Vec<Box<dyn Controller>>) -> Router {
        let mut router = Router::new();
        for controller in controllers {
            router = controller.add_route(router);
        }
        router
            .layer(TraceLayer::new_for_http())
            .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
    }
}
