// Main entrypoint for the leasereg daemon.

use anyhow::{bail, Context, Result};
use clap::Parser;
use futures::FutureExt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span};

use leasereg::config::{Config, ConfigTrait, StoreKind};
use leasereg::controller::{
    metrics::init_prometheus_exporter, Controller, HealthProbeController, PrometheusMetricsController,
    RegistrationController,
};
use leasereg::health::{Aggregator, RegistrationCheck, StoreCheck};
use leasereg::http::HttpServer;
use leasereg::registry::Registrar;
use leasereg::shutdown::GracefulShutdown;
use leasereg::store::{CoordinationStore, MemoryStore};

const CONFIG_PATH: &str = "cfg/leasereg.cfg.yaml";
const CONFIG_PATH_LOCAL: &str = "cfg/leasereg.cfg.local.yaml";

/// leasereg - keeps a service instance registered in a lease-based coordination store
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Custom config file path
    #[arg(short, long, value_name = "FILE")]
    cfg: Option<PathBuf>,
}

/// Loads the configuration struct from YAML file.
/// Tries local config first, then falls back to default config.
fn load_cfg(path: Option<PathBuf>) -> Result<Config> {
    if let Some(custom_path) = path {
        let cfg = Config::load(&custom_path)
            .with_context(|| format!("failed to load custom config from {:?}", custom_path))?;
        info!(component = "config", event = "load_success", path = ?custom_path, "config loaded");
        return Ok(cfg);
    }

    match Config::load(PathBuf::from(CONFIG_PATH_LOCAL)) {
        Ok(cfg) => {
            info!(component = "config", event = "load_success", path = CONFIG_PATH_LOCAL, "config loaded");
            Ok(cfg)
        }
        Err(_) => {
            let cfg = Config::load(PathBuf::from(CONFIG_PATH))
                .with_context(|| format!("failed to load config from {}", CONFIG_PATH))?;
            info!(component = "config", event = "load_success", path = CONFIG_PATH, "config loaded");
            Ok(cfg)
        }
    }
}

/// Configures structured logging based on configuration.
fn configure_logger(cfg: &Config) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let log_level = cfg
        .logs()
        .and_then(|logs| logs.level.as_deref())
        .unwrap_or("info");

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    if cfg.is_prod() {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().pretty())
            .init();
    }
}

/// Builds the coordination store selected by `store.kind`.
async fn connect_store(cfg: &Config) -> Result<Arc<dyn CoordinationStore>> {
    match cfg.store().kind {
        StoreKind::Memory => {
            info!(component = "main", event = "store_selected", kind = "memory", "using in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
        #[cfg(feature = "etcd")]
        StoreKind::Etcd => {
            use leasereg::store::{EtcdOptions, EtcdStore};

            let store = cfg.store();
            let opts = EtcdOptions {
                endpoints: store.endpoints.clone(),
                username: store.username.clone(),
                password: store.password.clone(),
                dial_timeout: cfg.dial_timeout(),
                request_timeout: cfg.request_timeout(),
            };
            let etcd = EtcdStore::connect(&opts)
                .await
                .context("failed to connect to etcd")?;
            info!(component = "main", event = "store_selected", kind = "etcd", endpoints = ?opts.endpoints);
            Ok(Arc::new(etcd))
        }
        #[cfg(not(feature = "etcd"))]
        StoreKind::Etcd => bail!("store.kind is etcd but leasereg was built without the `etcd` feature"),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Prometheus recorder must exist before the runtime starts emitting.
    let prometheus = match init_prometheus_exporter() {
        Ok(handle) => Some(handle),
        Err(e) => {
            eprintln!("Warning: Failed to initialize Prometheus metrics exporter: {}", e);
            None
        }
    };

    tokio::runtime::Runtime::new()
        .context("Failed to create tokio runtime")?
        .block_on(async_main(args, prometheus))
}

async fn async_main(args: Args, prometheus: Option<metrics_exporter_prometheus::PrometheusHandle>) -> Result<()> {
    let shutdown_token = CancellationToken::new();

    let cfg = load_cfg(args.cfg)?;
    configure_logger(&cfg);

    let store = connect_store(&cfg).await?;
    let descriptor = cfg.descriptor();
    if descriptor.instance_id.is_empty() {
        bail!("service.instance_id resolved to an empty value");
    }

    let span = info_span!(
        "registrar",
        service = %descriptor.service_name,
        instance = %descriptor.instance_id
    );
    let failure_token = shutdown_token.clone();
    let registrar = Registrar::builder(store.clone())
        .retry(cfg.retry_policy())
        .heartbeat(cfg.heartbeat_policy())
        .probe(cfg.probe_policy())
        .request_timeout(cfg.request_timeout())
        .span(span)
        .shutdown_token(shutdown_token.child_token())
        .on_failure(move |kind| {
            error!(
                component = "main",
                event = "registration_failure",
                kind = %kind,
                "registration could not be kept alive, stopping"
            );
            failure_token.cancel();
        })
        .build();

    registrar
        .register(descriptor.clone())
        .await
        .context("initial registration failed")?;

    let aggregator = Arc::new(
        Aggregator::new(cfg.health_timeout())
            .with_metadata("service", descriptor.service_name.clone())
            .with_metadata("instance", descriptor.instance_id.clone())
            .with_checker(Arc::new(RegistrationCheck::new(registrar.clone())))
            .with_checker(Arc::new(StoreCheck::new(store.clone(), cfg.probe_policy()))),
    );

    let controllers: Vec<Box<dyn Controller>> = vec![
        Box::new(HealthProbeController::new(aggregator)),
        Box::new(RegistrationController::new(registrar.clone())),
        Box::new(PrometheusMetricsController::new(prometheus)),
    ];
    let server = HttpServer::new(shutdown_token.clone(), &cfg, controllers);
    let server_token = shutdown_token.clone();
    let server_task = tokio::spawn(async move {
        if let Err(e) = server.listen_and_serve().await {
            error!(component = "main", scope = "http", event = "start_failed", error = %e, "failed to start server");
            server_token.cancel();
        }
    });

    let mut graceful_shutdown = GracefulShutdown::new(shutdown_token.clone()).with_timeout(cfg.shutdown_timeout());
    let finalizing = registrar.clone();
    graceful_shutdown.on_shutdown("registrar", async move { finalizing.shutdown().await }.boxed());
    graceful_shutdown.on_shutdown(
        "http",
        async move {
            let _ = server_task.await;
        }
        .boxed(),
    );

    if let Err(e) = graceful_shutdown.await_shutdown().await {
        error!(
            component = "main",
            scope = "service",
            event = "graceful_shutdown_failed",
            error = %e,
            "failed to gracefully shut down service"
        );
        return Err(e);
    }

    Ok(())
}
