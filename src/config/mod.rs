// Configuration loading and management.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::model::{Metadata, ServiceDescriptor};
use crate::registry::{HeartbeatPolicy, ProbePolicy, RetryPolicy, DEFAULT_SENTINEL_KEY};

pub const PROD: &str = "prod";
pub const TEST: &str = "test";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Etcd,
    Memory,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Registry {
    #[serde(rename = "registry")]
    pub registry: RegistryBox,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegistryBox {
    pub env: String,
    pub logs: Option<Logs>,
    pub api: Option<Api>,
    pub store: Store,
    pub retry: Option<Retry>,
    pub heartbeat: Option<Heartbeat>,
    pub service: Service,
    pub shutdown: Option<Shutdown>,
    pub health: Option<Health>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Logs {
    pub level: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Api {
    pub name: Option<String>,
    pub port: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Store {
    pub kind: StoreKind,
    #[serde(default)]
    pub endpoints: Vec<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(rename = "dial_timeout", default, with = "humantime_serde")]
    pub dial_timeout: Option<Duration>,
    #[serde(rename = "request_timeout", default, with = "humantime_serde")]
    pub request_timeout: Option<Duration>,
    #[serde(rename = "probe_timeout", default, with = "humantime_serde")]
    pub probe_timeout: Option<Duration>,
    #[serde(rename = "sentinel_key")]
    pub sentinel_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Retry {
    pub enabled: bool,
    #[serde(rename = "max_retries")]
    pub max_retries: Option<u32>,
    #[serde(rename = "initial_delay", default, with = "humantime_serde")]
    pub initial_delay: Option<Duration>,
    #[serde(rename = "max_delay", default, with = "humantime_serde")]
    pub max_delay: Option<Duration>,
    #[serde(rename = "backoff_multiplier")]
    pub backoff_multiplier: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Heartbeat {
    #[serde(rename = "poll_interval", default, with = "humantime_serde")]
    pub poll_interval: Option<Duration>,
    #[serde(rename = "stale_after_intervals")]
    pub stale_after_intervals: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Service {
    pub name: String,
    #[serde(rename = "instance_id")]
    pub instance_id: Option<String>,
    pub address: String,
    /// Lease TTL in seconds.
    pub ttl: i64,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Shutdown {
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Health {
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

// Config trait
pub trait ConfigTrait {
    fn logs(&self) -> Option<&Logs>;
    fn is_prod(&self) -> bool;
    #[allow(dead_code)]
    fn is_test(&self) -> bool;
    fn api(&self) -> Option<&Api>;
    fn store(&self) -> &Store;
    fn retry_policy(&self) -> RetryPolicy;
    fn heartbeat_policy(&self) -> HeartbeatPolicy;
    fn probe_policy(&self) -> ProbePolicy;
    fn request_timeout(&self) -> Duration;
    fn dial_timeout(&self) -> Duration;
    fn shutdown_timeout(&self) -> Duration;
    fn health_timeout(&self) -> Duration;
    fn descriptor(&self) -> ServiceDescriptor;
}

// Config type alias for convenience
pub type Config = Registry;

impl ConfigTrait for Config {
    fn logs(&self) -> Option<&Logs> {
        self.registry.logs.as_ref()
    }

    fn is_prod(&self) -> bool {
        self.registry.env == PROD
    }

    fn is_test(&self) -> bool {
        self.registry.env == TEST
    }

    fn api(&self) -> Option<&Api> {
        self.registry.api.as_ref()
    }

    fn store(&self) -> &Store {
        &self.registry.store
    }

    fn retry_policy(&self) -> RetryPolicy {
        let defaults = RetryPolicy::default();
        match self.registry.retry.as_ref() {
            None => defaults,
            Some(retry) => RetryPolicy {
                enabled: retry.enabled,
                max_attempts: retry.max_retries.unwrap_or(defaults.max_attempts),
                initial_delay: retry.initial_delay.unwrap_or(defaults.initial_delay),
                max_delay: retry.max_delay.unwrap_or(defaults.max_delay),
                backoff_multiplier: retry.backoff_multiplier.unwrap_or(defaults.backoff_multiplier),
            },
        }
    }

    fn heartbeat_policy(&self) -> HeartbeatPolicy {
        let defaults = HeartbeatPolicy::default();
        match self.registry.heartbeat.as_ref() {
            None => defaults,
            Some(hb) => HeartbeatPolicy {
                poll_interval: hb.poll_interval.unwrap_or(defaults.poll_interval),
                stale_after_intervals: hb.stale_after_intervals.unwrap_or(defaults.stale_after_intervals),
            },
        }
    }

    fn probe_policy(&self) -> ProbePolicy {
        let store = &self.registry.store;
        ProbePolicy {
            sentinel_key: store
                .sentinel_key
                .clone()
                .unwrap_or_else(|| DEFAULT_SENTINEL_KEY.to_string()),
            timeout: store.probe_timeout.unwrap_or(Duration::from_secs(2)),
        }
    }

    fn request_timeout(&self) -> Duration {
        self.registry.store.request_timeout.unwrap_or(Duration::from_secs(3))
    }

    fn dial_timeout(&self) -> Duration {
        self.registry.store.dial_timeout.unwrap_or(Duration::from_secs(5))
    }

    fn shutdown_timeout(&self) -> Duration {
        self.registry
            .shutdown
            .as_ref()
            .and_then(|s| s.timeout)
            .unwrap_or(Duration::from_secs(10))
    }

    fn health_timeout(&self) -> Duration {
        self.registry
            .health
            .as_ref()
            .and_then(|h| h.timeout)
            .unwrap_or(Duration::from_secs(3))
    }

    fn descriptor(&self) -> ServiceDescriptor {
        let service = &self.registry.service;
        let instance_id = service.instance_id.clone().unwrap_or_else(default_instance_id);
        ServiceDescriptor {
            service_name: service.name.clone(),
            instance_id,
            address: service.address.clone(),
            ttl_seconds: service.ttl,
            metadata: service.metadata.clone(),
        }
    }
}

impl Config {
    /// Loads configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        // Resolve absolute path
        let abs_path = path
            .canonicalize()
            .with_context(|| format!("failed to resolve absolute config filepath: {:?}", path))?;

        // Read file
        let data = std::fs::read_to_string(&abs_path)
            .with_context(|| format!("read config yaml file {:?}", abs_path))?;

        Self::parse(&data).with_context(|| format!("load config from {:?}", abs_path))
    }

    /// Parses and validates configuration from YAML text.
    pub fn parse(data: &str) -> Result<Self> {
        let cfg: Registry = serde_yaml::from_str(data).context("unmarshal yaml")?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        let store = &self.registry.store;
        if store.kind == StoreKind::Etcd && store.endpoints.is_empty() {
            bail!("store.endpoints must not be empty for etcd store");
        }
        if store.username.is_some() != store.password.is_some() {
            bail!("store.username and store.password must be set together");
        }

        let service = &self.registry.service;
        if service.name.is_empty() {
            bail!("service.name must not be empty");
        }
        if service.ttl <= 0 {
            bail!("service.ttl must be positive, got {}", service.ttl);
        }

        let retry = self.retry_policy();
        if !(retry.backoff_multiplier.is_finite() && retry.backoff_multiplier >= 1.0) {
            bail!("retry.backoff_multiplier must be >= 1.0, got {}", retry.backoff_multiplier);
        }
        if retry.initial_delay > retry.max_delay {
            bail!(
                "retry.initial_delay ({:?}) exceeds retry.max_delay ({:?})",
                retry.initial_delay,
                retry.max_delay
            );
        }
        if self.heartbeat_policy().poll_interval.is_zero() {
            bail!("heartbeat.poll_interval must be positive");
        }
        Ok(())
    }
}

// hostname-pid, falling back to the pid alone
fn default_instance_id() -> String {
    let pid = std::process::id();
    match std::env::var("HOSTNAME") {
        Ok(host) if !host.is_empty() => format!("{host}-{pid}"),
        _ => format!("instance-{pid}"),
    }
}

// Test config is always available for integration tests
mod test_config;
#[allow(dead_code)]
pub use test_config::new_test_config;
