use super::{Api, Config, Heartbeat, Logs, Registry, RegistryBox, Retry, Service, Store, StoreKind};
use crate::model::Metadata;
use std::time::Duration;

/// Creates a new test configuration backed by the in-memory store.
pub fn new_test_config() -> Config {
    Registry {
        registry: RegistryBox {
            env: super::TEST.to_string(),
            logs: Some(Logs {
                level: Some("debug".to_string()),
            }),
            api: Some(Api {
                name: Some("leasereg:8030".to_string()),
                port: Some("8030".to_string()),
            }),
            store: Store {
                kind: StoreKind::Memory,
                endpoints: Vec::new(),
                username: None,
                password: None,
                dial_timeout: Some(Duration::from_secs(1)),
                request_timeout: Some(Duration::from_secs(1)),
                probe_timeout: Some(Duration::from_millis(500)),
                sentinel_key: None,
            },
            retry: Some(Retry {
                enabled: true,
                max_retries: Some(0),
                initial_delay: Some(Duration::from_secs(1)),
                max_delay: Some(Duration::from_secs(30)),
                backoff_multiplier: Some(2.0),
            }),
            heartbeat: Some(Heartbeat {
                poll_interval: Some(Duration::from_secs(1)),
                stale_after_intervals: Some(3),
            }),
            service: Service {
                name: "test-svc".to_string(),
                instance_id: Some("test-svc-1".to_string()),
                address: "127.0.0.1:8080".to_string(),
                ttl: 9,
                metadata: Metadata::new(),
            },
            shutdown: None,
            health: None,
        },
    }
}
