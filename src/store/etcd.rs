// Package store provides the etcd-backed coordination store adapter.

use async_trait::async_trait;
use etcd_client::{Client, ConnectOptions, Error as EtcdError, LeaseGrantOptions, PutOptions};
use std::time::Duration;
use tracing::{debug, warn};

use super::{renewal_interval, CoordinationStore, RenewalAck, RenewalStream, StoreError};
use crate::model::LeaseId;

// gRPC status code etcd answers with for unknown leases
const GRPC_NOT_FOUND: i32 = 5;

/// Connection settings for [`EtcdStore::connect`].
#[derive(Debug, Clone)]
pub struct EtcdOptions {
    pub endpoints: Vec<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub dial_timeout: Duration,
    pub request_timeout: Duration,
}

/// EtcdStore talks to an etcd v3 cluster.
pub struct EtcdStore {
    client: Client,
}

impl EtcdStore {
    /// Dials the cluster.
    pub async fn connect(opts: &EtcdOptions) -> Result<Self, StoreError> {
        let mut connect = ConnectOptions::new()
            .with_connect_timeout(opts.dial_timeout)
            .with_timeout(opts.request_timeout);
        if let (Some(user), Some(password)) = (&opts.username, &opts.password) {
            connect = connect.with_user(user.clone(), password.clone());
        }

        let client = Client::connect(&opts.endpoints, Some(connect))
            .await
            .map_err(map_err)?;
        debug!(
            component = "etcd-store",
            event = "connected",
            endpoints = ?opts.endpoints,
            "connected to etcd"
        );
        Ok(Self { client })
    }

    /// Wraps an already connected client.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

fn status_code(e: &EtcdError) -> Option<i32> {
    match e {
        EtcdError::GRpcStatus(status) => Some(i32::from(status.code())),
        _ => None,
    }
}

fn map_err(e: EtcdError) -> StoreError {
    match e {
        EtcdError::TransportError(_) | EtcdError::IoError(_) => StoreError::Transport(e.to_string()),
        EtcdError::GRpcStatus(ref status) => match i32::from(status.code()) {
            // Unavailable, DeadlineExceeded
            14 | 4 => StoreError::Transport(e.to_string()),
            _ => StoreError::Backend(e.to_string()),
        },
        other => StoreError::Backend(other.to_string()),
    }
}

#[async_trait]
impl CoordinationStore for EtcdStore {
    async fn grant_lease(&self, ttl_seconds: i64) -> Result<LeaseId, StoreError> {
        let mut client = self.client.clone();
        let resp = client
            .lease_grant(ttl_seconds, None::<LeaseGrantOptions>)
            .await
            .map_err(map_err)?;
        Ok(resp.id())
    }

    async fn revoke_lease(&self, lease_id: LeaseId) -> Result<(), StoreError> {
        let mut client = self.client.clone();
        match client.lease_revoke(lease_id).await {
            Ok(_) => Ok(()),
            Err(e) if status_code(&e) == Some(GRPC_NOT_FOUND) => Ok(()),
            Err(e) => Err(map_err(e)),
        }
    }

    async fn put(&self, key: &str, value: Vec<u8>, lease_id: LeaseId) -> Result<(), StoreError> {
        let mut client = self.client.clone();
        match client
            .put(key, value, Some(PutOptions::new().with_lease(lease_id)))
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if status_code(&e) == Some(GRPC_NOT_FOUND) => Err(StoreError::LeaseNotFound(lease_id)),
            Err(e) => Err(map_err(e)),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut client = self.client.clone();
        client.delete(key, None).await.map_err(map_err)?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let mut client = self.client.clone();
        let resp = client.get(key, None).await.map_err(map_err)?;
        resp.kvs()
            .first()
            .map(|kv| kv.value().to_vec())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn open_renewal_stream(&self, lease_id: LeaseId) -> Result<RenewalStream, StoreError> {
        let mut client = self.client.clone();
        let (mut keeper, mut responses) = client.lease_keep_alive(lease_id).await.map_err(map_err)?;

        // Cadence is derived from the TTL etcd reports for the lease.
        let ttl = client
            .lease_time_to_live(lease_id, None)
            .await
            .map_err(map_err)?
            .granted_ttl();
        let every = renewal_interval(ttl);

        let (tx, stop, stream) = RenewalStream::channel();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                if let Err(e) = keeper.keep_alive().await {
                    warn!(component = "etcd-store", event = "keepalive_send_failed", lease_id, error = %e);
                    break;
                }
                let resp = tokio::select! {
                    _ = stop.cancelled() => break,
                    resp = responses.message() => resp,
                };
                match resp {
                    Ok(Some(resp)) if resp.ttl() > 0 => {
                        let ack = RenewalAck { lease_id, ttl_seconds: resp.ttl() };
                        if tx.send(ack).await.is_err() {
                            break;
                        }
                    }
                    Ok(Some(_)) => {
                        warn!(component = "etcd-store", event = "lease_expired", lease_id, "lease expired server-side");
                        break;
                    }
                    Ok(None) => {
                        warn!(component = "etcd-store", event = "keepalive_stream_ended", lease_id);
                        break;
                    }
                    Err(e) => {
                        warn!(component = "etcd-store", event = "keepalive_stream_error", lease_id, error = %e);
                        break;
                    }
                }
            }
            // dropping tx closes the renewal stream
        });

        Ok(stream)
    }
}
