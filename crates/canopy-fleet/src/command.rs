//! Outbound command channel to storage replicas.
//!
//! The naming core reaches a replica's command endpoint with three
//! operations: create, delete, and copy. Each is an HTTP POST with a
//! fixed-schema JSON body and a `{success}` response; an exception envelope
//! on a non-success status is forwarded as a typed error.
//!
//! Requests for the same (replica, path) pair are serialized so a delete
//! can never overtake the copy it is meant to undo; distinct paths proceed
//! in parallel.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use canopy_core::{DfsPath, Endpoint, ReplicaAddr};
use canopy_proto::{
    ExceptionResponse, StorageCopyRequest, StoragePathRequest, SuccessResponse, COPY_URI,
    CREATE_URI, DELETE_URI,
};
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// Errors reaching or reported by a storage replica.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The request never produced a well-formed response
    #[error("Transport failure talking to {replica}: {source}")]
    Transport {
        /// Command endpoint of the replica
        replica: Endpoint,
        /// Underlying client error
        #[source]
        source: reqwest::Error,
    },

    /// The replica answered with an exception envelope
    #[error("Replica {replica} raised {}: {}", .envelope.exception_type, .envelope.exception_info)]
    Replica {
        /// Command endpoint of the replica
        replica: Endpoint,
        /// The forwarded exception
        envelope: ExceptionResponse,
    },
}

/// The three commands the naming core can issue to a storage replica.
///
/// Each returns the replica's `success` flag, or a typed error when the
/// replica could not be reached or raised an exception.
#[async_trait]
pub trait StorageCommands: Send + Sync {
    /// Creates an empty file on the replica.
    async fn create(&self, replica: &ReplicaAddr, path: &DfsPath) -> Result<bool, CommandError>;

    /// Deletes a file or subtree on the replica.
    async fn delete(&self, replica: &ReplicaAddr, path: &DfsPath) -> Result<bool, CommandError>;

    /// Tells the replica to fetch `path` from `source` (a client endpoint).
    async fn copy(
        &self,
        replica: &ReplicaAddr,
        path: &DfsPath,
        source: &Endpoint,
    ) -> Result<bool, CommandError>;
}

/// HTTP implementation of [`StorageCommands`].
pub struct HttpCommandClient {
    http: reqwest::Client,
    /// One async mutex per (command endpoint, path) in-flight key
    inflight: Mutex<HashMap<(Endpoint, DfsPath), Arc<tokio::sync::Mutex<()>>>>,
}

impl HttpCommandClient {
    /// Creates a client with default settings.
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self, endpoint: &Endpoint, path: &DfsPath) -> Arc<tokio::sync::Mutex<()>> {
        self.inflight
            .lock()
            .entry((endpoint.clone(), path.clone()))
            .or_default()
            .clone()
    }

    async fn post<B: Serialize>(
        &self,
        replica: &ReplicaAddr,
        uri: &str,
        path: &DfsPath,
        body: &B,
    ) -> Result<bool, CommandError> {
        let endpoint = replica.command_endpoint();
        let slot = self.slot(&endpoint, path);
        let _inflight = slot.lock().await;

        let url = format!("http://{}{}", endpoint, uri);
        debug!(%url, path = %path, "issuing storage command");

        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|source| CommandError::Transport {
                replica: endpoint.clone(),
                source,
            })?;

        if response.status().is_success() {
            let body: SuccessResponse =
                response
                    .json()
                    .await
                    .map_err(|source| CommandError::Transport {
                        replica: endpoint.clone(),
                        source,
                    })?;
            Ok(body.success)
        } else {
            let envelope: ExceptionResponse =
                response
                    .json()
                    .await
                    .map_err(|source| CommandError::Transport {
                        replica: endpoint.clone(),
                        source,
                    })?;
            Err(CommandError::Replica {
                replica: endpoint,
                envelope,
            })
        }
    }
}

impl Default for HttpCommandClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageCommands for HttpCommandClient {
    async fn create(&self, replica: &ReplicaAddr, path: &DfsPath) -> Result<bool, CommandError> {
        let body = StoragePathRequest { path: path.clone() };
        self.post(replica, CREATE_URI, path, &body).await
    }

    async fn delete(&self, replica: &ReplicaAddr, path: &DfsPath) -> Result<bool, CommandError> {
        let body = StoragePathRequest { path: path.clone() };
        self.post(replica, DELETE_URI, path, &body).await
    }

    async fn copy(
        &self,
        replica: &ReplicaAddr,
        path: &DfsPath,
        source: &Endpoint,
    ) -> Result<bool, CommandError> {
        let body = StorageCopyRequest {
            path: path.clone(),
            server_ip: source.host.clone(),
            server_port: source.port,
        };
        self.post(replica, COPY_URI, path, &body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inflight_slots_are_per_replica_and_path() {
        let client = HttpCommandClient::new();
        let a = Endpoint { host: "127.0.0.1".to_string(), port: 7001 };
        let b = Endpoint { host: "127.0.0.1".to_string(), port: 7003 };
        let f = DfsPath::parse("/f").unwrap();
        let g = DfsPath::parse("/g").unwrap();

        let slot_af = client.slot(&a, &f);
        assert!(Arc::ptr_eq(&slot_af, &client.slot(&a, &f)));
        assert!(!Arc::ptr_eq(&slot_af, &client.slot(&a, &g)));
        assert!(!Arc::ptr_eq(&slot_af, &client.slot(&b, &f)));
    }
}
