//! In-process cluster harness.
//!
//! Starts a real naming service on ephemeral ports, speaking real HTTP in
//! both directions: tests act as clients via `reqwest`, and the naming core
//! issues storage commands to [`MockStorage`](crate::storage::MockStorage)
//! replicas over the wire.

use canopy_core::DEFAULT_REPLICATION_THRESHOLD;
use canopy_naming::{NamingConfig, NamingService, RunningService};
use canopy_proto::{
    ListResponse, LockRequest, PathRequest, RegisterRequest, RegisterResponse, SuccessResponse,
};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::storage::MockStorage;

/// A running naming service plus an HTTP client to talk to it.
pub struct TestCluster {
    /// The running naming service
    pub naming: RunningService,
    http: reqwest::Client,
}

impl TestCluster {
    /// Starts a cluster with the default replication threshold.
    pub async fn start() -> Self {
        Self::start_with_threshold(DEFAULT_REPLICATION_THRESHOLD).await
    }

    /// Starts a cluster with a custom replication threshold.
    pub async fn start_with_threshold(threshold: u32) -> Self {
        let config = NamingConfig {
            service_addr: "127.0.0.1:0".parse().expect("valid address"),
            registration_addr: "127.0.0.1:0".parse().expect("valid address"),
            replication_threshold: threshold,
        };
        let naming = NamingService::with_http_commands(config)
            .serve()
            .await
            .expect("naming service binds");
        Self {
            naming,
            http: reqwest::Client::new(),
        }
    }

    /// POSTs `body` to a service-endpoint method.
    pub async fn service_post<B: Serialize>(&self, uri: &str, body: &B) -> reqwest::Response {
        let url = format!("http://{}{}", self.naming.service_addr, uri);
        self.http.post(url).json(body).send().await.expect("service request")
    }

    /// POSTs `body` to a service method and decodes the JSON reply.
    pub async fn service_call<B: Serialize, T: DeserializeOwned>(
        &self,
        uri: &str,
        body: &B,
    ) -> (StatusCode, T) {
        let response = self.service_post(uri, body).await;
        let status = response.status();
        let value = response.json().await.expect("json body");
        (status, value)
    }

    /// Registers a mock replica reporting the given file paths, returning
    /// the HTTP status and the files-to-delete list.
    pub async fn register(
        &self,
        replica: &MockStorage,
        files: &[&str],
    ) -> (StatusCode, RegisterResponse) {
        let request = RegisterRequest {
            storage_ip: replica.addr.host.clone(),
            client_port: replica.addr.client_port,
            command_port: replica.addr.command_port,
            files: files.iter().map(|f| f.to_string()).collect(),
        };
        let url = format!("http://{}/register", self.naming.registration_addr);
        let response = self
            .http
            .post(url)
            .json(&request)
            .send()
            .await
            .expect("registration request");
        let status = response.status();
        let body = response.json().await.expect("registration body");
        (status, body)
    }

    /// Calls `/create_file`, expecting a 200.
    pub async fn create_file(&self, path: &str) -> SuccessResponse {
        let (status, body) = self
            .service_call("/create_file", &PathRequest::new(path))
            .await;
        assert_eq!(status, StatusCode::OK, "create_file {path}");
        body
    }

    /// Calls `/create_directory`, expecting a 200.
    pub async fn create_directory(&self, path: &str) -> SuccessResponse {
        let (status, body) = self
            .service_call("/create_directory", &PathRequest::new(path))
            .await;
        assert_eq!(status, StatusCode::OK, "create_directory {path}");
        body
    }

    /// Calls `/list`, expecting a 200, and returns sorted child names.
    pub async fn list(&self, path: &str) -> Vec<String> {
        let (status, body): (_, ListResponse) =
            self.service_call("/list", &PathRequest::new(path)).await;
        assert_eq!(status, StatusCode::OK, "list {path}");
        let mut files = body.files;
        files.sort();
        files
    }

    /// Calls `/lock`, returning the HTTP status.
    pub async fn lock(&self, path: &str, exclusive: bool) -> StatusCode {
        let request = LockRequest {
            path: path.to_string(),
            exclusive,
        };
        self.service_post("/lock", &request).await.status()
    }

    /// Calls `/unlock`, returning the HTTP status.
    pub async fn unlock(&self, path: &str, exclusive: bool) -> StatusCode {
        let request = LockRequest {
            path: path.to_string(),
            exclusive,
        };
        self.service_post("/unlock", &request).await.status()
    }

    /// Locks and unlocks the path in shared mode, expecting both to
    /// succeed. One such round-trip is one counted read.
    pub async fn read_once(&self, path: &str) {
        assert_eq!(self.lock(path, false).await, StatusCode::OK);
        assert_eq!(self.unlock(path, false).await, StatusCode::OK);
    }
}
