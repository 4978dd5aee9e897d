//! Mock storage replica for integration testing.
//!
//! Serves the storage command API on an ephemeral port and records every
//! command received, so tests can observe what the naming core instructed
//! the fleet to do. The client port is a second ephemeral bind that is
//! held open but never served; it only has to be a unique endpoint.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use canopy_core::{DfsPath, Endpoint, ReplicaAddr};
use canopy_proto::{StorageCopyRequest, StoragePathRequest, SuccessResponse};
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::debug;

/// A storage command observed by a mock replica.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceivedCommand {
    /// `/storage_create` for the path
    Create(DfsPath),
    /// `/storage_delete` for the path
    Delete(DfsPath),
    /// `/storage_copy` of the path from the source client endpoint
    Copy(DfsPath, Endpoint),
}

type CommandLog = Arc<Mutex<Vec<ReceivedCommand>>>;

/// An in-process storage replica that records commands.
pub struct MockStorage {
    /// Address the replica registers under
    pub addr: ReplicaAddr,
    commands: CommandLog,
    _client_listener: TcpListener,
    server: JoinHandle<()>,
}

impl MockStorage {
    /// Spawns a mock replica on ephemeral ports.
    pub async fn spawn() -> Self {
        let command_listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind command listener");
        let client_listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind client listener");
        let command_port = command_listener.local_addr().expect("local addr").port();
        let client_port = client_listener.local_addr().expect("local addr").port();

        let commands: CommandLog = Arc::new(Mutex::new(Vec::new()));
        let router = Router::new()
            .route("/storage_create", post(storage_create))
            .route("/storage_delete", post(storage_delete))
            .route("/storage_copy", post(storage_copy))
            .with_state(commands.clone());

        let server = tokio::spawn(async move {
            let _ = axum::serve(command_listener, router).await;
        });

        Self {
            addr: ReplicaAddr::new("127.0.0.1", client_port, command_port),
            commands,
            _client_listener: client_listener,
            server,
        }
    }

    /// Returns every command received so far, in arrival order.
    pub fn commands(&self) -> Vec<ReceivedCommand> {
        self.commands.lock().clone()
    }

    /// Waits until at least `count` commands have arrived.
    pub async fn wait_for_commands(&self, count: usize, timeout: Duration) -> Vec<ReceivedCommand> {
        let start = std::time::Instant::now();
        loop {
            let commands = self.commands();
            if commands.len() >= count {
                return commands;
            }
            assert!(
                start.elapsed() < timeout,
                "timed out waiting for {count} commands, saw {commands:?}"
            );
            sleep(Duration::from_millis(10)).await;
        }
    }
}

impl Drop for MockStorage {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn storage_create(
    State(commands): State<CommandLog>,
    Json(req): Json<StoragePathRequest>,
) -> Json<SuccessResponse> {
    debug!(path = %req.path, "mock replica: create");
    commands.lock().push(ReceivedCommand::Create(req.path));
    Json(SuccessResponse::ok())
}

async fn storage_delete(
    State(commands): State<CommandLog>,
    Json(req): Json<StoragePathRequest>,
) -> Json<SuccessResponse> {
    debug!(path = %req.path, "mock replica: delete");
    commands.lock().push(ReceivedCommand::Delete(req.path));
    Json(SuccessResponse::ok())
}

async fn storage_copy(
    State(commands): State<CommandLog>,
    Json(req): Json<StorageCopyRequest>,
) -> Json<SuccessResponse> {
    debug!(path = %req.path, source = %req.server_ip, "mock replica: copy");
    commands.lock().push(ReceivedCommand::Copy(
        req.path,
        Endpoint {
            host: req.server_ip,
            port: req.server_port,
        },
    ));
    Json(SuccessResponse::ok())
}
