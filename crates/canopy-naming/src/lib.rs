//! Canopy Naming - HTTP gateway for the naming service.
//!
//! Assembles the coordination core (tree, lock manager, registry,
//! replication policy) behind two HTTP listeners:
//! - the service endpoint for clients (paths, locks, storage lookup)
//! - the registration endpoint for storage replicas
//!
//! Access events published by the lock manager are consumed by a driver
//! task that feeds the replication policy.

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod error;
pub mod registration;
pub mod service;
pub mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use canopy_core::DEFAULT_REPLICATION_THRESHOLD;
use canopy_fleet::{HttpCommandClient, Registry, ReplicationPolicy, StorageCommands};
use canopy_namespace::{AccessEvent, LockManager, LockMode, Tree};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

pub use error::ApiError;
pub use registration::registration_router;
pub use service::service_router;
pub use state::ServiceState;

/// Naming service configuration.
#[derive(Debug, Clone)]
pub struct NamingConfig {
    /// Address of the client-facing service listener
    pub service_addr: SocketAddr,
    /// Address of the storage-facing registration listener
    pub registration_addr: SocketAddr,
    /// Shared accesses of a file that trigger a replication cycle
    pub replication_threshold: u32,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            service_addr: "127.0.0.1:8080".parse().expect("valid default address"),
            registration_addr: "127.0.0.1:8090".parse().expect("valid default address"),
            replication_threshold: DEFAULT_REPLICATION_THRESHOLD,
        }
    }
}

/// An assembled, not-yet-listening naming service.
pub struct NamingService {
    config: NamingConfig,
    state: ServiceState,
    events: mpsc::UnboundedReceiver<AccessEvent>,
}

impl NamingService {
    /// Assembles the core with the given outbound command channel.
    pub fn new(config: NamingConfig, commands: Arc<dyn StorageCommands>) -> Self {
        let tree = Arc::new(Tree::new());
        let (locks, events) = LockManager::new(tree.clone());
        let registry = Arc::new(Registry::new());
        let policy = Arc::new(ReplicationPolicy::with_threshold(
            registry.clone(),
            commands,
            config.replication_threshold,
        ));
        let state = ServiceState {
            tree,
            locks: Arc::new(locks),
            registry,
            policy,
        };
        Self {
            config,
            state,
            events,
        }
    }

    /// Assembles the core with the HTTP storage command client.
    pub fn with_http_commands(config: NamingConfig) -> Self {
        Self::new(config, Arc::new(HttpCommandClient::new()))
    }

    /// Returns the shared core state.
    pub fn state(&self) -> &ServiceState {
        &self.state
    }

    /// Binds both listeners and starts serving.
    pub async fn serve(self) -> std::io::Result<RunningService> {
        let service_listener = TcpListener::bind(self.config.service_addr).await?;
        let registration_listener = TcpListener::bind(self.config.registration_addr).await?;
        let service_addr = service_listener.local_addr()?;
        let registration_addr = registration_listener.local_addr()?;

        let driver = tokio::spawn(drive_events(self.events, self.state.clone()));
        let service = tokio::spawn(run_server(
            service_listener,
            service_router(self.state.clone()),
        ));
        let registration = tokio::spawn(run_server(
            registration_listener,
            registration_router(self.state.clone()),
        ));

        info!(%service_addr, %registration_addr, "naming service listening");
        Ok(RunningService {
            service_addr,
            registration_addr,
            state: self.state,
            tasks: vec![driver, service, registration],
        })
    }
}

/// A naming service with live listeners.
pub struct RunningService {
    /// Bound address of the service listener
    pub service_addr: SocketAddr,
    /// Bound address of the registration listener
    pub registration_addr: SocketAddr,
    state: ServiceState,
    tasks: Vec<JoinHandle<()>>,
}

impl RunningService {
    /// Returns the shared core state.
    pub fn state(&self) -> &ServiceState {
        &self.state
    }

    /// Stops the listeners and the event driver.
    pub fn shutdown(&self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

impl Drop for RunningService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn drive_events(mut events: mpsc::UnboundedReceiver<AccessEvent>, state: ServiceState) {
    while let Some(event) = events.recv().await {
        match event.mode {
            LockMode::Shared => state.policy.note_read(&event.path),
            LockMode::Exclusive => state.policy.note_write(&event.path),
        }
    }
}

async fn run_server(listener: TcpListener, router: axum::Router) {
    if let Err(err) = axum::serve(listener, router).await {
        error!(error = %err, "listener terminated");
    }
}
