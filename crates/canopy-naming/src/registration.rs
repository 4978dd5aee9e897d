//! Storage-facing registration endpoint.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use canopy_core::DfsPath;
use canopy_proto::{RegisterRequest, RegisterResponse};
use tracing::info;

use crate::error::ApiError;
use crate::service::unknown_command;
use crate::state::ServiceState;

/// Builds the storage-facing router.
pub fn registration_router(state: ServiceState) -> Router {
    Router::new()
        .route("/register", post(register))
        .fallback(unknown_command)
        .with_state(state)
}

/// Registers a storage replica and reconciles its reported file set.
///
/// Reported paths that collide with the existing tree (or never parse)
/// come back in the response as files the replica must delete locally;
/// accepted paths are materialized in the tree with this replica as owner.
async fn register(
    State(state): State<ServiceState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, ApiError> {
    let addr = req.addr();
    let id = state.registry.register(addr.clone()).map_err(|_| {
        ApiError::Conflict("this storage server is already registered.".to_string())
    })?;

    let mut rejected: Vec<String> = Vec::new();
    let mut reported: Vec<DfsPath> = Vec::new();
    for raw in &req.files {
        match DfsPath::parse(raw) {
            Ok(path) => reported.push(path),
            Err(_) => rejected.push(raw.clone()),
        }
    }

    let collisions = state.tree.merge_registration(&reported);
    for path in &reported {
        if !collisions.contains(path) {
            state.registry.record_file(path, id);
        }
    }
    rejected.extend(collisions.iter().map(|p| p.to_string()));

    info!(
        replica = %id,
        addr = %addr,
        accepted = reported.len() - collisions.len(),
        rejected = rejected.len(),
        "registered storage replica"
    );
    Ok(Json(RegisterResponse { files: rejected }))
}
