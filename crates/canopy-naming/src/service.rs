//! Client-facing service endpoints.
//!
//! Every handler follows the same shape: decode the JSON body, validate the
//! path, call into the tree / lock manager / registry, and serialize the
//! result or an exception envelope. The handlers themselves hold no state
//! beyond the shared [`ServiceState`].

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use canopy_core::DfsPath;
use canopy_namespace::{LockMode, LockPathError, NodeKind, TreeError};
use canopy_proto::{ListResponse, LockRequest, PathRequest, StorageInfo, SuccessResponse};
use tracing::{debug, info};

use crate::error::ApiError;
use crate::state::ServiceState;

/// Builds the client-facing router.
pub fn service_router(state: ServiceState) -> Router {
    Router::new()
        .route("/is_valid_path", post(is_valid_path))
        .route("/get_storage", post(get_storage))
        .route("/is_directory", post(is_directory))
        .route("/list", post(list))
        .route("/create_file", post(create_file))
        .route("/create_directory", post(create_directory))
        .route("/delete", post(delete))
        .route("/lock", post(lock))
        .route("/unlock", post(unlock))
        .fallback(unknown_command)
        .with_state(state)
}

/// 400 for any route outside the API, mirroring the original server.
pub async fn unknown_command() -> (StatusCode, &'static str) {
    (StatusCode::BAD_REQUEST, "Unknown Command")
}

async fn is_valid_path(Json(req): Json<PathRequest>) -> Json<SuccessResponse> {
    let valid = DfsPath::parse(&req.path).is_ok();
    Json(SuccessResponse { success: valid })
}

async fn get_storage(
    State(state): State<ServiceState>,
    Json(req): Json<PathRequest>,
) -> Result<Json<StorageInfo>, ApiError> {
    let path = DfsPath::parse(&req.path)?;
    match state.tree.kind(&path) {
        Some(NodeKind::File) => {}
        Some(NodeKind::Directory) | None => return Err(ApiError::not_found()),
    }
    let endpoint = state
        .registry
        .hosting_endpoint(&path)
        .ok_or_else(ApiError::not_found)?;
    Ok(Json(StorageInfo {
        server_ip: endpoint.host,
        server_port: endpoint.port,
    }))
}

async fn is_directory(
    State(state): State<ServiceState>,
    Json(req): Json<PathRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let path = DfsPath::parse(&req.path)?;
    let is_dir = state
        .tree
        .is_directory(&path)
        .map_err(|_| ApiError::not_found())?;
    Ok(Json(SuccessResponse { success: is_dir }))
}

async fn list(
    State(state): State<ServiceState>,
    Json(req): Json<PathRequest>,
) -> Result<Json<ListResponse>, ApiError> {
    let path = DfsPath::parse(&req.path)?;
    let files = state.tree.list(&path).map_err(|_| ApiError::not_found())?;
    Ok(Json(ListResponse { files }))
}

async fn create_file(
    State(state): State<ServiceState>,
    Json(req): Json<PathRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let path = DfsPath::parse(&req.path)?;
    if path.is_root() {
        return Ok(Json(SuccessResponse::failed()));
    }
    let owner = state.registry.first_replica().ok_or_else(|| {
        ApiError::Conflict("no storage servers are registered.".to_string())
    })?;

    match state.tree.create_file(&path) {
        Ok(()) => {
            state.policy.provision(&path, &owner).await;
            info!(path = %path, owner = %owner.id, "created file");
            Ok(Json(SuccessResponse::ok()))
        }
        Err(TreeError::AlreadyExists(_)) => Ok(Json(SuccessResponse::failed())),
        Err(_) => Err(ApiError::not_found()),
    }
}

async fn create_directory(
    State(state): State<ServiceState>,
    Json(req): Json<PathRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let path = DfsPath::parse(&req.path)?;
    if path.is_root() {
        return Ok(Json(SuccessResponse::failed()));
    }
    match state.tree.create_directory(&path) {
        Ok(()) => {
            info!(path = %path, "created directory");
            Ok(Json(SuccessResponse::ok()))
        }
        Err(TreeError::AlreadyExists(_)) => Ok(Json(SuccessResponse::failed())),
        Err(_) => Err(ApiError::not_found()),
    }
}

async fn delete(
    State(state): State<ServiceState>,
    Json(req): Json<PathRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let path = DfsPath::parse(&req.path)?;
    match state.tree.delete(&path) {
        Ok(removed) => {
            info!(path = %path, files = removed.files.len(), "deleted subtree");
            state.policy.note_delete(&path, &removed.files);
            Ok(Json(SuccessResponse::ok()))
        }
        Err(TreeError::IsRoot) => Err(ApiError::IllegalArgument(
            "the root directory cannot be deleted.".to_string(),
        )),
        Err(_) => Err(ApiError::not_found()),
    }
}

async fn lock(
    State(state): State<ServiceState>,
    Json(req): Json<LockRequest>,
) -> Result<(), ApiError> {
    let path = DfsPath::parse(&req.path)?;
    let mode = mode_of(&req);
    debug!(path = %path, ?mode, "lock requested");

    // Blocks until granted; dropping this future (client disconnect)
    // withdraws the queued ticket.
    state
        .locks
        .lock(&path, mode)
        .await
        .map_err(|_| ApiError::not_found())
}

async fn unlock(
    State(state): State<ServiceState>,
    Json(req): Json<LockRequest>,
) -> Result<(), ApiError> {
    let path = DfsPath::parse(&req.path)?;
    let mode = mode_of(&req);
    debug!(path = %path, ?mode, "unlock requested");

    state.locks.unlock(&path, mode).map_err(|err| match err {
        LockPathError::Tree(_) => ApiError::not_found_as_argument(),
        LockPathError::Node(_) => ApiError::IllegalArgument(
            "no matching lock is held on the path.".to_string(),
        ),
    })
}

fn mode_of(req: &LockRequest) -> LockMode {
    if req.exclusive {
        LockMode::Exclusive
    } else {
        LockMode::Shared
    }
}
