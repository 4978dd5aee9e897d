//! Storage command API: requests the naming core issues to a replica's
//! command endpoint.
//!
//! Three methods, each a POST with a fixed-schema JSON body and a
//! `{success}` response (the exception envelope on failure).

use canopy_core::DfsPath;
use serde::{Deserialize, Serialize};

/// URI of the create command on a replica's command endpoint.
pub const CREATE_URI: &str = "/storage_create";
/// URI of the delete command on a replica's command endpoint.
pub const DELETE_URI: &str = "/storage_delete";
/// URI of the copy command on a replica's command endpoint.
pub const COPY_URI: &str = "/storage_copy";

/// Body of `/storage_create` and `/storage_delete`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoragePathRequest {
    /// Path of the file (or subtree, for delete) on the replica
    pub path: DfsPath,
}

/// Body of `/storage_copy`: fetch `path` from the given source replica's
/// client endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageCopyRequest {
    /// Path of the file to copy
    pub path: DfsPath,
    /// Source replica host
    pub server_ip: String,
    /// Source replica client port
    pub server_port: u16,
}
