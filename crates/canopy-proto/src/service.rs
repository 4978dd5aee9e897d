//! Client-facing service API bodies.
//!
//! Every service method is an HTTP POST with one of these JSON bodies.
//! Paths travel as raw strings and are validated by the gateway, so that a
//! malformed path surfaces as an `IllegalArgumentException` rather than a
//! decode failure.

use serde::{Deserialize, Serialize};

/// Request carrying a single path, used by most service methods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathRequest {
    /// The path string as sent by the client
    pub path: String,
}

impl PathRequest {
    /// Creates a request for the given path string.
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

/// Request body for `/lock` and `/unlock`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRequest {
    /// The path to lock or unlock
    pub path: String,
    /// True for exclusive (write) access, false for shared (read)
    pub exclusive: bool,
}

/// Generic boolean result body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessResponse {
    /// Whether the operation took effect
    pub success: bool,
}

impl SuccessResponse {
    /// A `{success: true}` body.
    pub fn ok() -> Self {
        Self { success: true }
    }

    /// A `{success: false}` body.
    pub fn failed() -> Self {
        Self { success: false }
    }
}

/// Response body for `/list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListResponse {
    /// Names of the directory's children, in unspecified order
    pub files: Vec<String>,
}

/// Response body for `/get_storage`: the client endpoint of a replica
/// hosting the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageInfo {
    /// Replica host address
    pub server_ip: String,
    /// Replica client port
    pub server_port: u16,
}
