//! Storage-facing registration API bodies.

use canopy_core::ReplicaAddr;
use serde::{Deserialize, Serialize};

/// Request body for `/register`, sent by a storage replica on startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRequest {
    /// Host address of the replica
    pub storage_ip: String,
    /// Port the replica serves client byte I/O on
    pub client_port: u16,
    /// Port the replica accepts naming commands on
    pub command_port: u16,
    /// Paths of files the replica already holds on disk
    pub files: Vec<String>,
}

impl RegisterRequest {
    /// Returns the replica address carried by this request.
    pub fn addr(&self) -> ReplicaAddr {
        ReplicaAddr::new(self.storage_ip.clone(), self.client_port, self.command_port)
    }
}

/// Response body for `/register`: paths the replica must delete locally
/// because the naming service rejected them.
///
/// Rejected paths are echoed back exactly as reported, including ones that
/// never parsed as valid paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterResponse {
    /// Paths to delete
    pub files: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_request_shape() {
        let req: RegisterRequest = serde_json::from_str(
            r#"{"storage_ip": "127.0.0.1", "client_port": 7000,
                "command_port": 7001, "files": ["/a", "/b/c"]}"#,
        )
        .unwrap();
        assert_eq!(req.addr().to_string(), "127.0.0.1:7000/7001");
        assert_eq!(req.files.len(), 2);
    }

    #[test]
    fn test_register_response_shape() {
        let resp = RegisterResponse {
            files: vec!["/a".to_string()],
        };
        assert_eq!(serde_json::to_string(&resp).unwrap(), r#"{"files":["/a"]}"#);
    }
}
