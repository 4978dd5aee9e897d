//! Storage replica addressing.
//!
//! A replica is identified to the naming service by a storage IP and two
//! ports: one for client byte I/O and one for naming-issued commands.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a registered storage replica.
///
/// Assigned by the registry in registration order, starting at 0, and never
/// reused. Replicas are never removed from the roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReplicaId(pub u32);

impl fmt::Display for ReplicaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "replica-{}", self.0)
    }
}

/// A network endpoint `(host, port)` on a storage replica.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    /// Host address
    pub host: String,
    /// TCP port
    pub port: u16,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Address of a storage replica: one host, two service ports.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReplicaAddr {
    /// Host address shared by both endpoints
    pub host: String,
    /// Port serving client byte-range I/O
    pub client_port: u16,
    /// Port serving naming-issued commands
    pub command_port: u16,
}

impl ReplicaAddr {
    /// Creates a new replica address.
    pub fn new(host: impl Into<String>, client_port: u16, command_port: u16) -> Self {
        Self {
            host: host.into(),
            client_port,
            command_port,
        }
    }

    /// Returns the client-facing endpoint.
    pub fn client_endpoint(&self) -> Endpoint {
        Endpoint {
            host: self.host.clone(),
            port: self.client_port,
        }
    }

    /// Returns the command endpoint.
    pub fn command_endpoint(&self) -> Endpoint {
        Endpoint {
            host: self.host.clone(),
            port: self.command_port,
        }
    }

    /// Returns true if either endpoint collides with one of `other`'s.
    pub fn collides_with(&self, other: &ReplicaAddr) -> bool {
        self.client_endpoint() == other.client_endpoint()
            || self.command_endpoint() == other.command_endpoint()
    }
}

impl fmt::Display for ReplicaAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.host, self.client_port, self.command_port)
    }
}
