//! Canopy Core - Core types for the Canopy distributed filesystem naming service.
//!
//! This crate provides:
//! - The absolute path codec shared by every component (`DfsPath`)
//! - Storage replica addressing (`ReplicaId`, `ReplicaAddr`)
//! - Shared configuration constants

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod path;
pub mod replica;

pub use path::{DfsPath, PathParseError};
pub use replica::{Endpoint, ReplicaAddr, ReplicaId};

/// Number of shared accesses of a file that triggers a replication cycle.
pub const DEFAULT_REPLICATION_THRESHOLD: u32 = 20;
