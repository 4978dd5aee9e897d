//! Canopy Namespace - The naming tree and its fair lock protocol.
//!
//! This crate provides:
//! - `Tree`: the hierarchical directory/file namespace
//! - `LockNode`: per-node shared/exclusive lock state with FIFO queueing
//! - `LockManager`: path locking with shared locks on every ancestor

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod lock;
pub mod manager;
pub mod tree;

pub use lock::{LockError, LockMode, LockNode, Ticket};
pub use manager::{AccessEvent, LockManager, LockPathError};
pub use tree::{LockChain, NodeKind, RemovedSubtree, Tree, TreeError};
