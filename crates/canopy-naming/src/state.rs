//! Shared state handed to every request handler.

use std::sync::Arc;

use canopy_fleet::{Registry, ReplicationPolicy};
use canopy_namespace::{LockManager, Tree};

/// The core components behind the gateway, shared across handlers.
///
/// The tree, the lock manager, the registry, and the policy each guard
/// their own state; this struct is plain plumbing and owns no locks of
/// its own.
#[derive(Clone)]
pub struct ServiceState {
    /// The naming tree
    pub tree: Arc<Tree>,
    /// Hierarchical lock manager over the tree
    pub locks: Arc<LockManager>,
    /// Storage replica roster and replica index
    pub registry: Arc<Registry>,
    /// Replication and invalidation policy
    pub policy: Arc<ReplicationPolicy>,
}
