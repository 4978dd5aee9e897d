//! Storage replica roster and per-file replica index.
//!
//! The registry owns everything the naming core knows about the fleet:
//! which replicas exist (registration order, never removed), which replica
//! first registered each file (the owner), which replicas currently hold a
//! copy, and how often each file has been read since its last replication
//! cycle. All of it sits behind one mutex; every operation is a short
//! critical section.

use std::collections::HashMap;

use canopy_core::{DfsPath, Endpoint, ReplicaAddr, ReplicaId};
use parking_lot::Mutex;
use thiserror::Error;

/// A registered storage replica.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageReplica {
    /// Identifier assigned at registration
    pub id: ReplicaId,
    /// The replica's address
    pub addr: ReplicaAddr,
}

/// Errors from registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// One of the replica's endpoints is already registered
    #[error("Storage replica already registered: {0}")]
    AlreadyRegistered(ReplicaAddr),

    /// An operation needed a replica but none are registered
    #[error("No storage replicas are registered")]
    NoReplicas,
}

/// The replicas to copy a file to, and the source to copy it from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyPlan {
    /// Client endpoint of the file's owner
    pub source: Endpoint,
    /// Replicas that do not yet hold the file
    pub targets: Vec<StorageReplica>,
}

#[derive(Debug, Default)]
struct RegistryState {
    /// All replicas in registration order; never removed
    roster: Vec<StorageReplica>,
    /// First registrant of each live file
    owners: HashMap<DfsPath, ReplicaId>,
    /// Replicas holding each live file, owner first
    replicas: HashMap<DfsPath, Vec<ReplicaId>>,
    /// Shared accesses since the last replication cycle
    access_counts: HashMap<DfsPath, u32>,
}

/// The storage-server roster and replica index.
#[derive(Debug, Default)]
pub struct Registry {
    state: Mutex<RegistryState>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a replica to the roster, rejecting endpoint collisions.
    pub fn register(&self, addr: ReplicaAddr) -> Result<ReplicaId, RegistryError> {
        let mut state = self.state.lock();
        if state.roster.iter().any(|r| r.addr.collides_with(&addr)) {
            return Err(RegistryError::AlreadyRegistered(addr));
        }
        let id = ReplicaId(state.roster.len() as u32);
        state.roster.push(StorageReplica { id, addr });
        Ok(id)
    }

    /// Returns the first-registered replica, if any.
    pub fn first_replica(&self) -> Option<StorageReplica> {
        self.state.lock().roster.first().cloned()
    }

    /// Returns the number of registered replicas.
    pub fn replica_count(&self) -> usize {
        self.state.lock().roster.len()
    }

    /// Records a newly created or newly reported file with its owner.
    pub fn record_file(&self, path: &DfsPath, owner: ReplicaId) {
        let mut state = self.state.lock();
        state.owners.insert(path.clone(), owner);
        state.replicas.insert(path.clone(), vec![owner]);
        state.access_counts.insert(path.clone(), 0);
    }

    /// Returns the owner of a file.
    pub fn owner_of(&self, path: &DfsPath) -> Option<ReplicaId> {
        self.state.lock().owners.get(path).copied()
    }

    /// Returns the replicas currently holding a file, owner first.
    pub fn replicas_of(&self, path: &DfsPath) -> Vec<ReplicaId> {
        self.state.lock().replicas.get(path).cloned().unwrap_or_default()
    }

    /// Returns the client endpoint of a replica hosting the file: the
    /// earliest-registered holder.
    pub fn hosting_endpoint(&self, path: &DfsPath) -> Option<Endpoint> {
        let state = self.state.lock();
        let holders = state.replicas.get(path)?;
        state
            .roster
            .iter()
            .find(|r| holders.contains(&r.id))
            .map(|r| r.addr.client_endpoint())
    }

    /// Adds a replica to a file's holder set after a successful copy.
    pub fn add_replica(&self, path: &DfsPath, id: ReplicaId) {
        let mut state = self.state.lock();
        if let Some(holders) = state.replicas.get_mut(path) {
            if !holders.contains(&id) {
                holders.push(id);
            }
        }
    }

    /// Counts one shared access; returns true when the count reaches
    /// `threshold`, resetting it to zero.
    pub fn bump_access(&self, path: &DfsPath, threshold: u32) -> bool {
        let mut state = self.state.lock();
        let count = state.access_counts.entry(path.clone()).or_insert(0);
        *count += 1;
        if *count >= threshold {
            *count = 0;
            return true;
        }
        false
    }

    /// Builds the replication plan for a file: copy from the owner's
    /// client endpoint to every registered replica not yet holding it.
    ///
    /// Returns `None` if the file is unknown or there is nowhere to copy.
    pub fn copy_plan(&self, path: &DfsPath) -> Option<CopyPlan> {
        let state = self.state.lock();
        let holders = state.replicas.get(path)?;
        let owner = *state.owners.get(path)?;
        let source = state
            .roster
            .iter()
            .find(|r| r.id == owner)?
            .addr
            .client_endpoint();
        let targets: Vec<StorageReplica> = state
            .roster
            .iter()
            .filter(|r| !holders.contains(&r.id))
            .cloned()
            .collect();
        if targets.is_empty() {
            return None;
        }
        Some(CopyPlan { source, targets })
    }

    /// Removes every non-owner replica from a file's holder set, returning
    /// the removed replicas so their copies can be deleted.
    pub fn invalidate_non_owners(&self, path: &DfsPath) -> Vec<StorageReplica> {
        let mut state = self.state.lock();
        let Some(owner) = state.owners.get(path).copied() else {
            return Vec::new();
        };
        let Some(holders) = state.replicas.get_mut(path) else {
            return Vec::new();
        };
        let removed: Vec<ReplicaId> = holders.iter().copied().filter(|&id| id != owner).collect();
        holders.retain(|&id| id == owner);
        state
            .roster
            .iter()
            .filter(|r| removed.contains(&r.id))
            .cloned()
            .collect()
    }

    /// Forgets a deleted file, returning the replicas that held it.
    pub fn drop_file(&self, path: &DfsPath) -> Vec<StorageReplica> {
        let mut state = self.state.lock();
        state.owners.remove(path);
        state.access_counts.remove(path);
        let holders = state.replicas.remove(path).unwrap_or_default();
        state
            .roster
            .iter()
            .filter(|r| holders.contains(&r.id))
            .cloned()
            .collect()
    }
}
