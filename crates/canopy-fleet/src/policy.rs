//! Access-driven replication and write invalidation.
//!
//! Shared unlocks of a file bump its access counter; when the counter
//! reaches the threshold it resets and the file is copied from its owner
//! to every replica not yet holding it. An exclusive unlock invalidates
//! all non-owner copies, leaving the owner as the single surviving
//! replica. Deletes fan out to every replica that held the file.
//!
//! All storage commands run in background tasks: they are best-effort, and
//! the request that triggered them completes as soon as the decision is
//! recorded. A failed copy simply leaves the target out of the replica
//! set; a failed delete is logged and forgotten.

use std::sync::Arc;

use canopy_core::{DfsPath, DEFAULT_REPLICATION_THRESHOLD};
use tracing::{debug, info, warn};

use crate::command::StorageCommands;
use crate::registry::{Registry, StorageReplica};

/// Decides when files are replicated and invalidated across the fleet.
pub struct ReplicationPolicy {
    registry: Arc<Registry>,
    commands: Arc<dyn StorageCommands>,
    threshold: u32,
}

impl ReplicationPolicy {
    /// Creates a policy with the default replication threshold.
    pub fn new(registry: Arc<Registry>, commands: Arc<dyn StorageCommands>) -> Self {
        Self::with_threshold(registry, commands, DEFAULT_REPLICATION_THRESHOLD)
    }

    /// Creates a policy with a custom replication threshold.
    pub fn with_threshold(
        registry: Arc<Registry>,
        commands: Arc<dyn StorageCommands>,
        threshold: u32,
    ) -> Self {
        Self {
            registry,
            commands,
            threshold,
        }
    }

    /// Counts a shared unlock of `path`; at the threshold, schedules copies
    /// to every replica not yet holding the file.
    pub fn note_read(&self, path: &DfsPath) {
        if !self.registry.bump_access(path, self.threshold) {
            return;
        }
        let Some(plan) = self.registry.copy_plan(path) else {
            debug!(path = %path, "read pressure but nowhere to replicate");
            return;
        };

        info!(path = %path, targets = plan.targets.len(), "replicating by read pressure");
        for target in plan.targets {
            let registry = self.registry.clone();
            let commands = self.commands.clone();
            let source = plan.source.clone();
            let path = path.clone();
            tokio::spawn(async move {
                match commands.copy(&target.addr, &path, &source).await {
                    Ok(true) => registry.add_replica(&path, target.id),
                    Ok(false) => {
                        warn!(path = %path, replica = %target.id, "replica refused copy")
                    }
                    Err(err) => {
                        warn!(path = %path, replica = %target.id, error = %err, "copy failed")
                    }
                }
            });
        }
    }

    /// Handles an exclusive unlock of `path`: every non-owner copy is now
    /// stale, so it is dropped from the replica set and deleted.
    pub fn note_write(&self, path: &DfsPath) {
        let stale = self.registry.invalidate_non_owners(path);
        if stale.is_empty() {
            return;
        }
        info!(path = %path, stale = stale.len(), "invalidating replicas after write");
        self.schedule_deletes(path, stale);
    }

    /// Handles a namespace delete of `path`; `files` are the file paths
    /// that were removed (for a file, just the path itself).
    ///
    /// Sends a single delete of `path` to every replica that held any of
    /// the removed files.
    pub fn note_delete(&self, path: &DfsPath, files: &[DfsPath]) {
        let mut hosts: Vec<StorageReplica> = Vec::new();
        for file in files {
            for host in self.registry.drop_file(file) {
                if !hosts.iter().any(|h| h.id == host.id) {
                    hosts.push(host);
                }
            }
        }
        if hosts.is_empty() {
            return;
        }
        info!(path = %path, hosts = hosts.len(), "deleting from storage");
        self.schedule_deletes(path, hosts);
    }

    /// Creates `path` on `replica` and records it as the file's owner.
    ///
    /// The storage command is awaited so the caller observes an up-to-date
    /// fleet, but a command failure is logged rather than propagated: the
    /// naming entry stands either way.
    pub async fn provision(&self, path: &DfsPath, replica: &StorageReplica) {
        self.registry.record_file(path, replica.id);
        match self.commands.create(&replica.addr, path).await {
            Ok(true) => debug!(path = %path, replica = %replica.id, "provisioned on storage"),
            Ok(false) => warn!(path = %path, replica = %replica.id, "replica refused create"),
            Err(err) => warn!(path = %path, replica = %replica.id, error = %err, "create failed"),
        }
    }

    fn schedule_deletes(&self, path: &DfsPath, replicas: Vec<StorageReplica>) {
        for replica in replicas {
            let commands = self.commands.clone();
            let path = path.clone();
            tokio::spawn(async move {
                match commands.delete(&replica.addr, &path).await {
                    Ok(true) => {}
                    Ok(false) => {
                        warn!(path = %path, replica = %replica.id, "replica refused delete")
                    }
                    Err(err) => {
                        warn!(path = %path, replica = %replica.id, error = %err, "delete failed")
                    }
                }
            });
        }
    }
}
