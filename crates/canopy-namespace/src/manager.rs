//! Path locking over the tree.
//!
//! Locking a path takes a Shared lock on every strict ancestor (root first)
//! and then the requested mode on the target; each of those is an ordinary
//! ticketed request on that node's queue. All acquires walk root-to-leaf, so
//! two well-formed lock requests can never deadlock against each other.
//! Unlock releases the target and then the ancestors leaf-to-root.
//!
//! Successful unlocks of *file* paths are published as access events so the
//! replication policy can count reads and invalidate after writes.

use std::sync::Arc;

use canopy_core::DfsPath;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::lock::{LockError, LockMode, LockNode};
use crate::tree::{NodeKind, Tree, TreeError};

/// A completed unlock of a file path, in the mode that was released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessEvent {
    /// The file path that was unlocked
    pub path: DfsPath,
    /// The mode that was held
    pub mode: LockMode,
}

/// Errors from path lock operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockPathError {
    /// The path did not resolve in the tree
    #[error(transparent)]
    Tree(#[from] TreeError),

    /// A node-level lock operation failed
    #[error(transparent)]
    Node(#[from] LockError),
}

/// Grants and releases hierarchical locks on tree paths.
pub struct LockManager {
    tree: Arc<Tree>,
    events: mpsc::UnboundedSender<AccessEvent>,
}

impl LockManager {
    /// Creates a manager over the given tree, returning the receiving end
    /// of its access-event channel.
    pub fn new(tree: Arc<Tree>) -> (Self, mpsc::UnboundedReceiver<AccessEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        (Self { tree, events }, rx)
    }

    /// Locks `path` in `mode`, suspending until granted.
    ///
    /// Fails with `NotFound` before queueing if the path does not exist,
    /// and with `NodeRemoved` if the target or an ancestor is deleted
    /// while the request is queued.
    pub async fn lock(&self, path: &DfsPath, mode: LockMode) -> Result<(), LockPathError> {
        let chain = self.tree.lock_chain(path)?;

        let mut held: Vec<Arc<LockNode>> = Vec::with_capacity(chain.ancestors.len());
        for ancestor in &chain.ancestors {
            if let Err(err) = ancestor.acquire(LockMode::Shared).await {
                release_prefix(&held);
                return Err(err.into());
            }
            held.push(ancestor.clone());
        }

        if let Err(err) = chain.target.acquire(mode).await {
            release_prefix(&held);
            return Err(err.into());
        }

        debug!(path = %path, ?mode, "lock granted");
        Ok(())
    }

    /// Unlocks `path` in `mode` and wakes newly eligible waiters.
    ///
    /// Each earlier `lock` added exactly one Shared holder per ancestor;
    /// releasing a lock that is not held is a caller error.
    pub fn unlock(&self, path: &DfsPath, mode: LockMode) -> Result<(), LockPathError> {
        let chain = self.tree.lock_chain(path)?;

        chain.target.release(mode)?;
        for ancestor in chain.ancestors.iter().rev() {
            ancestor.release(LockMode::Shared)?;
        }
        debug!(path = %path, ?mode, "lock released");

        if chain.target_kind == NodeKind::File {
            // The receiver only goes away at shutdown; a dropped event is
            // harmless then.
            let _ = self.events.send(AccessEvent {
                path: path.clone(),
                mode,
            });
            trace!(path = %path, ?mode, "access event published");
        }
        Ok(())
    }
}

fn release_prefix(held: &[Arc<LockNode>]) {
    for node in held.iter().rev() {
        // The prefix holder we added may already be gone if the node was
        // closed by a delete; nothing left to release then.
        let _ = node.release(LockMode::Shared);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::sleep;

    use super::*;

    fn p(s: &str) -> DfsPath {
        DfsPath::parse(s).unwrap()
    }

    fn fixture() -> (Arc<Tree>, LockManager, mpsc::UnboundedReceiver<AccessEvent>) {
        let tree = Arc::new(Tree::new());
        tree.create_directory(&p("/a")).unwrap();
        tree.create_directory(&p("/a/b")).unwrap();
        tree.create_file(&p("/a/b/f")).unwrap();
        let (manager, events) = LockManager::new(tree.clone());
        (tree, manager, events)
    }

    #[tokio::test]
    async fn test_lock_unlock_roundtrip() {
        let (tree, manager, _events) = fixture();

        manager.lock(&p("/a/b/f"), LockMode::Exclusive).await.unwrap();
        manager.unlock(&p("/a/b/f"), LockMode::Exclusive).unwrap();

        for path in ["/", "/a", "/a/b", "/a/b/f"] {
            let chain = tree.lock_chain(&p(path)).unwrap();
            assert!(chain.target.is_idle(), "{path} should be idle");
        }
    }

    #[tokio::test]
    async fn test_lock_missing_path_fails_before_queueing() {
        let (tree, manager, _events) = fixture();
        let err = manager.lock(&p("/a/missing"), LockMode::Shared).await;
        assert!(matches!(err, Err(LockPathError::Tree(TreeError::NotFound(_)))));

        // No stray prefix holders were left behind.
        assert!(tree.lock_chain(&p("/a")).unwrap().target.is_idle());
        assert!(tree.lock_chain(&DfsPath::root()).unwrap().target.is_idle());
    }

    #[tokio::test]
    async fn test_root_lock_has_no_ancestors() {
        let (_tree, manager, _events) = fixture();
        manager.lock(&DfsPath::root(), LockMode::Exclusive).await.unwrap();
        manager.unlock(&DfsPath::root(), LockMode::Exclusive).unwrap();
        manager.lock(&DfsPath::root(), LockMode::Shared).await.unwrap();
        manager.unlock(&DfsPath::root(), LockMode::Shared).unwrap();
    }

    #[tokio::test]
    async fn test_ancestors_carry_one_shared_holder_per_lock() {
        let (tree, manager, _events) = fixture();

        manager.lock(&p("/a/b/f"), LockMode::Shared).await.unwrap();
        manager.lock(&p("/a/b/f"), LockMode::Shared).await.unwrap();

        assert_eq!(tree.lock_chain(&DfsPath::root()).unwrap().target.holder_count(), 2);
        assert_eq!(tree.lock_chain(&p("/a")).unwrap().target.holder_count(), 2);
        assert_eq!(tree.lock_chain(&p("/a/b")).unwrap().target.holder_count(), 2);
        assert_eq!(tree.lock_chain(&p("/a/b/f")).unwrap().target.holder_count(), 2);

        manager.unlock(&p("/a/b/f"), LockMode::Shared).unwrap();
        assert_eq!(tree.lock_chain(&p("/a")).unwrap().target.holder_count(), 1);
        manager.unlock(&p("/a/b/f"), LockMode::Shared).unwrap();
        assert!(tree.lock_chain(&p("/a")).unwrap().target.is_idle());
    }

    #[tokio::test]
    async fn test_exclusive_ancestor_blocks_descendant_lock() {
        let (_tree, manager, _events) = fixture();
        let manager = Arc::new(manager);

        manager.lock(&p("/a"), LockMode::Exclusive).await.unwrap();

        let blocked = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.lock(&p("/a/b"), LockMode::Exclusive).await })
        };
        sleep(Duration::from_millis(30)).await;
        assert!(!blocked.is_finished(), "prefix shared lock on /a must wait");

        manager.unlock(&p("/a"), LockMode::Exclusive).unwrap();
        blocked.await.unwrap().unwrap();
        manager.unlock(&p("/a/b"), LockMode::Exclusive).unwrap();
    }

    #[tokio::test]
    async fn test_descendant_exclusive_blocks_ancestor_exclusive() {
        let (_tree, manager, _events) = fixture();
        let manager = Arc::new(manager);

        // Holding /a/b exclusively keeps a Shared prefix on /a, so an
        // Exclusive lock of /a must wait; a plain Shared of /a may not.
        manager.lock(&p("/a/b"), LockMode::Exclusive).await.unwrap();

        let blocked = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.lock(&p("/a"), LockMode::Exclusive).await })
        };
        sleep(Duration::from_millis(30)).await;
        assert!(!blocked.is_finished());

        manager.unlock(&p("/a/b"), LockMode::Exclusive).unwrap();
        blocked.await.unwrap().unwrap();
        manager.unlock(&p("/a"), LockMode::Exclusive).unwrap();
    }

    #[tokio::test]
    async fn test_delete_wakes_queued_lock_with_not_found() {
        let (tree, manager, _events) = fixture();
        let manager = Arc::new(manager);

        manager.lock(&p("/a/b/f"), LockMode::Exclusive).await.unwrap();

        let queued = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.lock(&p("/a/b/f"), LockMode::Shared).await })
        };
        sleep(Duration::from_millis(30)).await;
        assert!(!queued.is_finished());

        tree.delete(&p("/a/b/f")).unwrap();
        assert!(matches!(
            queued.await.unwrap(),
            Err(LockPathError::Node(LockError::NodeRemoved))
        ));
    }

    #[tokio::test]
    async fn test_file_unlock_publishes_access_event() {
        let (_tree, manager, mut events) = fixture();

        manager.lock(&p("/a/b/f"), LockMode::Shared).await.unwrap();
        manager.unlock(&p("/a/b/f"), LockMode::Shared).unwrap();
        assert_eq!(
            events.recv().await,
            Some(AccessEvent { path: p("/a/b/f"), mode: LockMode::Shared })
        );

        manager.lock(&p("/a/b/f"), LockMode::Exclusive).await.unwrap();
        manager.unlock(&p("/a/b/f"), LockMode::Exclusive).unwrap();
        assert_eq!(
            events.recv().await,
            Some(AccessEvent { path: p("/a/b/f"), mode: LockMode::Exclusive })
        );

        // Directory unlocks are not access events.
        manager.lock(&p("/a"), LockMode::Shared).await.unwrap();
        manager.unlock(&p("/a"), LockMode::Shared).unwrap();
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unbalanced_unlock_is_an_error() {
        let (_tree, manager, _events) = fixture();
        assert!(matches!(
            manager.unlock(&p("/a/b/f"), LockMode::Shared),
            Err(LockPathError::Node(LockError::NotHeld(LockMode::Shared)))
        ));
    }
}
