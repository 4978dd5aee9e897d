//! The hierarchical namespace tree.
//!
//! A single root directory owns all other nodes top-down; children are keyed
//! by name and a node is either a directory (with children) or a file.
//! Every node carries a `LockNode` for the lifetime of the node. The whole
//! structure sits behind one coarse mutex; every operation is a single
//! root-to-target walk.
//!
//! Replica ownership and access counters are deliberately *not* stored
//! here; the registry keeps them under its own mutex.

use std::collections::HashMap;
use std::sync::Arc;

use canopy_core::DfsPath;
use parking_lot::Mutex;
use thiserror::Error;

use crate::lock::LockNode;

/// Kind of a tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// An inner node with children
    Directory,
    /// A leaf backed by storage replicas
    File,
}

/// Errors from tree operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    /// The path or one of its ancestors does not exist
    #[error("Path not found: {0}")]
    NotFound(DfsPath),

    /// The path exists but is not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(DfsPath),

    /// A node already exists at the path
    #[error("Path already exists: {0}")]
    AlreadyExists(DfsPath),

    /// The parent is missing or is a file
    #[error("Parent directory does not exist: {0}")]
    ParentMissing(DfsPath),

    /// The root directory cannot be deleted or created
    #[error("Operation not permitted on the root directory")]
    IsRoot,
}

#[derive(Debug)]
struct Node {
    kind: NodeKind,
    children: HashMap<String, Node>,
    lock: Arc<LockNode>,
}

impl Node {
    fn directory() -> Self {
        Self {
            kind: NodeKind::Directory,
            children: HashMap::new(),
            lock: LockNode::new(),
        }
    }

    fn file() -> Self {
        Self {
            kind: NodeKind::File,
            children: HashMap::new(),
            lock: LockNode::new(),
        }
    }
}

/// Result of deleting a subtree: every file path that was removed,
/// so the caller can invalidate storage replicas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedSubtree {
    /// Paths of all files that were inside the removed subtree
    pub files: Vec<DfsPath>,
}

/// The lock-node chain for a path: one entry per strict ancestor
/// (root first), plus the target node itself.
#[derive(Debug, Clone)]
pub struct LockChain {
    /// Lock nodes of the strict ancestors, root-to-parent order
    pub ancestors: Vec<Arc<LockNode>>,
    /// Lock node of the target
    pub target: Arc<LockNode>,
    /// Kind of the target node
    pub target_kind: NodeKind,
}

/// The naming tree. The root always exists and is a directory.
#[derive(Debug)]
pub struct Tree {
    root: Mutex<Node>,
}

impl Tree {
    /// Creates a tree containing only the root directory.
    pub fn new() -> Self {
        Self {
            root: Mutex::new(Node::directory()),
        }
    }

    /// Returns the kind of the node at `path`, if it exists.
    pub fn kind(&self, path: &DfsPath) -> Option<NodeKind> {
        let root = self.root.lock();
        node_at(&root, path).map(|n| n.kind)
    }

    /// Returns true if a node exists at `path`.
    pub fn exists(&self, path: &DfsPath) -> bool {
        self.kind(path).is_some()
    }

    /// Returns true if `path` names a directory.
    pub fn is_directory(&self, path: &DfsPath) -> Result<bool, TreeError> {
        self.kind(path)
            .map(|k| k == NodeKind::Directory)
            .ok_or_else(|| TreeError::NotFound(path.clone()))
    }

    /// Returns the child names of the directory at `path`, in
    /// unspecified order.
    pub fn list(&self, path: &DfsPath) -> Result<Vec<String>, TreeError> {
        let root = self.root.lock();
        let node = node_at(&root, path).ok_or_else(|| TreeError::NotFound(path.clone()))?;
        if node.kind != NodeKind::Directory {
            return Err(TreeError::NotADirectory(path.clone()));
        }
        Ok(node.children.keys().cloned().collect())
    }

    /// Creates a directory at `path`. The parent must exist and be a
    /// directory.
    pub fn create_directory(&self, path: &DfsPath) -> Result<(), TreeError> {
        self.create_node(path, NodeKind::Directory)
    }

    /// Creates a file at `path`. The parent must exist and be a directory.
    pub fn create_file(&self, path: &DfsPath) -> Result<(), TreeError> {
        self.create_node(path, NodeKind::File)
    }

    fn create_node(&self, path: &DfsPath, kind: NodeKind) -> Result<(), TreeError> {
        if path.is_root() {
            // The root always exists; creating it is always a collision.
            return Err(TreeError::AlreadyExists(path.clone()));
        }
        let mut root = self.root.lock();
        let parent_path = path.parent().expect("non-root path has a parent");
        let parent = node_at_mut(&mut root, &parent_path)
            .filter(|n| n.kind == NodeKind::Directory)
            .ok_or_else(|| TreeError::ParentMissing(parent_path.clone()))?;

        let name = path.last().expect("non-root path has a final component");
        if parent.children.contains_key(name) {
            return Err(TreeError::AlreadyExists(path.clone()));
        }
        let node = match kind {
            NodeKind::Directory => Node::directory(),
            NodeKind::File => Node::file(),
        };
        parent.children.insert(name.to_string(), node);
        Ok(())
    }

    /// Deletes the node at `path`, recursively for directories.
    ///
    /// Closes the lock nodes of the whole removed subtree, waking queued
    /// acquires with a not-found error, and reports every removed file path.
    pub fn delete(&self, path: &DfsPath) -> Result<RemovedSubtree, TreeError> {
        if path.is_root() {
            return Err(TreeError::IsRoot);
        }
        let removed = {
            let mut root = self.root.lock();
            let parent_path = path.parent().expect("non-root path has a parent");
            let parent = node_at_mut(&mut root, &parent_path)
                .ok_or_else(|| TreeError::NotFound(path.clone()))?;
            let name = path.last().expect("non-root path has a final component");
            parent
                .children
                .remove(name)
                .ok_or_else(|| TreeError::NotFound(path.clone()))?
        };

        let mut files = Vec::new();
        close_subtree(&removed, path, &mut files);
        Ok(RemovedSubtree { files })
    }

    /// Merges a replica's reported file set into the tree.
    ///
    /// Each accepted path materializes its intermediate directories and a
    /// file node. A path is rejected (returned for deletion on the replica)
    /// when a node already exists at the exact path, or when a strict
    /// prefix of it is a file.
    pub fn merge_registration(&self, paths: &[DfsPath]) -> Vec<DfsPath> {
        let mut root = self.root.lock();
        let mut rejected = Vec::new();

        'paths: for path in paths {
            if path.is_root() {
                rejected.push(path.clone());
                continue;
            }

            let mut current = &mut *root;
            let components = path.components();
            for name in &components[..components.len() - 1] {
                let child = current
                    .children
                    .entry(name.clone())
                    .or_insert_with(Node::directory);
                if child.kind == NodeKind::File {
                    rejected.push(path.clone());
                    continue 'paths;
                }
                current = child;
            }

            let name = components.last().expect("non-root path has a final component");
            if current.children.contains_key(name) {
                rejected.push(path.clone());
                continue;
            }
            current.children.insert(name.clone(), Node::file());
        }

        rejected
    }

    /// Resolves the lock-node chain for `path`.
    pub fn lock_chain(&self, path: &DfsPath) -> Result<LockChain, TreeError> {
        let root = self.root.lock();
        let mut ancestors = Vec::with_capacity(path.depth());
        let mut current = &*root;

        for name in path.components() {
            ancestors.push(current.lock.clone());
            current = current
                .children
                .get(name)
                .ok_or_else(|| TreeError::NotFound(path.clone()))?;
        }

        Ok(LockChain {
            ancestors,
            target: current.lock.clone(),
            target_kind: current.kind,
        })
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

fn node_at<'a>(root: &'a Node, path: &DfsPath) -> Option<&'a Node> {
    let mut current = root;
    for name in path.components() {
        current = current.children.get(name)?;
    }
    Some(current)
}

fn node_at_mut<'a>(root: &'a mut Node, path: &DfsPath) -> Option<&'a mut Node> {
    let mut current = root;
    for name in path.components() {
        current = current.children.get_mut(name)?;
    }
    Some(current)
}

fn close_subtree(node: &Node, path: &DfsPath, files: &mut Vec<DfsPath>) {
    node.lock.close();
    match node.kind {
        NodeKind::File => files.push(path.clone()),
        NodeKind::Directory => {
            for (name, child) in &node.children {
                close_subtree(child, &path.child(name), files);
            }
        }
    }
}
