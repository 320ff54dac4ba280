//! Inode management for the loopback filesystem.
//!
//! This module provides the mapping between virtual inodes and paths
//! relative to the backing root. The kernel addresses objects by inode;
//! every handler re-resolves the inode to a path through this table on
//! each request instead of caching paths.
//!
//! Inodes are allocated monotonically from 2 and are never reused or
//! reassigned during a driver run. Entries are never evicted, so the
//! generation number reported to the kernel can stay fixed.

use crate::path::InodePath;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// The root inode number (FUSE convention).
pub const ROOT_INODE: u64 = 1;

/// First inode handed out to a non-root path.
const FIRST_INODE: u64 = 2;

/// Thread-safe bijection between inodes and backing paths.
///
/// The table maintains two `DashMap`s, one per direction. Registration goes
/// through the path map's entry API, so the check-then-insert for a given
/// path happens under that path's shard lock and racing registrations of the
/// same new path agree on one inode.
///
/// No method performs I/O; callers stat the backing store first and register
/// the path once the result is known.
#[derive(Debug)]
pub struct InodeTable {
    /// Maps backing paths to inodes.
    path_to_inode: DashMap<InodePath, u64>,
    /// Maps inodes to backing paths.
    inode_to_path: DashMap<u64, InodePath>,
    /// Next inode to allocate.
    next_inode: AtomicU64,
}

impl InodeTable {
    /// Creates a new inode table with the root directory pre-allocated.
    pub fn new() -> Self {
        let table = Self {
            path_to_inode: DashMap::new(),
            inode_to_path: DashMap::new(),
            next_inode: AtomicU64::new(FIRST_INODE),
        };
        table.path_to_inode.insert(InodePath::root(), ROOT_INODE);
        table.inode_to_path.insert(ROOT_INODE, InodePath::root());
        table
    }

    /// Allocates a new inode.
    ///
    /// Uses `Ordering::Relaxed` since we only need uniqueness, not synchronization.
    #[inline]
    fn allocate(&self) -> u64 {
        self.next_inode.fetch_add(1, Ordering::Relaxed)
    }

    /// Resolves an inode to its path.
    ///
    /// Returns a clone so no shard lock outlives the call.
    pub fn resolve(&self, inode: u64) -> Option<InodePath> {
        self.inode_to_path.get(&inode).map(|r| r.clone())
    }

    /// Returns the inode for `path`, allocating one if the path is new.
    ///
    /// Registration is idempotent and cannot fail.
    pub fn register(&self, path: &InodePath) -> u64 {
        // Fast path: already registered
        if let Some(inode) = self.path_to_inode.get(path).map(|r| *r) {
            return inode;
        }

        // Slow path: the entry API keeps check-then-insert atomic per path
        let inode = self
            .path_to_inode
            .entry(path.clone())
            .or_insert_with(|| {
                let inode = self.allocate();
                self.inode_to_path.insert(inode, path.clone());
                inode
            });

        *inode
    }

    /// Looks up the inode of a path without registering it.
    pub fn inode_of(&self, path: &InodePath) -> Option<u64> {
        self.path_to_inode.get(path).map(|r| *r)
    }

    /// Returns true if the inode has been registered.
    pub fn contains(&self, inode: u64) -> bool {
        self.inode_to_path.contains_key(&inode)
    }

    /// Returns the number of inodes currently in the table (root included).
    pub fn len(&self) -> usize {
        self.inode_to_path.len()
    }

    /// Returns true if the table only contains the root inode.
    pub fn is_empty(&self) -> bool {
        self.inode_to_path.len() <= 1
    }
}

impl Default for InodeTable {
    fn default() -> Self {
        Self::new()
    }
}
