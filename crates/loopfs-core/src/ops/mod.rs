//! Request handlers.
//!
//! [`LoopbackCore`] owns everything a request handler needs: the shared
//! inode table, the backing store, the open-file table and the reply
//! tunables. Handlers take `&self` and are safe to call from any number of
//! threads at once.
//!
//! Every handler follows the same shape: resolve the inode to a path,
//! perform the backing call without holding any table lock, then register
//! or translate the result. Failures surface as [`FsError`] and never leave
//! partial state behind.
//!
//! | Operation | Module |
//! |-----------|--------|
//! | lookup/getattr | [`lookup`] |
//! | opendir/readdir/releasedir | [`readdir`] |
//! | open/read/release | [`file`] |

pub mod file;
pub mod lookup;
pub mod readdir;

use crate::attr::FileAttributes;
use crate::config::FsConfig;
use crate::error::{FsError, FsResult};
use crate::handles::HandleTable;
use crate::inode::InodeTable;
use crate::path::InodePath;
use crate::store::BackingStore;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Reply payload for a successful `lookup`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryOut {
    /// Attributes carrying the virtual inode.
    pub attr: FileAttributes,
    /// Validity hint for both the name and the attributes.
    pub ttl: Duration,
    /// Generation number paired with the inode.
    pub generation: u64,
}

/// Transport-independent loopback filesystem.
pub struct LoopbackCore<S: BackingStore> {
    inodes: Arc<InodeTable>,
    store: S,
    handles: HandleTable<S::File>,
    config: FsConfig,
}

impl<S: BackingStore> LoopbackCore<S> {
    /// Creates a core over `store` with a fresh inode table.
    pub fn new(store: S, config: FsConfig) -> Self {
        Self::with_table(store, Arc::new(InodeTable::new()), config)
    }

    /// Creates a core that shares an existing inode table.
    pub fn with_table(store: S, inodes: Arc<InodeTable>, config: FsConfig) -> Self {
        Self {
            inodes,
            store,
            handles: HandleTable::new(),
            config,
        }
    }

    /// Returns the inode table.
    pub fn inodes(&self) -> &Arc<InodeTable> {
        &self.inodes
    }

    /// Returns the backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the open-file table.
    pub fn handles(&self) -> &HandleTable<S::File> {
        &self.handles
    }

    /// Returns the configuration.
    pub fn config(&self) -> &FsConfig {
        &self.config
    }

    /// Resolves an inode to its path, or fails with `InodeNotFound`.
    pub fn resolve(&self, ino: u64) -> FsResult<InodePath> {
        self.inodes.resolve(ino).ok_or(FsError::InodeNotFound(ino))
    }
}

impl<S: BackingStore + fmt::Debug> fmt::Debug for LoopbackCore<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopbackCore")
            .field("store", &self.store)
            .field("inodes", &self.inodes.len())
            .field("open_handles", &self.handles.len())
            .field("config", &self.config)
            .finish()
    }
}
