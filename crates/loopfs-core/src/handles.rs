//! Open file handle tracking.
//!
//! Each successful `open` stores one [`OpenFile`] under a fresh numeric id;
//! the matching `release` removes it, which drops the backing file and
//! closes its descriptor. Handles are never pooled or shared between open
//! requests.
//!
//! Entries are stored behind `Arc` so a read can clone the handle out of the
//! table and perform I/O without holding a shard lock. A release racing an
//! in-flight read only closes the descriptor once that read finishes.

use crate::store::AccessMode;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// A backing file opened for a specific inode.
#[derive(Debug)]
pub struct OpenFile<F> {
    inode: u64,
    mode: AccessMode,
    file: F,
}

impl<F> OpenFile<F> {
    /// Wraps a freshly opened backing file.
    pub fn new(inode: u64, mode: AccessMode, file: F) -> Self {
        Self { inode, mode, file }
    }

    /// The inode this handle was opened for.
    pub fn inode(&self) -> u64 {
        self.inode
    }

    /// The access mode this handle was opened with.
    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    /// The underlying backing file.
    pub fn file(&self) -> &F {
        &self.file
    }
}

/// Thread-safe table of open files with auto-incrementing ids.
///
/// Ids start at 1; 0 is never handed out because it is the conventional
/// "no handle" value (e.g. `opendir` replies).
#[derive(Debug)]
pub struct HandleTable<F> {
    handles: DashMap<u64, Arc<OpenFile<F>>>,
    next_id: AtomicU64,
}

impl<F> HandleTable<F> {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self {
            handles: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Stores an open file and returns its new handle id.
    pub fn insert(&self, open_file: OpenFile<F>) -> u64 {
        let mut value = Some(Arc::new(open_file));
        loop {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            if id == 0 {
                continue;
            }
            if let Entry::Vacant(entry) = self.handles.entry(id)
                && let Some(value) = value.take()
            {
                entry.insert(value);
                return id;
            }
        }
    }

    /// Returns a shared reference to the handle, if open.
    pub fn get(&self, id: u64) -> Option<Arc<OpenFile<F>>> {
        self.handles.get(&id).map(|r| Arc::clone(&r))
    }

    /// Removes a handle and returns it.
    pub fn remove(&self, id: u64) -> Option<Arc<OpenFile<F>>> {
        self.handles.remove(&id).map(|(_, v)| v)
    }

    /// Returns true if the handle is open.
    pub fn contains(&self, id: u64) -> bool {
        self.handles.contains_key(&id)
    }

    /// Number of open handles.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Returns true if no handles are open.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Drops every open handle.
    pub fn clear(&self) {
        self.handles.clear();
    }
}

impl<F> Default for HandleTable<F> {
    fn default() -> Self {
        Self::new()
    }
}
