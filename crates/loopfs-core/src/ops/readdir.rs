//! Directory enumeration.
//!
//! `readdir` is stateless: every call lists the backing directory afresh and
//! skips the first `offset` children. Each entry carries `index + 1` as its
//! offset cookie, so the kernel's next request resumes right after it. A
//! request past the last child yields an empty listing, which ends the stream.
//!
//! A child whose target cannot be followed (a dangling or looping symlink)
//! is still listed, with the attributes of the link itself.

use super::LoopbackCore;
use crate::attr::{self, FileAttributes};
use crate::attr::BackingStat;
use crate::error::{FsError, FsResult};
use crate::path::InodePath;
use crate::store::BackingStore;
use std::ffi::OsString;
use std::io;
use tracing::{debug, trace};

/// Bytes budgeted per directory entry when sizing a reply.
pub const DIRENT_SIZE_ESTIMATE: usize = 256;

/// One child of a directory, as emitted by `readdir`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Name within the parent directory.
    pub name: OsString,
    /// Attributes with the child's virtual inode.
    pub attr: FileAttributes,
    /// Cookie to resume enumeration after this entry.
    pub offset: i64,
}

/// The result of a single `readdir` request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirListing {
    /// Entries in backing enumeration order.
    pub entries: Vec<DirEntry>,
    /// Reply buffer budget: `max(requested_size, children * DIRENT_SIZE_ESTIMATE)`.
    ///
    /// Only a hint; it never limits how many entries are produced.
    pub buffer_size: usize,
}

impl DirListing {
    /// Returns true if this listing terminates the stream.
    pub fn is_end(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: BackingStore> LoopbackCore<S> {
    /// Confirms that `ino` can be enumerated.
    ///
    /// Directory handles carry no state, so the reply handle is always 0.
    pub fn opendir(&self, ino: u64) -> FsResult<u64> {
        self.resolve(ino)?;
        Ok(0)
    }

    /// Lists the children of `ino` starting after `offset`.
    ///
    /// Every child is registered in the inode table so a later `lookup` or
    /// `getattr` on it resolves. `.` and `..` are not synthesized.
    ///
    /// # Errors
    /// - `InodeNotFound` if `ino` was never registered
    /// - `InvalidOffset` for a negative offset
    /// - `Backing` if the directory cannot be listed, or a child can be
    ///   stat'ed neither through nor without following symlinks
    pub fn readdir(&self, ino: u64, offset: i64, requested_size: u32) -> FsResult<DirListing> {
        let skip = usize::try_from(offset).map_err(|_| FsError::InvalidOffset(offset))?;
        let path = self.resolve(ino)?;
        let names = self.store.list_dir(&path)?;

        let buffer_size = (requested_size as usize)
            .max(names.len().saturating_mul(DIRENT_SIZE_ESTIMATE));

        let mut entries = Vec::with_capacity(names.len().saturating_sub(skip));
        for (index, name) in names.into_iter().enumerate().skip(skip) {
            let child_path = path.child(&name)?;

            let stat = match self.child_stat(&child_path) {
                Ok(stat) => stat,
                Err(e) if e.raw_os_error() == Some(libc::ENOENT) => {
                    debug!(inode = ino, name = ?name, "readdir: child vanished, skipping");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let child_ino = self.inodes.register(&child_path);
            entries.push(DirEntry {
                name,
                attr: attr::translate(&stat, child_ino),
                offset: i64::try_from(index + 1).unwrap_or(i64::MAX),
            });
        }

        trace!(inode = ino, offset, count = entries.len(), buffer_size, "readdir listed");

        Ok(DirListing {
            entries,
            buffer_size,
        })
    }

    /// Stats a listed child, falling back to the link itself when the
    /// followed stat fails.
    fn child_stat(&self, path: &InodePath) -> io::Result<BackingStat> {
        self.store.stat(path).or_else(|e| {
            trace!(path = %path, error = %e, "readdir: stat failed, using lstat");
            self.store.lstat(path)
        })
    }

    /// Closes a directory stream. Always succeeds.
    pub fn releasedir(&self, ino: u64, fh: u64) {
        trace!(inode = ino, fh, "releasedir");
    }
}
