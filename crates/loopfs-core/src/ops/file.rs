//! File open, read and release.

use super::LoopbackCore;
use crate::error::{FsError, FsResult};
use crate::handles::OpenFile;
use crate::store::{AccessMode, BackingFile, BackingStore};
use std::io;
use tracing::{debug, trace};

impl<S: BackingStore> LoopbackCore<S> {
    /// Opens a file and returns a new handle id.
    ///
    /// The access mode comes from `flags & O_ACCMODE`; the remaining flags
    /// are ignored. The backing file is never created or truncated.
    ///
    /// # Errors
    /// - `InodeNotFound` if `ino` was never registered
    /// - `InvalidAccessIntent` if the access bits name no defined mode
    /// - `Backing` if the backing open fails
    pub fn open(&self, ino: u64, flags: i32) -> FsResult<u64> {
        let path = self.resolve(ino)?;
        let mode = AccessMode::from_flags(flags)?;

        let file = self.store.open(&path, mode)?;
        let fh = self.handles.insert(OpenFile::new(ino, mode, file));

        debug!(inode = ino, fh, ?mode, "opened");
        Ok(fh)
    }

    /// Reads up to `size` bytes at `offset` from an open handle.
    ///
    /// Returns fewer bytes only at end of content; an offset at or past the
    /// end yields an empty buffer.
    ///
    /// # Errors
    /// - `InvalidOffset` for a negative offset
    /// - `HandleNotFound` if `fh` is not open or was opened for another inode
    /// - `Backing` if the backing read fails
    pub fn read(&self, ino: u64, fh: u64, offset: i64, size: u32) -> FsResult<Vec<u8>> {
        let offset = u64::try_from(offset).map_err(|_| FsError::InvalidOffset(offset))?;

        // Clone the handle out so no shard lock is held during I/O
        let handle = self
            .handles
            .get(fh)
            .filter(|h| h.inode() == ino)
            .ok_or(FsError::HandleNotFound(fh))?;

        let data = read_fully(handle.file(), offset, size as usize)?;
        trace!(inode = ino, fh, offset, requested = size, returned = data.len(), "read");
        Ok(data)
    }

    /// Releases a handle, closing its backing file. Always succeeds.
    ///
    /// A read still in flight on the handle keeps the file open until it
    /// completes.
    pub fn release(&self, ino: u64, fh: u64) {
        if self.handles.remove(fh).is_some() {
            debug!(inode = ino, fh, "released");
        } else {
            trace!(inode = ino, fh, "release of unknown handle");
        }
    }
}

/// Reads until `len` bytes are collected or the backing file reports end of content.
///
/// Interrupted reads are retried.
pub fn read_fully<F: BackingFile>(file: &F, offset: u64, len: usize) -> io::Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    let mut filled = 0;
    while filled < len {
        match file.read_at(&mut buf[filled..], offset + filled as u64) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    buf.truncate(filled);
    Ok(buf)
}
