//! Backing store abstraction.
//!
//! The core never touches the filesystem directly. It talks to a
//! [`BackingStore`], which answers `stat`, directory listing and `open`
//! for paths relative to its root, and to the [`BackingFile`]s it hands
//! out. Every call may block; callers never hold a table lock across one.
//!
//! [`LocalStore`] is the production implementation over a real directory.

use crate::attr::BackingStat;
use crate::error::{FsError, FsResult};
use crate::path::InodePath;
use std::ffi::OsString;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Access mode derived from a request's open flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessMode {
    Read,
    Write,
    ReadWrite,
}

impl AccessMode {
    /// Derives the access mode from `open(2)` flags.
    ///
    /// Only the `O_ACCMODE` bits are considered. Anything other than
    /// `O_RDONLY`, `O_WRONLY` or `O_RDWR` is rejected rather than defaulted.
    pub fn from_flags(flags: i32) -> FsResult<Self> {
        match flags & libc::O_ACCMODE {
            libc::O_RDONLY => Ok(AccessMode::Read),
            libc::O_WRONLY => Ok(AccessMode::Write),
            libc::O_RDWR => Ok(AccessMode::ReadWrite),
            _ => Err(FsError::InvalidAccessIntent(flags)),
        }
    }

    /// Returns true if the mode permits reading.
    pub fn is_readable(self) -> bool {
        matches!(self, AccessMode::Read | AccessMode::ReadWrite)
    }

    /// Returns true if the mode permits writing.
    pub fn is_writable(self) -> bool {
        matches!(self, AccessMode::Write | AccessMode::ReadWrite)
    }

    /// Builds `OpenOptions` for this mode. Never creates or truncates.
    pub fn open_options(self) -> OpenOptions {
        let mut options = OpenOptions::new();
        options.read(self.is_readable()).write(self.is_writable());
        options
    }
}

/// An open backing file.
pub trait BackingFile: Send + Sync + 'static {
    /// Reads up to `buf.len()` bytes at `offset` without moving a shared cursor.
    ///
    /// Returns `Ok(0)` at end of content.
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize>;
}

impl BackingFile for File {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        FileExt::read_at(self, buf, offset)
    }
}

/// The storage the filesystem re-exposes.
///
/// Errors are plain `io::Error`s; their raw OS code is passed to the kernel
/// unchanged.
pub trait BackingStore: Send + Sync + 'static {
    /// The handle type returned by [`open`](Self::open).
    type File: BackingFile;

    /// Returns the status of `path`, following symlinks.
    fn stat(&self, path: &InodePath) -> io::Result<BackingStat>;

    /// Returns the status of `path` itself, without following a final symlink.
    fn lstat(&self, path: &InodePath) -> io::Result<BackingStat>;

    /// Lists the names of the immediate children of `path`.
    ///
    /// Names are returned in the store's enumeration order and never
    /// include `.` or `..`.
    fn list_dir(&self, path: &InodePath) -> io::Result<Vec<OsString>>;

    /// Opens `path` in the given mode.
    fn open(&self, path: &InodePath, mode: AccessMode) -> io::Result<Self::File>;
}

impl<T: BackingStore + ?Sized> BackingStore for Arc<T> {
    type File = T::File;

    fn stat(&self, path: &InodePath) -> io::Result<BackingStat> {
        (**self).stat(path)
    }

    fn lstat(&self, path: &InodePath) -> io::Result<BackingStat> {
        (**self).lstat(path)
    }

    fn list_dir(&self, path: &InodePath) -> io::Result<Vec<OsString>> {
        (**self).list_dir(path)
    }

    fn open(&self, path: &InodePath, mode: AccessMode) -> io::Result<Self::File> {
        (**self).open(path, mode)
    }
}

/// A backing store over a local directory.
#[derive(Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Creates a store rooted at `root`.
    ///
    /// The root is canonicalized once here and is immutable afterwards.
    /// Fails if it does not exist or is not a directory.
    pub fn new(root: impl AsRef<Path>) -> io::Result<Self> {
        let root = fs::canonicalize(root.as_ref())?;
        if !fs::metadata(&root)?.is_dir() {
            return Err(io::Error::from_raw_os_error(libc::ENOTDIR));
        }
        Ok(Self { root })
    }

    /// Returns the canonical backing root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a relative path onto the backing tree.
    pub fn backing_path(&self, path: &InodePath) -> PathBuf {
        path.to_backing(&self.root)
    }
}

impl fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalStore")
            .field("root", &self.root.display())
            .finish()
    }
}

impl BackingStore for LocalStore {
    type File = File;

    fn stat(&self, path: &InodePath) -> io::Result<BackingStat> {
        let meta = fs::metadata(self.backing_path(path))?;
        Ok(BackingStat::from(&meta))
    }

    fn lstat(&self, path: &InodePath) -> io::Result<BackingStat> {
        let meta = fs::symlink_metadata(self.backing_path(path))?;
        Ok(BackingStat::from(&meta))
    }

    fn list_dir(&self, path: &InodePath) -> io::Result<Vec<OsString>> {
        fs::read_dir(self.backing_path(path))?
            .map(|entry| entry.map(|e| e.file_name()))
            .collect()
    }

    fn open(&self, path: &InodePath, mode: AccessMode) -> io::Result<File> {
        mode.open_options().open(self.backing_path(path))
    }
}
