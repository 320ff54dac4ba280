//! Error handling and errno mapping.
//!
//! Every request either produces its payload or exactly one [`FsError`],
//! which the dispatcher turns into a POSIX error code. Backing-store
//! failures share the kernel's errno space and pass through unchanged.

use std::ffi::OsString;
use std::io;
use thiserror::Error;

/// Errors that can terminate a filesystem request.
#[derive(Debug, Error)]
pub enum FsError {
    /// The inode was never registered in this driver run.
    #[error("Inode not found: {0}")]
    InodeNotFound(u64),

    /// The file handle is unknown or belongs to a different inode.
    #[error("File handle not found: {0}")]
    HandleNotFound(u64),

    /// The backing store's `stat`/`open`/`read`/listing call failed.
    #[error("Backing store error: {0}")]
    Backing(#[from] io::Error),

    /// Open flags carried no read-only, write-only or read-write access mode.
    #[error("Invalid access intent in open flags: {0:#o}")]
    InvalidAccessIntent(i32),

    /// Entry name is empty or spans more than one path segment.
    #[error("Invalid entry name: {0:?}")]
    InvalidName(OsString),

    /// Negative stream or byte offset.
    #[error("Invalid offset: {0}")]
    InvalidOffset(i64),
}

impl FsError {
    /// Converts this error to a libc error code for the kernel.
    pub fn to_errno(&self) -> i32 {
        match self {
            FsError::InodeNotFound(_) | FsError::HandleNotFound(_) => libc::ENOENT,
            FsError::Backing(e) => io_error_to_errno(e),
            FsError::InvalidAccessIntent(_)
            | FsError::InvalidName(_)
            | FsError::InvalidOffset(_) => libc::EINVAL,
        }
    }

    /// Returns true for "no such entry" failures, which are routine for lookups.
    pub fn is_not_found(&self) -> bool {
        self.to_errno() == libc::ENOENT
    }
}

/// Extracts the raw OS error code, falling back to `EIO`.
pub fn io_error_to_errno(e: &io::Error) -> i32 {
    e.raw_os_error().unwrap_or(libc::EIO)
}

/// Result type for filesystem operations.
pub type FsResult<T> = Result<T, FsError>;

/// Extension trait to convert errors to errno.
pub trait ToErrno {
    /// Converts this error to a libc error code.
    fn to_errno(&self) -> i32;
}

impl ToErrno for FsError {
    fn to_errno(&self) -> i32 {
        FsError::to_errno(self)
    }
}

impl ToErrno for io::Error {
    fn to_errno(&self) -> i32 {
        io_error_to_errno(self)
    }
}
