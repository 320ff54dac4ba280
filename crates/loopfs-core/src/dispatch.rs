//! Operation dispatch.
//!
//! A transport turns each kernel request into an [`Operation`], calls
//! [`LoopbackCore::dispatch`], and delivers the returned [`Reply`]. Every
//! operation yields exactly one reply value: a success payload, an error
//! code, or [`Reply::None`] for operations the kernel expects no answer to.

use crate::attr::AttrOut;
use crate::error::FsError;
use crate::ops::readdir::DirListing;
use crate::ops::{EntryOut, LoopbackCore};
use crate::store::BackingStore;
use std::ffi::OsString;
use tracing::{debug, trace, warn};

/// A filesystem request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Lookup { parent: u64, name: OsString },
    GetAttr { ino: u64 },
    OpenDir { ino: u64, flags: i32 },
    ReadDir { ino: u64, fh: u64, offset: i64, size: u32 },
    ReleaseDir { ino: u64, fh: u64 },
    Open { ino: u64, flags: i32 },
    Read { ino: u64, fh: u64, offset: i64, size: u32 },
    Release { ino: u64, fh: u64 },
    Forget { ino: u64, nlookup: u64 },
}

impl Operation {
    /// Short operation name for logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Lookup { .. } => "lookup",
            Operation::GetAttr { .. } => "getattr",
            Operation::OpenDir { .. } => "opendir",
            Operation::ReadDir { .. } => "readdir",
            Operation::ReleaseDir { .. } => "releasedir",
            Operation::Open { .. } => "open",
            Operation::Read { .. } => "read",
            Operation::Release { .. } => "release",
            Operation::Forget { .. } => "forget",
        }
    }

    /// The inode the request targets (the parent, for lookups).
    pub fn inode(&self) -> u64 {
        match self {
            Operation::Lookup { parent, .. } => *parent,
            Operation::GetAttr { ino }
            | Operation::OpenDir { ino, .. }
            | Operation::ReadDir { ino, .. }
            | Operation::ReleaseDir { ino, .. }
            | Operation::Open { ino, .. }
            | Operation::Read { ino, .. }
            | Operation::Release { ino, .. }
            | Operation::Forget { ino, .. } => *ino,
        }
    }
}

/// The single terminal answer to an [`Operation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Entry(EntryOut),
    Attr(AttrOut),
    Directory(DirListing),
    Data(Vec<u8>),
    Opened { fh: u64, flags: u32 },
    Empty,
    /// No reply is sent to the kernel (`forget`).
    None,
    /// A POSIX error code.
    Error(i32),
}

impl Reply {
    /// Returns the error code if this is an error reply.
    pub fn errno(&self) -> Option<i32> {
        match self {
            Reply::Error(code) => Some(*code),
            _ => None,
        }
    }

    /// Short variant name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Reply::Entry(_) => "entry",
            Reply::Attr(_) => "attr",
            Reply::Directory(_) => "directory",
            Reply::Data(_) => "data",
            Reply::Opened { .. } => "opened",
            Reply::Empty => "empty",
            Reply::None => "none",
            Reply::Error(_) => "error",
        }
    }
}

impl<S: BackingStore> LoopbackCore<S> {
    /// Routes an operation to its handler and converts the outcome to a reply.
    pub fn dispatch(&self, op: Operation) -> Reply {
        let op_name = op.name();
        let ino = op.inode();
        trace!(op = op_name, inode = ino, "dispatch");

        let result = match op {
            Operation::Lookup { parent, name } => self.lookup(parent, &name).map(Reply::Entry),
            Operation::GetAttr { ino } => self.getattr(ino).map(Reply::Attr),
            Operation::OpenDir { ino, .. } => {
                self.opendir(ino).map(|fh| Reply::Opened { fh, flags: 0 })
            }
            Operation::ReadDir {
                ino, offset, size, ..
            } => self.readdir(ino, offset, size).map(Reply::Directory),
            Operation::ReleaseDir { ino, fh } => {
                self.releasedir(ino, fh);
                Ok(Reply::Empty)
            }
            Operation::Open { ino, flags } => {
                self.open(ino, flags).map(|fh| Reply::Opened { fh, flags: 0 })
            }
            Operation::Read {
                ino,
                fh,
                offset,
                size,
            } => self.read(ino, fh, offset, size).map(Reply::Data),
            Operation::Release { ino, fh } => {
                self.release(ino, fh);
                Ok(Reply::Empty)
            }
            Operation::Forget { ino, nlookup } => {
                // Inodes are never evicted
                trace!(inode = ino, nlookup, "forget ignored");
                Ok(Reply::None)
            }
        };

        result.unwrap_or_else(|e| error_reply(op_name, ino, &e))
    }
}

fn error_reply(op: &'static str, ino: u64, e: &FsError) -> Reply {
    let errno = e.to_errno();
    if e.is_not_found() {
        // Routine for negative lookups
        debug!(op, inode = ino, errno, error = %e, "request failed");
    } else {
        warn!(op, inode = ino, errno, error = %e, "request failed");
    }
    Reply::Error(errno)
}
