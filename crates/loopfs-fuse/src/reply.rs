//! Delivery of core replies through fuser reply objects.
//!
//! Every fuser reply type is consumed by its terminal method, so a
//! [`ReplySink`] that takes `self` can answer a request at most once, and
//! the executor guarantees it is called. A [`Reply`] variant the request
//! cannot carry is a programming error: it is logged and answered with
//! `EIO` rather than leaving the kernel waiting.

use fuser::{
    FileAttr, FileType, ReplyAttr, ReplyData, ReplyDirectory, ReplyEmpty, ReplyEntry, ReplyOpen,
};
use loopfs_core::{FileAttributes, FileKind, Reply};
use tracing::{error, trace};

/// Block size reported when the backing value does not fit.
const FALLBACK_BLKSIZE: u32 = 4096;

/// A consumable reply channel for one request.
pub trait ReplySink: Send + 'static {
    /// Sends the terminal reply.
    fn send(self, reply: Reply);
}

fn mismatch(expected: &'static str, reply: &Reply) -> libc::c_int {
    error!(expected, got = reply.kind(), "reply variant does not match request");
    libc::EIO
}

impl ReplySink for ReplyEntry {
    fn send(self, reply: Reply) {
        match reply {
            Reply::Entry(out) => self.entry(&out.ttl, &to_file_attr(&out.attr), out.generation),
            Reply::Error(errno) => self.error(errno),
            other => self.error(mismatch("entry", &other)),
        }
    }
}

impl ReplySink for ReplyAttr {
    fn send(self, reply: Reply) {
        match reply {
            Reply::Attr(out) => self.attr(&out.ttl, &to_file_attr(&out.attr)),
            Reply::Error(errno) => self.error(errno),
            other => self.error(mismatch("attr", &other)),
        }
    }
}

impl ReplySink for ReplyOpen {
    fn send(self, reply: Reply) {
        match reply {
            Reply::Opened { fh, flags } => self.opened(fh, flags),
            Reply::Error(errno) => self.error(errno),
            other => self.error(mismatch("opened", &other)),
        }
    }
}

impl ReplySink for ReplyData {
    fn send(self, reply: Reply) {
        match reply {
            Reply::Data(data) => self.data(&data),
            Reply::Error(errno) => self.error(errno),
            other => self.error(mismatch("data", &other)),
        }
    }
}

impl ReplySink for ReplyEmpty {
    fn send(self, reply: Reply) {
        match reply {
            Reply::Empty => self.ok(),
            Reply::Error(errno) => self.error(errno),
            other => self.error(mismatch("empty", &other)),
        }
    }
}

impl ReplySink for ReplyDirectory {
    fn send(mut self, reply: Reply) {
        match reply {
            Reply::Directory(listing) => {
                let total = listing.entries.len();
                let mut added = 0;
                for entry in &listing.entries {
                    // Buffer full: the kernel asks again from the last accepted cookie
                    if self.add(entry.attr.ino, entry.offset, file_type(entry.attr.kind), &entry.name) {
                        break;
                    }
                    added += 1;
                }
                trace!(added, total, "readdir reply");
                self.ok();
            }
            Reply::Error(errno) => self.error(errno),
            other => self.error(mismatch("directory", &other)),
        }
    }
}

/// Maps a core file kind onto the fuser file type.
pub fn file_type(kind: FileKind) -> FileType {
    match kind {
        FileKind::Directory => FileType::Directory,
        FileKind::RegularFile => FileType::RegularFile,
        FileKind::Symlink => FileType::Symlink,
        FileKind::NamedPipe => FileType::NamedPipe,
        FileKind::CharDevice => FileType::CharDevice,
        FileKind::BlockDevice => FileType::BlockDevice,
        FileKind::Socket => FileType::Socket,
    }
}

/// Converts core attributes into a fuser `FileAttr`.
///
/// Fields wider than the wire format saturate instead of wrapping.
pub fn to_file_attr(attr: &FileAttributes) -> FileAttr {
    FileAttr {
        ino: attr.ino,
        size: attr.size,
        blocks: attr.blocks,
        atime: attr.atime,
        mtime: attr.mtime,
        ctime: attr.ctime,
        crtime: attr.crtime,
        kind: file_type(attr.kind),
        perm: attr.perm,
        nlink: u32::try_from(attr.nlink).unwrap_or(u32::MAX),
        uid: attr.uid,
        gid: attr.gid,
        rdev: u32::try_from(attr.rdev).unwrap_or(u32::MAX),
        blksize: u32::try_from(attr.blksize).unwrap_or(FALLBACK_BLKSIZE),
        flags: 0,
    }
}
