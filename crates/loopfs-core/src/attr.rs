//! Attribute translation.
//!
//! Backing `stat` results carry the backing filesystem's own inode number,
//! which lives in a numbering space unrelated to ours. [`translate`] copies
//! every other field and substitutes the virtual inode. All timestamps are
//! carried as [`SystemTime`] so callers never mix units.
//!
//! Attributes are recomputed from the backing store on every request; the
//! only caching is the TTL handed back to the kernel.

use std::fs::{self, Metadata};
use std::os::unix::fs::{FileTypeExt, MetadataExt};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Default attribute validity hint (5 seconds).
pub const DEFAULT_ATTR_TTL: Duration = Duration::from_secs(5);

/// Generation number reported with every entry.
///
/// Inodes are never reused within a run, so it never needs to change.
pub const GENERATION: u64 = 1;

/// Kind of filesystem object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    Directory,
    RegularFile,
    Symlink,
    NamedPipe,
    CharDevice,
    BlockDevice,
    Socket,
}

impl FileKind {
    /// Classifies a `std::fs::FileType`.
    pub fn from_file_type(file_type: fs::FileType) -> Self {
        if file_type.is_dir() {
            FileKind::Directory
        } else if file_type.is_symlink() {
            FileKind::Symlink
        } else if file_type.is_fifo() {
            FileKind::NamedPipe
        } else if file_type.is_char_device() {
            FileKind::CharDevice
        } else if file_type.is_block_device() {
            FileKind::BlockDevice
        } else if file_type.is_socket() {
            FileKind::Socket
        } else {
            FileKind::RegularFile
        }
    }
}

/// Raw status of a backing object, as reported by the backing store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackingStat {
    /// The backing filesystem's own inode number. Never exposed.
    pub native_ino: u64,
    pub size: u64,
    pub blocks: u64,
    pub atime: SystemTime,
    pub mtime: SystemTime,
    pub ctime: SystemTime,
    /// Creation time; `UNIX_EPOCH` when the backing filesystem has none.
    pub crtime: SystemTime,
    pub kind: FileKind,
    /// Permission bits (`mode & 0o7777`).
    pub perm: u16,
    pub nlink: u64,
    pub uid: u32,
    pub gid: u32,
    pub rdev: u64,
    pub blksize: u64,
}

impl From<&Metadata> for BackingStat {
    fn from(meta: &Metadata) -> Self {
        Self {
            native_ino: meta.ino(),
            size: meta.size(),
            blocks: meta.blocks(),
            atime: system_time(meta.atime(), meta.atime_nsec()),
            mtime: system_time(meta.mtime(), meta.mtime_nsec()),
            ctime: system_time(meta.ctime(), meta.ctime_nsec()),
            crtime: meta.created().unwrap_or(UNIX_EPOCH),
            kind: FileKind::from_file_type(meta.file_type()),
            // Masked to 12 bits, always fits
            #[allow(clippy::cast_possible_truncation)]
            perm: (meta.mode() & 0o7777) as u16,
            nlink: meta.nlink(),
            uid: meta.uid(),
            gid: meta.gid(),
            rdev: meta.rdev(),
            blksize: meta.blksize(),
        }
    }
}

/// Converts a `stat` (seconds, nanoseconds) pair into a `SystemTime`.
///
/// Handles timestamps before the epoch, which `stat` reports as negative seconds.
pub fn system_time(secs: i64, nsecs: i64) -> SystemTime {
    let nanos = u32::try_from(nsecs.clamp(0, 999_999_999)).unwrap_or(0);
    if secs >= 0 {
        UNIX_EPOCH + Duration::new(secs.unsigned_abs(), nanos)
    } else {
        UNIX_EPOCH - Duration::from_secs(secs.unsigned_abs()) + Duration::from_nanos(u64::from(nanos))
    }
}

/// Attributes of a virtual filesystem object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileAttributes {
    /// Virtual inode number.
    pub ino: u64,
    pub size: u64,
    pub blocks: u64,
    pub atime: SystemTime,
    pub mtime: SystemTime,
    pub ctime: SystemTime,
    pub crtime: SystemTime,
    pub kind: FileKind,
    pub perm: u16,
    pub nlink: u64,
    pub uid: u32,
    pub gid: u32,
    pub rdev: u64,
    pub blksize: u64,
}

/// Attributes plus the validity hint for a `getattr` reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttrOut {
    pub attr: FileAttributes,
    pub ttl: Duration,
}

/// Translates a backing stat into virtual attributes for `ino`.
pub fn translate(stat: &BackingStat, ino: u64) -> FileAttributes {
    FileAttributes {
        ino,
        size: stat.size,
        blocks: stat.blocks,
        atime: stat.atime,
        mtime: stat.mtime,
        ctime: stat.ctime,
        crtime: stat.crtime,
        kind: stat.kind,
        perm: stat.perm,
        nlink: stat.nlink,
        uid: stat.uid,
        gid: stat.gid,
        rdev: stat.rdev,
        blksize: stat.blksize,
    }
}
