//! Name resolution and attribute retrieval.

use super::{EntryOut, LoopbackCore};
use crate::attr::{self, AttrOut};
use crate::error::FsResult;
use crate::store::BackingStore;
use std::ffi::OsStr;
use tracing::trace;

impl<S: BackingStore> LoopbackCore<S> {
    /// Looks up a directory entry by name.
    ///
    /// # FUSE Spec
    /// A successful reply increments the kernel's lookup count for the inode.
    /// Since the table never evicts, that count is not tracked here.
    ///
    /// # Errors
    /// - `InodeNotFound` if `parent` was never registered
    /// - `InvalidName` if `name` is not a single segment
    /// - `Backing` with the stat error if the child does not exist or is unreadable
    pub fn lookup(&self, parent: u64, name: &OsStr) -> FsResult<EntryOut> {
        let parent_path = self.resolve(parent)?;
        let child_path = parent_path.child(name)?;

        // I/O before touching the table: a failed stat registers nothing
        let stat = self.store.stat(&child_path)?;
        let ino = self.inodes.register(&child_path);

        trace!(parent, ino, path = %child_path, "lookup resolved");

        Ok(EntryOut {
            attr: attr::translate(&stat, ino),
            ttl: self.config.entry_ttl,
            generation: self.config.generation,
        })
    }

    /// Returns the current attributes of an inode.
    ///
    /// Attributes are always re-read from the backing store.
    pub fn getattr(&self, ino: u64) -> FsResult<AttrOut> {
        let path = self.resolve(ino)?;
        let stat = self.store.stat(&path)?;
        Ok(AttrOut {
            attr: attr::translate(&stat, ino),
            ttl: self.config.attr_ttl,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::attr::FileKind;
    use crate::error::FsError;
    use crate::inode::ROOT_INODE;
    use crate::{FsConfig, LocalStore, LoopbackCore};
    use std::ffi::OsStr;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn setup() -> (TempDir, LoopbackCore<LocalStore>) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("hello.txt"), b"hello world").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("inner"), b"x").unwrap();
        let store = LocalStore::new(dir.path()).unwrap();
        (dir, LoopbackCore::new(store, FsConfig::default()))
    }

    #[test]
    fn test_lookup_registers_child() {
        let (_dir, core) = setup();

        let entry = core.lookup(ROOT_INODE, OsStr::new("hello.txt")).unwrap();
        assert_eq!(entry.attr.ino, 2);
        assert_eq!(entry.attr.kind, FileKind::RegularFile);
        assert_eq!(entry.attr.size, 11);
        assert_eq!(entry.generation, 1);
        assert_eq!(entry.ttl, Duration::from_secs(5));

        let path = core.inodes().resolve(entry.attr.ino).unwrap();
        assert_eq!(path.file_name(), Some(OsStr::new("hello.txt")));
    }

    #[test]
    fn test_lookup_twice_returns_same_inode() {
        let (_dir, core) = setup();
        let a = core.lookup(ROOT_INODE, OsStr::new("sub")).unwrap();
        let b = core.lookup(ROOT_INODE, OsStr::new("sub")).unwrap();
        assert_eq!(a.attr.ino, b.attr.ino);
        assert_eq!(core.inodes().len(), 2);
    }

    #[test]
    fn test_lookup_nested() {
        let (_dir, core) = setup();
        let sub = core.lookup(ROOT_INODE, OsStr::new("sub")).unwrap();
        assert_eq!(sub.attr.kind, FileKind::Directory);

        let inner = core.lookup(sub.attr.ino, OsStr::new("inner")).unwrap();
        assert_eq!(inner.attr.size, 1);
        assert_ne!(inner.attr.ino, sub.attr.ino);
    }

    #[test]
    fn test_lookup_unknown_parent() {
        let (_dir, core) = setup();
        let err = core.lookup(999, OsStr::new("hello.txt")).unwrap_err();
        assert!(matches!(err, FsError::InodeNotFound(999)));
        assert_eq!(err.to_errno(), libc::ENOENT);
    }

    #[test]
    fn test_lookup_missing_child_registers_nothing() {
        let (_dir, core) = setup();
        let err = core.lookup(ROOT_INODE, OsStr::new("missing")).unwrap_err();
        assert_eq!(err.to_errno(), libc::ENOENT);
        assert_eq!(core.inodes().len(), 1);
    }

    #[test]
    fn test_lookup_through_file_is_enotdir() {
        let (_dir, core) = setup();
        let file = core.lookup(ROOT_INODE, OsStr::new("hello.txt")).unwrap();
        let err = core.lookup(file.attr.ino, OsStr::new("child")).unwrap_err();
        assert_eq!(err.to_errno(), libc::ENOTDIR);
    }

    #[test]
    fn test_lookup_dot_entries() {
        let (_dir, core) = setup();
        let sub = core.lookup(ROOT_INODE, OsStr::new("sub")).unwrap();

        let dot = core.lookup(sub.attr.ino, OsStr::new(".")).unwrap();
        assert_eq!(dot.attr.ino, sub.attr.ino);

        let dotdot = core.lookup(sub.attr.ino, OsStr::new("..")).unwrap();
        assert_eq!(dotdot.attr.ino, ROOT_INODE);
    }

    #[test]
    fn test_lookup_rejects_multi_segment_name() {
        let (_dir, core) = setup();
        let err = core.lookup(ROOT_INODE, OsStr::new("sub/inner")).unwrap_err();
        assert!(matches!(err, FsError::InvalidName(_)));
        assert_eq!(err.to_errno(), libc::EINVAL);
    }

    #[test]
    fn test_getattr_root() {
        let (_dir, core) = setup();
        let out = core.getattr(ROOT_INODE).unwrap();
        assert_eq!(out.attr.ino, ROOT_INODE);
        assert_eq!(out.attr.kind, FileKind::Directory);
        assert_eq!(out.ttl, Duration::from_secs(5));
    }

    #[test]
    fn test_getattr_unknown_inode() {
        let (_dir, core) = setup();
        assert!(matches!(core.getattr(42), Err(FsError::InodeNotFound(42))));
    }

    #[test]
    fn test_getattr_sees_backing_changes() {
        let (dir, core) = setup();
        let entry = core.lookup(ROOT_INODE, OsStr::new("hello.txt")).unwrap();

        fs::write(dir.path().join("hello.txt"), b"hi").unwrap();
        let out = core.getattr(entry.attr.ino).unwrap();
        assert_eq!(out.attr.size, 2);
    }

    #[test]
    fn test_getattr_after_backing_delete() {
        let (dir, core) = setup();
        let entry = core.lookup(ROOT_INODE, OsStr::new("hello.txt")).unwrap();

        fs::remove_file(dir.path().join("hello.txt")).unwrap();
        let err = core.getattr(entry.attr.ino).unwrap_err();
        assert_eq!(err.to_errno(), libc::ENOENT);

        // The mapping itself survives
        assert!(core.inodes().contains(entry.attr.ino));
    }

    #[test]
    fn test_configured_ttls() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("f"), b"").unwrap();
        let store = LocalStore::new(dir.path()).unwrap();
        let config = FsConfig::default()
            .attr_ttl(Duration::from_secs(1))
            .entry_ttl(Duration::ZERO);
        let core = LoopbackCore::new(store, config);

        assert_eq!(core.lookup(ROOT_INODE, OsStr::new("f")).unwrap().ttl, Duration::ZERO);
        assert_eq!(core.getattr(ROOT_INODE).unwrap().ttl, Duration::from_secs(1));
    }
}
