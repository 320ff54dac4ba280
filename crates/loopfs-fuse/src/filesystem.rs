//! FUSE filesystem implementation.
//!
//! [`LoopbackFS`] implements the fuser `Filesystem` trait on top of
//! [`LoopbackCore`]. Each callback translates its arguments into an
//! [`Operation`], hands it to the [`RequestExecutor`] together with the
//! fuser reply object, and returns without waiting.
//!
//! | Operation | Status | Notes |
//! |-----------|--------|-------|
//! | init/destroy | OK | |
//! | lookup | OK | `.`/`..` resolved lexically |
//! | forget/batch_forget | OK | Acknowledged; inodes are never evicted |
//! | getattr | OK | Always re-stats the backing object |
//! | open/release | OK | One backing descriptor per open, closed on release |
//! | read | OK | Positional reads, no content cache |
//! | opendir/readdir/releasedir | OK | Stateless, offset cookie = index + 1 |
//!
//! Every other operation falls through to fuser's default (`ENOSYS`).

use crate::executor::RequestExecutor;
use crate::reply::ReplySink;
use fuser::{
    Filesystem, KernelConfig, ReplyAttr, ReplyData, ReplyDirectory, ReplyEmpty, ReplyEntry,
    ReplyOpen, Request,
};
use libc::c_int;
use loopfs_core::{BackingStore, FsConfig, LoopbackCore, Operation};
use std::ffi::OsStr;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tracing::{debug, info, trace, warn};

/// Loopback filesystem served through FUSE.
pub struct LoopbackFS<S: BackingStore> {
    core: Arc<LoopbackCore<S>>,
    executor: RequestExecutor,
}

impl<S: BackingStore> LoopbackFS<S> {
    /// Creates a filesystem over `store` with a pool of `worker_threads`.
    pub fn new(store: S, config: FsConfig, worker_threads: usize) -> std::io::Result<Self> {
        Self::with_core(Arc::new(LoopbackCore::new(store, config)), worker_threads)
    }

    /// Creates a filesystem around an existing core.
    pub fn with_core(core: Arc<LoopbackCore<S>>, worker_threads: usize) -> std::io::Result<Self> {
        let executor = RequestExecutor::new(worker_threads).map_err(std::io::Error::other)?;
        Ok(Self { core, executor })
    }

    /// Returns the shared core.
    pub fn core(&self) -> &Arc<LoopbackCore<S>> {
        &self.core
    }

    /// Returns the request executor.
    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    /// Runs `op` on the executor and answers through `reply`.
    fn submit<R: ReplySink>(&self, op: Operation, reply: R) {
        let core = Arc::clone(&self.core);
        let op_name = op.name();
        if let Err(e) = self
            .executor
            .submit(move || core.dispatch(op), move |r| reply.send(r))
        {
            warn!(op = op_name, error = %e, "request rejected");
        }
    }
}

impl<S: BackingStore> Filesystem for LoopbackFS<S> {
    fn init(&mut self, _req: &Request<'_>, _config: &mut KernelConfig) -> Result<(), c_int> {
        info!(
            inodes = self.core.inodes().len(),
            "FUSE filesystem initialized"
        );
        Ok(())
    }

    /// Clean up the filesystem on unmount.
    ///
    /// # FUSE Spec
    /// Called once all requests are done. Open handles left behind by a
    /// kernel that never sent `release` are dropped here.
    fn destroy(&mut self) {
        let stats = self.executor.stats();
        let leftover = self.core.handles().len();
        if leftover > 0 {
            debug!(handles = leftover, "dropping handles never released");
            self.core.handles().clear();
        }
        self.executor.shutdown();
        info!(
            submitted = stats.requests_submitted.load(Ordering::Relaxed),
            completed = stats.requests_completed.load(Ordering::Relaxed),
            failed = stats.requests_failed.load(Ordering::Relaxed),
            panicked = stats.requests_panicked.load(Ordering::Relaxed),
            inodes = self.core.inodes().len(),
            "FUSE filesystem destroyed"
        );
    }

    /// Look up a directory entry by name and get its attributes.
    ///
    /// # FUSE Spec
    /// Valid replies: `entry` or `error`. A successful reply increments the
    /// kernel's lookup count, which is released later through `forget`.
    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        trace!(parent, name = ?name, "lookup");
        self.submit(
            Operation::Lookup {
                parent,
                name: name.to_os_string(),
            },
            reply,
        );
    }

    /// Forget about an inode.
    ///
    /// # FUSE Spec
    /// No reply. The mapping is kept so the inode stays valid for the run.
    fn forget(&mut self, _req: &Request<'_>, ino: u64, nlookup: u64) {
        self.core.dispatch(Operation::Forget { ino, nlookup });
    }

    fn batch_forget(&mut self, _req: &Request<'_>, nodes: &[fuser::fuse_forget_one]) {
        trace!(count = nodes.len(), "batch_forget");
        for node in nodes {
            self.core.dispatch(Operation::Forget {
                ino: node.nodeid,
                nlookup: node.nlookup,
            });
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        trace!(inode = ino, "getattr");
        self.submit(Operation::GetAttr { ino }, reply);
    }

    /// Open a file.
    ///
    /// # FUSE Spec
    /// The returned `fh` is passed back on every `read` and the final
    /// `release` for this open.
    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        trace!(inode = ino, flags, "open");
        self.submit(Operation::Open { ino, flags }, reply);
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        trace!(inode = ino, fh, offset, size, "read");
        self.submit(
            Operation::Read {
                ino,
                fh,
                offset,
                size,
            },
            reply,
        );
    }

    /// Release an open file.
    ///
    /// # FUSE Spec
    /// Called exactly once per successful `open`. Errors are ignored by the
    /// kernel, and this never fails.
    fn release(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        trace!(inode = ino, fh, "release");
        self.submit(Operation::Release { ino, fh }, reply);
    }

    fn opendir(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        trace!(inode = ino, "opendir");
        self.submit(Operation::OpenDir { ino, flags }, reply);
    }

    /// Read directory entries.
    ///
    /// # FUSE Spec
    /// Entries are added until the reply buffer is full; the kernel calls
    /// again with the offset of the last entry it received. An empty reply
    /// ends the stream.
    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        reply: ReplyDirectory,
    ) {
        trace!(inode = ino, offset, "readdir");
        self.submit(
            Operation::ReadDir {
                ino,
                fh,
                offset,
                size: 0,
            },
            reply,
        );
    }

    fn releasedir(&mut self, _req: &Request<'_>, ino: u64, fh: u64, _flags: i32, reply: ReplyEmpty) {
        self.submit(Operation::ReleaseDir { ino, fh }, reply);
    }
}
