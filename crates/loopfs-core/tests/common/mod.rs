//! Shared test fixtures.
//!
//! [`MemoryStore`] is an in-memory [`BackingStore`] with per-path fault
//! injection, an open-descriptor counter and an optional stat delay for
//! widening race windows.

#![allow(dead_code)]

use dashmap::DashMap;
use loopfs_core::{
    AccessMode, BackingFile, BackingStat, BackingStore, FileKind, FsConfig, InodePath,
    LoopbackCore,
};
use std::ffi::{OsStr, OsString};
use std::io;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Which backing call a fault applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Call {
    Stat,
    Lstat,
    List,
    Open,
    Read,
}

#[derive(Debug, Clone)]
enum Node {
    Dir { native_ino: u64, children: Vec<OsString> },
    File { native_ino: u64, data: Arc<Vec<u8>> },
}

/// In-memory backing tree.
pub struct MemoryStore {
    nodes: DashMap<InodePath, Node>,
    faults: DashMap<(InodePath, Call), i32>,
    open_files: Arc<AtomicUsize>,
    stat_calls: AtomicUsize,
    stat_delay: Option<Duration>,
    next_native: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        let store = Self {
            nodes: DashMap::new(),
            faults: DashMap::new(),
            open_files: Arc::new(AtomicUsize::new(0)),
            stat_calls: AtomicUsize::new(0),
            stat_delay: None,
            // Far away from the virtual numbering on purpose
            next_native: AtomicU64::new(10_000),
        };
        store.nodes.insert(
            InodePath::root(),
            Node::Dir {
                native_ino: 9_999,
                children: Vec::new(),
            },
        );
        store
    }

    /// Sleeps this long inside every `stat`.
    pub fn with_stat_delay(mut self, delay: Duration) -> Self {
        self.stat_delay = Some(delay);
        self
    }

    pub fn add_dir(&self, path: &str) -> InodePath {
        let native_ino = self.next_native.fetch_add(1, Ordering::Relaxed);
        self.insert(
            path,
            Node::Dir {
                native_ino,
                children: Vec::new(),
            },
        )
    }

    pub fn add_file(&self, path: &str, data: &[u8]) -> InodePath {
        let native_ino = self.next_native.fetch_add(1, Ordering::Relaxed);
        self.insert(
            path,
            Node::File {
                native_ino,
                data: Arc::new(data.to_vec()),
            },
        )
    }

    /// Removes a node and its name from the parent listing.
    pub fn remove(&self, path: &str) {
        let path = parse(path);
        self.nodes.remove(&path);
        if let (Some(parent), Some(name)) = (path.parent(), path.file_name())
            && let Some(mut node) = self.nodes.get_mut(&parent)
            && let Node::Dir { children, .. } = &mut *node
        {
            children.retain(|c| c != name);
        }
    }

    /// Removes a node but leaves its name in the parent listing, as if it
    /// vanished between `readdir` and `stat`.
    pub fn remove_node_only(&self, path: &str) {
        self.nodes.remove(&parse(path));
    }

    /// Makes `call` on `path` fail with `errno`.
    pub fn inject(&self, path: &str, call: Call, errno: i32) {
        self.faults.insert((parse(path), call), errno);
    }

    pub fn clear_faults(&self) {
        self.faults.clear();
    }

    /// Number of backing files currently open.
    pub fn open_files(&self) -> usize {
        self.open_files.load(Ordering::SeqCst)
    }

    pub fn stat_calls(&self) -> usize {
        self.stat_calls.load(Ordering::SeqCst)
    }

    fn insert(&self, path: &str, node: Node) -> InodePath {
        let path = parse(path);
        let parent = path.parent().expect("cannot insert root");
        let name = path.file_name().expect("named path").to_os_string();

        self.nodes.insert(path.clone(), node);
        let mut parent_node = self.nodes.get_mut(&parent).expect("parent must exist");
        match &mut *parent_node {
            Node::Dir { children, .. } => children.push(name),
            Node::File { .. } => panic!("parent {parent} is a file"),
        }
        path
    }

    fn fault(&self, path: &InodePath, call: Call) -> io::Result<()> {
        match self.faults.get(&(path.clone(), call)) {
            Some(errno) => Err(io::Error::from_raw_os_error(*errno)),
            None => Ok(()),
        }
    }

    fn node_stat(&self, path: &InodePath) -> io::Result<BackingStat> {
        let (native_ino, kind, size, nlink) = match self.node(path)? {
            Node::Dir {
                native_ino,
                children,
            } => (native_ino, FileKind::Directory, 4096, 2 + children.len() as u64),
            Node::File { native_ino, data } => {
                (native_ino, FileKind::RegularFile, data.len() as u64, 1)
            }
        };
        let mtime = UNIX_EPOCH + Duration::from_secs(1_700_000_000);

        Ok(BackingStat {
            native_ino,
            size,
            blocks: size.div_ceil(512),
            atime: mtime,
            mtime,
            ctime: mtime,
            crtime: SystemTime::UNIX_EPOCH,
            kind,
            perm: if kind == FileKind::Directory { 0o755 } else { 0o644 },
            nlink,
            uid: 1000,
            gid: 1000,
            rdev: 0,
            blksize: 4096,
        })
    }

    fn node(&self, path: &InodePath) -> io::Result<Node> {
        self.nodes
            .get(path)
            .map(|n| n.clone())
            .ok_or_else(|| io::Error::from_raw_os_error(libc::ENOENT))
    }
}

impl BackingStore for MemoryStore {
    type File = MemoryFile;

    fn stat(&self, path: &InodePath) -> io::Result<BackingStat> {
        self.stat_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.stat_delay {
            std::thread::sleep(delay);
        }
        self.fault(path, Call::Stat)?;
        self.node_stat(path)
    }

    fn lstat(&self, path: &InodePath) -> io::Result<BackingStat> {
        self.fault(path, Call::Lstat)?;
        self.node_stat(path)
    }

    fn list_dir(&self, path: &InodePath) -> io::Result<Vec<OsString>> {
        self.fault(path, Call::List)?;
        match self.node(path)? {
            Node::Dir { children, .. } => Ok(children),
            Node::File { .. } => Err(io::Error::from_raw_os_error(libc::ENOTDIR)),
        }
    }

    fn open(&self, path: &InodePath, _mode: AccessMode) -> io::Result<MemoryFile> {
        self.fault(path, Call::Open)?;
        match self.node(path)? {
            Node::File { data, .. } => {
                self.open_files.fetch_add(1, Ordering::SeqCst);
                Ok(MemoryFile {
                    data,
                    read_fault: self.faults.get(&(path.clone(), Call::Read)).map(|e| *e),
                    open_files: Arc::clone(&self.open_files),
                })
            }
            Node::Dir { .. } => Err(io::Error::from_raw_os_error(libc::EISDIR)),
        }
    }
}

/// An open in-memory file. Dropping it counts as closing the descriptor.
pub struct MemoryFile {
    data: Arc<Vec<u8>>,
    read_fault: Option<i32>,
    open_files: Arc<AtomicUsize>,
}

impl BackingFile for MemoryFile {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        if let Some(errno) = self.read_fault {
            return Err(io::Error::from_raw_os_error(errno));
        }
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(self.data.len());
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        Ok(n)
    }
}

impl Drop for MemoryFile {
    fn drop(&mut self) {
        self.open_files.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Builds an `InodePath` from a slash-separated string.
pub fn parse(path: &str) -> InodePath {
    path.split('/')
        .filter(|s| !s.is_empty())
        .fold(InodePath::root(), |acc, seg| {
            acc.child(OsStr::new(seg)).expect("valid segment")
        })
}

/// A core over a fresh memory store, shared so tests can poke the store.
pub fn memory_core() -> (Arc<MemoryStore>, LoopbackCore<Arc<MemoryStore>>) {
    memory_core_with(MemoryStore::new())
}

pub fn memory_core_with(
    store: MemoryStore,
) -> (Arc<MemoryStore>, LoopbackCore<Arc<MemoryStore>>) {
    let store = Arc::new(store);
    let core = LoopbackCore::new(Arc::clone(&store), FsConfig::default());
    (store, core)
}
