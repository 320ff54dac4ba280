//! Core of a loopback filesystem driver.
//!
//! This crate re-exposes an existing directory tree (the *backing tree*)
//! through a virtual inode namespace. It owns the inode/path mapping and the
//! request handlers a FUSE transport needs, without depending on any
//! particular transport.
//!
//! # Components
//!
//! - [`InodeTable`] - Bijection between virtual inodes and backing paths
//! - [`attr`] - Translation of backing `stat` results into virtual attributes
//! - [`LoopbackCore`] - Request handlers (lookup, getattr, readdir, open, read, ...)
//! - [`Operation`] / [`Reply`] - Tagged request and reply types used by the dispatcher
//! - [`BackingStore`] - The storage seam, with [`LocalStore`] for a real directory
//!
//! # Usage
//!
//! ```no_run
//! use loopfs_core::{FsConfig, LocalStore, LoopbackCore, Operation, Reply, ROOT_INODE};
//!
//! let store = LocalStore::new("/srv/data")?;
//! let core = LoopbackCore::new(store, FsConfig::default());
//!
//! match core.dispatch(Operation::GetAttr { ino: ROOT_INODE }) {
//!     Reply::Attr(out) => println!("root has {} links", out.attr.nlink),
//!     other => println!("unexpected reply: {other:?}"),
//! }
//! # Ok::<(), std::io::Error>(())
//! ```

pub mod attr;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod handles;
pub mod inode;
pub mod ops;
pub mod path;
pub mod store;

pub use attr::{AttrOut, BackingStat, FileAttributes, FileKind};
pub use config::FsConfig;
pub use dispatch::{Operation, Reply};
pub use error::{FsError, FsResult, ToErrno};
pub use handles::{HandleTable, OpenFile};
pub use inode::{InodeTable, ROOT_INODE};
pub use ops::readdir::{DirEntry, DirListing, DIRENT_SIZE_ESTIMATE};
pub use ops::{EntryOut, LoopbackCore};
pub use path::InodePath;
pub use store::{AccessMode, BackingFile, BackingStore, LocalStore};
