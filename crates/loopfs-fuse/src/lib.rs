//! FUSE loopback filesystem.
//!
//! This crate mounts a local directory at a second location through FUSE,
//! using [`loopfs_core`] for the inode mapping and request handling. It
//! contributes the parts that depend on the kernel transport: the fuser
//! `Filesystem` adapter, the worker pool requests run on, reply delivery
//! and mount lifecycle management.
//!
//! # Usage
//!
//! ```no_run
//! use loopfs_core::{FsConfig, LocalStore};
//! use loopfs_fuse::{LoopbackFS, MountConfig, mount};
//!
//! let store = LocalStore::new("/srv/data")?;
//! let config = MountConfig::default();
//! let fs = LoopbackFS::new(store, FsConfig::default(), config.worker_threads)?;
//! let handle = mount(fs, "/mnt/data", &config)?;
//! // Unmounts when dropped
//! drop(handle);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod backend;
pub mod config;
pub mod executor;
pub mod filesystem;
pub mod reply;

pub use backend::{MountError, MountHandle, is_available, mount};
pub use config::MountConfig;
pub use executor::{ExecutorError, ExecutorResult, ExecutorStats, RequestExecutor};
pub use filesystem::LoopbackFS;
pub use reply::ReplySink;
