//! Mount configuration.
//!
//! Reply tunables (TTLs, generation) live in [`loopfs_core::FsConfig`];
//! this struct covers how the filesystem is attached to the kernel and how
//! many threads serve it.

use fuser::MountOption;
use std::time::Duration;

/// Default time to wait for the mount to become visible.
pub const DEFAULT_MOUNT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default interval between mount readiness probes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Options controlling how the filesystem is mounted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountConfig {
    /// Filesystem name shown in the mount table.
    ///
    /// Default: `loopfs`.
    pub fsname: String,

    /// Mount read-only.
    ///
    /// No write operation is implemented either way; a read-write mount only
    /// lets files be opened for writing. Default: false.
    pub read_only: bool,

    /// Allow users other than the mounting user to access the filesystem.
    ///
    /// Requires `user_allow_other` in `/etc/fuse.conf`. Default: false.
    pub allow_other: bool,

    /// Ask the kernel to unmount automatically when the process exits.
    ///
    /// Some `fusermount` versions refuse this without `allow_other`.
    /// Default: false.
    pub auto_unmount: bool,

    /// How long to wait for the mount to become visible. Default: 10 seconds.
    pub mount_timeout: Duration,

    /// Polling interval while waiting for the mount. Default: 50ms.
    pub poll_interval: Duration,

    /// Maximum number of threads executing requests concurrently.
    ///
    /// Default: twice the number of CPUs, at least 4.
    pub worker_threads: usize,
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            fsname: "loopfs".to_string(),
            read_only: false,
            allow_other: false,
            auto_unmount: false,
            mount_timeout: DEFAULT_MOUNT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            worker_threads: default_worker_threads(),
        }
    }
}

/// Twice the CPU count: most request time is spent blocked on backing I/O.
pub fn default_worker_threads() -> usize {
    (num_cpus::get() * 2).max(4)
}

impl MountConfig {
    /// Sets the filesystem name.
    #[must_use]
    pub fn fsname(mut self, name: impl Into<String>) -> Self {
        self.fsname = name.into();
        self
    }

    /// Sets read-only mode.
    #[must_use]
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Sets whether other users may access the mount.
    #[must_use]
    pub fn allow_other(mut self, allow: bool) -> Self {
        self.allow_other = allow;
        self
    }

    /// Sets automatic unmount on process exit.
    #[must_use]
    pub fn auto_unmount(mut self, auto: bool) -> Self {
        self.auto_unmount = auto;
        self
    }

    /// Sets the mount readiness timeout.
    #[must_use]
    pub fn mount_timeout(mut self, timeout: Duration) -> Self {
        self.mount_timeout = timeout;
        self
    }

    /// Sets the worker thread count (minimum 1).
    #[must_use]
    pub fn worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads.max(1);
        self
    }

    /// Builds the fuser mount options.
    pub fn to_mount_options(&self) -> Vec<MountOption> {
        let mut options = vec![
            MountOption::FSName(self.fsname.clone()),
            MountOption::Subtype("loopfs".to_string()),
        ];

        options.push(if self.read_only {
            MountOption::RO
        } else {
            MountOption::RW
        });

        if self.allow_other {
            options.push(MountOption::AllowOther);
        }
        if self.auto_unmount {
            options.push(MountOption::AutoUnmount);
        }

        options
    }
}
