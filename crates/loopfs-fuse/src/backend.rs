//! Mount lifecycle.
//!
//! [`mount`] attaches a [`LoopbackFS`] at a mountpoint and waits until the
//! kernel actually serves it. The returned [`MountHandle`] unmounts on drop,
//! falling back to a lazy unmount through the system tools if the session
//! does not wind down in time.

use crate::{LoopbackFS, MountConfig};
use fuser::{BackgroundSession, MountOption};
use loopfs_core::BackingStore;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Timeout for graceful `session.join()` before forcing unmount.
const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors from mounting or unmounting.
#[derive(Debug, Error)]
pub enum MountError {
    /// FUSE is not usable on this system.
    #[error("Backend not available: {0}")]
    BackendUnavailable(String),

    /// The mountpoint does not exist or is not a directory.
    #[error("Mount point does not exist: {0}")]
    MountPointNotFound(PathBuf),

    /// The OS-level mount failed.
    #[error("Failed to mount: {0}")]
    Mount(#[from] std::io::Error),

    /// The mount call or readiness wait exceeded the timeout.
    #[error("Mount did not become ready within {0:?}")]
    Timeout(Duration),
}

/// Returns true if FUSE appears usable on this system.
pub fn is_available() -> bool {
    #[cfg(target_os = "macos")]
    {
        Path::new("/Library/Filesystems/macfuse.fs").exists()
    }
    #[cfg(target_os = "linux")]
    {
        Path::new("/dev/fuse").exists()
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        false
    }
}

fn unavailable_reason() -> String {
    if cfg!(target_os = "macos") {
        "macFUSE is not installed. Download it from https://osxfuse.github.io/".to_string()
    } else if cfg!(target_os = "linux") {
        "FUSE is not available. Ensure the fuse kernel module is loaded.".to_string()
    } else {
        "FUSE is not supported on this platform.".to_string()
    }
}

/// Handle to a mounted filesystem. Dropping it unmounts.
pub struct MountHandle {
    session: Option<BackgroundSession>,
    mountpoint: PathBuf,
}

impl MountHandle {
    /// The directory the filesystem is mounted on.
    pub fn mountpoint(&self) -> &Path {
        &self.mountpoint
    }

    /// Unmounts and waits for the session to finish.
    ///
    /// May block while files on the mount are still in use.
    pub fn unmount(mut self) {
        info!(mountpoint = %self.mountpoint.display(), "Unmounting FUSE filesystem");
        if let Some(session) = self.session.take() {
            session.join();
        }
        info!(mountpoint = %self.mountpoint.display(), "FUSE unmount successful");
    }

    /// Detaches the mount with the system tools, then joins the session.
    pub fn force_unmount(mut self) {
        info!(mountpoint = %self.mountpoint.display(), "Force unmounting FUSE filesystem");
        if let Some(session) = self.session.take() {
            force_unmount_path(&self.mountpoint);
            std::thread::sleep(Duration::from_millis(100));
            session.join();
        }
    }
}

impl Drop for MountHandle {
    fn drop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        debug!(mountpoint = %self.mountpoint.display(), "Unmounting FUSE filesystem");

        // join() can block on busy handles, so run it where we can time out
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            session.join();
            let _ = tx.send(());
        });

        match rx.recv_timeout(JOIN_TIMEOUT) {
            Ok(()) => debug!(mountpoint = %self.mountpoint.display(), "Graceful unmount completed"),
            Err(_) => {
                warn!(
                    mountpoint = %self.mountpoint.display(),
                    timeout = ?JOIN_TIMEOUT,
                    "session.join() timed out, forcing unmount"
                );
                force_unmount_path(&self.mountpoint);
            }
        }
    }
}

/// Lazily detaches a mount using the platform's unmount tool.
fn force_unmount_path(mountpoint: &Path) {
    #[cfg(target_os = "macos")]
    {
        let result = std::process::Command::new("diskutil")
            .args(["unmount", "force"])
            .arg(mountpoint)
            .output();
        if matches!(result, Ok(ref output) if output.status.success()) {
            debug!("Force unmount via diskutil succeeded");
            return;
        }
        let _ = std::process::Command::new("umount")
            .arg("-f")
            .arg(mountpoint)
            .output();
    }

    #[cfg(target_os = "linux")]
    {
        let _ = std::process::Command::new("fusermount")
            .arg("-uz")
            .arg(mountpoint)
            .output();
    }
}

/// Mounts `fs` at `mountpoint` and waits until it is live.
pub fn mount<S: BackingStore>(
    fs: LoopbackFS<S>,
    mountpoint: impl AsRef<Path>,
    config: &MountConfig,
) -> Result<MountHandle, MountError> {
    let mountpoint = mountpoint.as_ref();
    info!(mountpoint = %mountpoint.display(), fsname = %config.fsname, "Starting FUSE mount");

    if !is_available() {
        return Err(MountError::BackendUnavailable(unavailable_reason()));
    }
    if !mountpoint.is_dir() {
        return Err(MountError::MountPointNotFound(mountpoint.to_path_buf()));
    }

    let options = config.to_mount_options();
    let session = spawn_mount_with_timeout(fs, mountpoint, options, config.mount_timeout)?;

    // From here on the handle owns the session and unmounts on any error
    let handle = MountHandle {
        session: Some(session),
        mountpoint: mountpoint.to_path_buf(),
    };
    wait_for_mount(mountpoint, config.mount_timeout, config.poll_interval)?;

    info!(mountpoint = %mountpoint.display(), "FUSE mount successful");
    Ok(handle)
}

/// Runs `spawn_mount2` on a helper thread so a mount syscall stuck on a
/// stale mountpoint cannot hang the caller.
fn spawn_mount_with_timeout<S: BackingStore>(
    fs: LoopbackFS<S>,
    mountpoint: &Path,
    options: Vec<MountOption>,
    timeout: Duration,
) -> Result<BackgroundSession, MountError> {
    let mountpoint = mountpoint.to_path_buf();
    let (tx, rx) = mpsc::channel();

    std::thread::spawn(move || {
        let result = fuser::spawn_mount2(fs, &mountpoint, &options);
        let _ = tx.send(result);
    });

    match rx.recv_timeout(timeout) {
        Ok(Ok(session)) => Ok(session),
        Ok(Err(e)) => Err(MountError::Mount(e)),
        Err(mpsc::RecvTimeoutError::Timeout) => Err(MountError::Timeout(timeout)),
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(MountError::Mount(
            std::io::Error::other("Mount thread terminated unexpectedly"),
        )),
    }
}

/// Polls until the mountpoint's device differs from its parent's.
///
/// Compares device ids instead of parsing the mount table, which can block
/// on ghost mounts.
fn wait_for_mount(
    mountpoint: &Path,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<(), MountError> {
    let deadline = Instant::now() + timeout;
    let parent = mountpoint.parent().unwrap_or(Path::new("/"));

    while Instant::now() < deadline {
        if is_mount_point(mountpoint, parent) {
            debug!(mountpoint = %mountpoint.display(), "FUSE mount confirmed active");
            return Ok(());
        }
        std::thread::sleep(poll_interval);
    }

    Err(MountError::Timeout(timeout))
}

fn is_mount_point(path: &Path, parent: &Path) -> bool {
    match (std::fs::metadata(path), std::fs::metadata(parent)) {
        (Ok(path_meta), Ok(parent_meta)) => path_meta.dev() != parent_meta.dev(),
        _ => false,
    }
}
