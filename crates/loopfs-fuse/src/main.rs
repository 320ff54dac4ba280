//! loopmount - Mount a directory at a second location through FUSE.
//!
//! Usage: loopmount <backing> <mountpoint>
//!
//! Verbosity follows `-v` (debug) and `-vv` (trace); `RUST_LOG` overrides
//! both with a full filter directive.

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result};
use clap::Parser;
use loopfs_core::{FsConfig, LocalStore};
use loopfs_fuse::{LoopbackFS, MountConfig, config::default_worker_threads};
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "loopmount")]
#[command(about = "Mount a directory at a second location through FUSE")]
#[command(version)]
struct Cli {
    /// Directory to re-expose
    #[arg(env = "LOOPFS_BACKING")]
    backing: PathBuf,

    /// Mountpoint for the filesystem
    #[arg(env = "LOOPFS_MOUNTPOINT")]
    mountpoint: PathBuf,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Mount as read-only
    #[arg(long, env = "LOOPFS_READ_ONLY")]
    read_only: bool,

    /// Allow other users to access the mount
    #[arg(long, env = "LOOPFS_ALLOW_OTHER")]
    allow_other: bool,

    /// Unmount automatically when the process exits
    #[arg(long, env = "LOOPFS_AUTO_UNMOUNT")]
    auto_unmount: bool,

    /// Attribute and entry validity in seconds
    #[arg(long, env = "LOOPFS_ATTR_TTL", default_value_t = 5)]
    attr_ttl: u64,

    /// Filesystem name shown in the mount table
    #[arg(long, env = "LOOPFS_FSNAME", default_value = "loopfs")]
    fsname: String,

    /// Maximum concurrent requests
    #[arg(long, env = "LOOPFS_THREADS", default_value_t = default_worker_threads())]
    threads: usize,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let store = LocalStore::new(&cli.backing)
        .with_context(|| format!("Invalid backing directory: {}", cli.backing.display()))?;
    if !cli.mountpoint.is_dir() {
        anyhow::bail!("Mountpoint does not exist: {}", cli.mountpoint.display());
    }

    let fs_config = FsConfig::with_ttl(Duration::from_secs(cli.attr_ttl));
    let mount_config = MountConfig::default()
        .fsname(cli.fsname)
        .read_only(cli.read_only)
        .allow_other(cli.allow_other)
        .auto_unmount(cli.auto_unmount)
        .worker_threads(cli.threads);

    info!(
        backing = %store.root().display(),
        mountpoint = %cli.mountpoint.display(),
        threads = mount_config.worker_threads,
        "Mounting"
    );

    let fs = LoopbackFS::new(store, fs_config, mount_config.worker_threads)
        .context("Failed to start request executor")?;

    // Set up channel for signal handling
    let (tx, rx) = mpsc::channel::<()>();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .context("Failed to set signal handler")?;

    let handle = loopfs_fuse::mount(fs, &cli.mountpoint, &mount_config)
        .context("Failed to mount filesystem")?;

    info!("Filesystem mounted at {} (press Ctrl+C to unmount)", cli.mountpoint.display());

    match rx.recv() {
        Ok(()) => info!("Received interrupt signal, unmounting..."),
        Err(_) => warn!("Signal channel closed unexpectedly"),
    }

    drop(handle);
    info!("Filesystem unmounted");
    Ok(())
}

/// Logs to stderr; `RUST_LOG` wins over `-v`.
fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .init();
}
