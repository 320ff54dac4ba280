//! Request executor for FUSE operations.
//!
//! fuser delivers every request on its session thread. Running backing I/O
//! there would serialize the whole filesystem behind the slowest `stat` or
//! `read`, so each request is handed to a tokio blocking pool instead and
//! the session thread returns immediately.
//!
//! # Architecture
//!
//! 1. The adapter submits a job (dispatch the operation) plus a delivery
//!    closure that owns the fuser reply object
//! 2. A blocking-pool thread runs the job, catching panics
//! 3. The delivery closure sends exactly one reply, `EIO` if the job panicked
//!
//! The pool size bounds how many requests execute at once; further
//! submissions queue inside tokio.

use loopfs_core::Reply;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, error, warn};

/// How long `Drop` waits for in-flight requests.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Result type for executor operations.
pub type ExecutorResult<T> = Result<T, ExecutorError>;

/// Errors that can occur in the executor.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    /// The executor has been shut down.
    #[error("executor is shutting down")]
    Shutdown,

    /// A request handler panicked.
    #[error("request handler panicked")]
    WorkerPanic,

    /// The runtime could not be created.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExecutorError {
    /// Converts this error to a libc errno value.
    pub fn to_errno(&self) -> libc::c_int {
        match self {
            ExecutorError::Shutdown => libc::ESHUTDOWN,
            ExecutorError::WorkerPanic | ExecutorError::Io(_) => libc::EIO,
        }
    }
}

/// Statistics about executed requests.
#[derive(Debug, Default)]
pub struct ExecutorStats {
    /// Requests handed to the pool.
    pub requests_submitted: AtomicU64,
    /// Requests answered with a success reply.
    pub requests_completed: AtomicU64,
    /// Requests answered with an error reply.
    pub requests_failed: AtomicU64,
    /// Requests whose handler panicked.
    pub requests_panicked: AtomicU64,
}

impl ExecutorStats {
    /// Creates a new stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a request handed to the pool.
    pub fn record_submit(&self) {
        self.requests_submitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Records the outcome of a finished request.
    pub fn record_reply(&self, reply: &Reply) {
        if reply.errno().is_some() {
            self.requests_failed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.requests_completed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Records a request whose handler panicked.
    pub fn record_panic(&self) {
        self.requests_panicked.fetch_add(1, Ordering::Relaxed);
    }

    /// Requests submitted but not yet answered.
    pub fn in_flight(&self) -> u64 {
        let done = self.requests_completed.load(Ordering::Relaxed)
            + self.requests_failed.load(Ordering::Relaxed);
        self.requests_submitted
            .load(Ordering::Relaxed)
            .saturating_sub(done)
    }
}

/// Executes filesystem requests on a bounded blocking pool.
pub struct RequestExecutor {
    runtime: Option<Runtime>,
    stats: Arc<ExecutorStats>,
}

impl RequestExecutor {
    /// Creates an executor running at most `max_threads` requests at once.
    pub fn new(max_threads: usize) -> ExecutorResult<Self> {
        let max_threads = max_threads.max(1);
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(max_threads)
            .thread_name("loopfs-io")
            .enable_time()
            .build()?;

        debug!(max_threads, "RequestExecutor started");

        Ok(Self {
            runtime: Some(runtime),
            stats: Arc::new(ExecutorStats::new()),
        })
    }

    /// Returns the executor statistics.
    pub fn stats(&self) -> Arc<ExecutorStats> {
        Arc::clone(&self.stats)
    }

    /// Runs `job` on the pool and passes its reply to `deliver`.
    ///
    /// `deliver` is called exactly once. If the job panics it receives
    /// `Reply::Error(EIO)`; if the executor is shut down it is called inline
    /// with `ESHUTDOWN` and `Err(Shutdown)` is returned.
    pub fn submit<J, D>(&self, job: J, deliver: D) -> ExecutorResult<()>
    where
        J: FnOnce() -> Reply + Send + 'static,
        D: FnOnce(Reply) + Send + 'static,
    {
        let Some(runtime) = self.runtime.as_ref() else {
            let err = ExecutorError::Shutdown;
            deliver(Reply::Error(err.to_errno()));
            return Err(err);
        };

        self.stats.record_submit();
        let stats = Arc::clone(&self.stats);

        runtime.spawn_blocking(move || {
            let reply = match panic::catch_unwind(AssertUnwindSafe(job)) {
                Ok(reply) => reply,
                Err(payload) => {
                    stats.record_panic();
                    error!(panic = panic_message(payload.as_ref()), "request handler panicked");
                    Reply::Error(ExecutorError::WorkerPanic.to_errno())
                }
            };
            stats.record_reply(&reply);
            deliver(reply);
        });

        Ok(())
    }

    /// Stops accepting requests and waits briefly for in-flight ones.
    pub fn shutdown(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            let in_flight = self.stats.in_flight();
            if in_flight > 0 {
                warn!(in_flight, "shutting down executor with requests in flight");
            }
            runtime.shutdown_timeout(SHUTDOWN_TIMEOUT);
            debug!("RequestExecutor stopped");
        }
    }
}

impl Drop for RequestExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic payload"
    }
}
