//! Worker pool construction.
//!
//! Each running connector owns a [`WorkerPool`] built from its options at
//! `start`: `numThreads` sizes it and `realTimePriority` sets the scheduling
//! of its threads. The listener and every connection live on it.

use std::future::Future;
use std::io;
use tokio::runtime::{Handle, Runtime};
use tokio::task::JoinHandle;

use crate::config::ConnectorOptions;

/// Build the multi-threaded runtime that serves connections.
///
/// With a non-negative `real_time_priority`, every worker asks for
/// round-robin real-time scheduling on start. Refusal by the OS (usually
/// missing privileges) is logged and the worker keeps the default policy.
pub fn build_worker_runtime(options: &ConnectorOptions) -> io::Result<tokio::runtime::Runtime> {
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder
        .worker_threads(options.num_threads.max(1))
        .thread_name("exchange-worker")
        .enable_all();

    let priority = options.real_time_priority;
    if priority >= 0 {
        builder.on_thread_start(move || {
            if let Err(e) = make_real_time(priority) {
                tracing::warn!(priority, error = %e, "Real-time scheduling refused");
            }
        });
    }

    tracing::debug!(threads = options.num_threads, priority, "Building worker runtime");
    builder.build()
}

/// Worker runtime owned by a running connector.
///
/// Dropping the pool stops its threads without blocking, so it can be
/// released from async code.
#[derive(Debug)]
pub struct WorkerPool {
    runtime: Option<Runtime>,
    num_threads: usize,
}

impl WorkerPool {
    pub fn new(options: &ConnectorOptions) -> io::Result<Self> {
        Ok(Self {
            runtime: Some(build_worker_runtime(options)?),
            num_threads: options.num_threads.max(1),
        })
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Spawn `future` on the pool's workers.
    pub fn spawn<F>(&self, future: F) -> io::Result<JoinHandle<F::Output>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        Ok(self.handle()?.spawn(future))
    }

    pub fn handle(&self) -> io::Result<&Handle> {
        self.runtime
            .as_ref()
            .map(Runtime::handle)
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "worker pool already stopped"))
    }

    /// Stop the worker threads. Tasks still running are cancelled.
    pub fn stop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            tracing::debug!(threads = self.num_threads, "Stopping worker pool");
            runtime.shutdown_background();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Switch the calling thread to `SCHED_RR` at `priority`.
#[cfg(unix)]
pub fn make_real_time(priority: i32) -> io::Result<()> {
    // SAFETY: sched_param is plain old data; zeroed is a valid value and the
    // only field we rely on is set right after.
    let mut param: libc::sched_param = unsafe { std::mem::zeroed() };
    param.sched_priority = priority;
    // SAFETY: pthread_self is always a valid handle for the calling thread
    // and param outlives the call.
    let rc = unsafe { libc::pthread_setschedparam(libc::pthread_self(), libc::SCHED_RR, &param) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::from_raw_os_error(rc))
    }
}

#[cfg(not(unix))]
pub fn make_real_time(_priority: i32) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "real-time scheduling requires a Unix platform",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_uses_configured_threads() {
        let options = ConnectorOptions {
            num_threads: 2,
            ..ConnectorOptions::default()
        };
        let runtime = build_worker_runtime(&options).unwrap();
        assert_eq!(runtime.metrics().num_workers(), 2);
        assert_eq!(runtime.block_on(async { 40 + 2 }), 42);
    }

    #[tokio::test]
    async fn pool_runs_tasks_on_named_workers() {
        let options = ConnectorOptions {
            num_threads: 2,
            ..ConnectorOptions::default()
        };
        let mut pool = WorkerPool::new(&options).unwrap();
        assert_eq!(pool.num_threads(), 2);

        let name = pool
            .spawn(async { std::thread::current().name().map(str::to_string) })
            .unwrap()
            .await
            .unwrap();
        assert_eq!(name.as_deref(), Some("exchange-worker"));

        // Stopping inside a runtime must not panic, and is idempotent.
        pool.stop();
        pool.stop();
        assert!(pool.spawn(async {}).is_err());
    }
}
