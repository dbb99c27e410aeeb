//! Background runtime for keepalive-dns tasks.
//!
//! Refresh timers, deferred lookup callbacks and queued signal slots are all
//! spawned through [`spawn`]. Inside a tokio runtime the task goes onto that
//! runtime; from plain synchronous code it goes onto a small process-global
//! runtime created on first use. Neither keeps the process alive: tokio
//! drops outstanding tasks when its runtime shuts down, and the global
//! runtime's worker threads never block process exit.

use std::future::Future;
use std::sync::OnceLock;

use tokio::runtime::{Handle, Runtime};
use tokio::task::JoinHandle;

static RUNTIME: OnceLock<Runtime> = OnceLock::new();

/// Initialize the global fallback runtime.
///
/// Calling this is optional; the runtime is created on first use.
pub fn init() -> &'static Runtime {
    RUNTIME.get_or_init(|| {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("keepalive-dns")
            .enable_all()
            .build()
            .expect("Failed to create tokio runtime")
    })
}

/// Get a handle to the runtime tasks should be spawned on.
pub fn handle() -> Handle {
    Handle::try_current().unwrap_or_else(|_| init().handle().clone())
}

/// Spawn a future on the current runtime, or the global one outside of it.
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    handle().spawn(future)
}

/// Block on a future using the global runtime.
///
/// # Warning
///
/// Do not call this from within an async context; tokio panics when a
/// runtime is blocked on from inside another.
pub fn block_on<F: Future>(future: F) -> F::Output {
    init().block_on(future)
}
