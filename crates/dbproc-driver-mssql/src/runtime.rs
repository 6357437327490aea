//! Tokio runtime backing the blocking driver entry points
//!
//! tiberius is async-only, so `open_blocking` and `execute_reader_blocking`
//! run its futures on a small runtime owned by the driver. The calling
//! thread only waits for the result, which works from plain threads and
//! from `spawn_blocking` alike.

use dbproc_core::{DbProcError, Result};
use std::future::Future;
use std::sync::OnceLock;
use tokio::runtime::Runtime;

/// Shared runtime, or the reason it could not be built
static DRIVER_RUNTIME: OnceLock<std::result::Result<Runtime, String>> = OnceLock::new();

/// Get or create the shared driver runtime.
fn driver_runtime() -> Result<&'static Runtime> {
    DRIVER_RUNTIME
        .get_or_init(|| {
            tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .thread_name("dbproc-mssql-runtime")
                .build()
                .map_err(|e| e.to_string())
        })
        .as_ref()
        .map_err(|e| DbProcError::Configuration(format!("failed to start driver runtime: {}", e)))
}

/// Spawn a background task on the driver runtime
pub(crate) fn spawn<F>(future: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    driver_runtime()?.spawn(future);
    Ok(())
}

/// Run a future on the driver runtime and block the calling thread until it
/// finishes.
///
/// Called from inside an async task this stalls that worker thread; async
/// callers should use the async methods on the connection.
pub(crate) fn block_on<F>(future: F) -> Result<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let task = driver_runtime()?.spawn(future);
    wait(task).map_err(|e| DbProcError::Execution(format!("driver task failed: {}", e)))
}

/// Block the calling thread on a future that is driven elsewhere
pub(crate) fn wait<F: Future>(future: F) -> F::Output {
    futures::executor::block_on(future)
}
