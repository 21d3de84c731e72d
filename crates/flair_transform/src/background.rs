//! Executor for deferred work (stale CSS deletion, theme polling).
//!
//! Work is spawned onto the caller's tokio runtime when there is one. Hosts
//! that call the transform synchronously get a lazily started single-worker
//! runtime owned by this module.

use std::sync::LazyLock;

use tokio::runtime::{Builder, Handle, Runtime};

static RUNTIME: LazyLock<Option<Runtime>> = LazyLock::new(|| {
    Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("flair-background")
        .enable_time()
        .build()
        .inspect_err(|err| tracing::debug!("failed to start background runtime: {err}"))
        .ok()
});

/// Handle to spawn background tasks on, or `None` when no runtime is available.
pub(crate) fn handle() -> Option<Handle> {
    Handle::try_current()
        .ok()
        .or_else(|| RUNTIME.as_ref().map(|runtime| runtime.handle().clone()))
}
