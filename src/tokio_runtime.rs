//! Global Tokio runtime for the auto-stop timers
//!
//! GPUI uses its own async executor; timers that must keep running while
//! the window is hidden live on a small lazily-initialized Tokio runtime.

use std::sync::OnceLock;
use tokio::runtime::Runtime;

static TOKIO_RUNTIME: OnceLock<Runtime> = OnceLock::new();

/// Initialize the global Tokio runtime. Call this during app startup.
pub fn init() {
    TOKIO_RUNTIME.get_or_init(|| {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("micpass-timer")
            .enable_all()
            .build()
            .expect("Failed to create Tokio runtime")
    });
}

/// Get the global Tokio runtime handle
pub fn handle() -> tokio::runtime::Handle {
    TOKIO_RUNTIME
        .get()
        .expect("Tokio runtime not initialized - call tokio_runtime::init() first")
        .handle()
        .clone()
}
