pub mod client_directory;
pub mod dynamo;
#[cfg(any(test, feature = "test-helpers"))]
pub mod memory;
pub mod notifier;
pub mod telemetry_store;
pub mod webhook;

use std::future::Future;

/// Drives an async SDK call to completion from a synchronous adapter.
/// Requires the multi-thread Tokio runtime.
pub(crate) fn block_on<F: Future>(future: F) -> F::Output {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
