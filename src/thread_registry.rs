//! Thread-id registry: issues a monotonic 32-bit id to each OS thread on its
//! first request, cached thread-locally afterward.
//!
//! IDs are never reclaimed. Only the debug leak tracker consumes them, to
//! shard its per-thread bookkeeping; the allocator's own pointer routing
//! never touches the registry.

use core::sync::atomic::{AtomicU32, Ordering};

static NEXT_ID: AtomicU32 = AtomicU32::new(0);

#[cfg(feature = "std")]
std::thread_local! {
    static THREAD_ID: core::cell::Cell<Option<u32>> = const { core::cell::Cell::new(None) };
}

/// Returns this thread's id, issuing a fresh one on first call.
#[cfg(feature = "std")]
pub fn current_thread_id() -> u32 {
    THREAD_ID.with(|cell| match cell.get() {
        Some(id) => id,
        None => {
            let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
            cell.set(Some(id));
            id
        }
    })
}

/// Without `std`'s thread-locals there is no per-thread cache to consult, so
/// every call issues a fresh id. Only exercised when the `debug` tracker
/// (which is the registry's only consumer) is itself built without `std`,
/// which is not a supported combination today but keeps the module
/// buildable either way.
#[cfg(not(feature = "std"))]
pub fn current_thread_id() -> u32 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}
