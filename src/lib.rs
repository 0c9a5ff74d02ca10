#![cfg_attr(not(feature = "std"), no_std)]
#![cfg_attr(feature = "nightly", feature(allocator_api))]

//! pagemalloc: a thread-caching page allocator in the mimalloc/tcmalloc
//! lineage.
//!
//! Each thread owns a private heap (`thread_heap`) that serves small
//! allocations (<= [`config::MAX_SMALL_OBJECT_SIZE`]) without ever taking a
//! lock. When a thread heap runs out of pages for a size class, it refills
//! in bulk from a process-wide `central_heap`, which is the only place a
//! lock is ever taken, and which is itself refilled in batches from the OS
//! (`os`). Frees that cross thread boundaries are routed through a
//! lock-free MPSC queue (`deferred_queue`) back to the owning thread instead
//! of touching the central heap directly. Allocations above the
//! small-object ceiling bypass all of this and go straight to a
//! header-bearing OS mapping (`large`).
//!
//! ```ignore
//! #[global_allocator]
//! static GLOBAL: pagemalloc::PageMalloc = pagemalloc::PageMalloc;
//! ```
//!
//! Without the `std` feature this crate stays `no_std`: the per-thread
//! facade (`allocate`/`deallocate`/`PageMalloc`) is unavailable, since it
//! relies on `std::thread_local!` to find the calling thread's heap, but
//! every lower-level module — `thread_heap`, `central_heap`, `large`,
//! `page` — works standalone. [`allocator::with_thread_heap`] drives a
//! caller-owned `ThreadHeap` through one operation for embedders that
//! supply their own thread-local storage.

pub mod central_heap;
pub mod config;
pub mod deferred_queue;
pub mod large;
pub mod os;
pub mod page;
pub mod size_class;
pub mod sync;
pub mod thread_heap;
pub mod thread_registry;

pub mod allocator;

#[cfg(feature = "debug")]
pub mod tracker;

#[cfg(feature = "stats")]
pub mod stats;

#[cfg(feature = "ffi")]
pub mod ffi;

pub use allocator::with_thread_heap;
pub use config::{MAX_SMALL_OBJECT_SIZE, MAX_THREADS, PAGES_PER_BATCH, PAGE_SIZE, POOL_ALIGNMENT};

#[cfg(feature = "std")]
pub use allocator::{allocate, allocate_aligned, deallocate, PageMalloc};

#[cfg(feature = "debug")]
pub use allocator::report_leaks;
