//! The allocator facade: ties the central heap, thread heap, and large-object
//! path together behind the three operations every caller actually wants —
//! `allocate`, `allocate_aligned`, `deallocate` — plus the `GlobalAlloc` and
//! (nightly) `core::alloc::Allocator` adapters that expose those operations
//! to `Box`, `Vec`, `String`, and the rest of the standard container
//! ecosystem.
//!
//! The central heap is a plain `static` rather than a lazily-initialized
//! one: every one of its fields (`[AtomicPtr; NUM_SIZE_CLASSES]` behind a
//! spinlock) admits a `const` zero state, so there is no first-use barrier
//! to get wrong.

use crate::central_heap::CentralHeap;
use crate::config::{MAX_SMALL_OBJECT_SIZE, POOL_ALIGNMENT};
use crate::large;
use crate::page;
use crate::size_class;
use crate::thread_heap::ThreadHeap;
use core::ptr;
use core::sync::atomic::Ordering;

#[cfg(feature = "debug")]
use crate::tracker;
#[cfg(feature = "stats")]
use crate::stats;

static CENTRAL_HEAP: CentralHeap = CentralHeap::new();

/// The process-wide central heap singleton.
pub fn central() -> &'static CentralHeap {
    &CENTRAL_HEAP
}

/// Manually drives a caller-owned [`ThreadHeap`] through one operation
/// against the process-wide central heap. The `std` feature's `PageMalloc`
/// does this automatically via `thread_local!`; without it, the embedder
/// owns the `ThreadHeap` (e.g. one per worker, parked in whatever
/// thread-local mechanism their platform offers) and calls this directly.
pub fn with_thread_heap<R>(
    heap: &mut ThreadHeap,
    f: impl FnOnce(&mut ThreadHeap, &CentralHeap) -> R,
) -> R {
    f(heap, central())
}

#[cfg(feature = "std")]
mod facade {
    use super::*;
    use core::cell::UnsafeCell;

    struct ThreadHeapCell {
        heap: UnsafeCell<ThreadHeap>,
    }

    // `ThreadHeap` itself asserts Send+Sync for the reasons documented on
    // that impl; the cell just needs to not be accidentally double-borrowed,
    // which `with`/`try_with`'s closure discipline already guarantees.
    unsafe impl Sync for ThreadHeapCell {}

    impl Drop for ThreadHeapCell {
        fn drop(&mut self) {
            let heap = unsafe { &mut *self.heap.get() };
            heap.on_thread_exit(central());
        }
    }

    std::thread_local! {
        static THREAD_HEAP: ThreadHeapCell = ThreadHeapCell {
            heap: UnsafeCell::new(ThreadHeap::new()),
        };
    }

    /// `size = 0` returns null. `size <= MAX_SMALL_OBJECT_SIZE` routes to
    /// the current thread's heap; anything larger goes straight to the
    /// large-object path.
    pub fn allocate(size: usize) -> *mut u8 {
        if size == 0 {
            return ptr::null_mut();
        }
        if size <= MAX_SMALL_OBJECT_SIZE {
            let class_idx = size_class::size_to_class(size);
            let ptr = THREAD_HEAP
                .try_with(|cell| {
                    let heap = unsafe { &mut *cell.heap.get() };
                    unsafe { heap.allocate(central(), class_idx) }
                })
                .unwrap_or(ptr::null_mut());
            #[cfg(feature = "stats")]
            if !ptr.is_null() {
                stats::record_alloc(size);
            }
            ptr
        } else {
            allocate_large(size, POOL_ALIGNMENT)
        }
    }

    /// Always routes through the large-object path: the small path's
    /// natural alignment is `POOL_ALIGNMENT`, so any explicitly aligned
    /// request is serviced by a dedicated OS mapping instead.
    pub fn allocate_aligned(size: usize, align: usize) -> *mut u8 {
        if size == 0 {
            return ptr::null_mut();
        }
        allocate_large(size, align)
    }

    fn allocate_large(size: usize, align: usize) -> *mut u8 {
        let ptr = large::allocate(size, align);
        #[cfg(feature = "stats")]
        if !ptr.is_null() {
            stats::record_alloc(size);
        }
        ptr
    }

    /// `null` is a no-op. Otherwise: (a) check for a large-object header
    /// immediately below `ptr`; (b) else derive the owning page and check
    /// its magic; (c) else the pointer is foreign and is silently ignored.
    pub fn deallocate(ptr: *mut u8) {
        if ptr.is_null() {
            return;
        }
        if unsafe { large::try_deallocate(ptr) } {
            #[cfg(feature = "stats")]
            stats::record_dealloc();
            return;
        }

        let page = page::page_of(ptr);
        if unsafe { (*page).magic.load(Ordering::Acquire) } != page::PAGE_MAGIC {
            return;
        }
        let owner = unsafe { (*page).owner.load(Ordering::Acquire) };
        if owner.is_null() {
            // Page already sits in the central heap's free list; this
            // pointer is stale (e.g. a double-free after thread exit).
            return;
        }

        let handled_locally = THREAD_HEAP
            .try_with(|cell| {
                let heap = unsafe { &mut *cell.heap.get() };
                if core::ptr::eq(heap as *const ThreadHeap, owner as *const ThreadHeap) {
                    unsafe { heap.deallocate_local(central(), ptr) };
                    true
                } else {
                    false
                }
            })
            .unwrap_or(false);

        if !handled_locally {
            unsafe { (*owner).push_deferred(ptr) };
        }
        #[cfg(feature = "stats")]
        stats::record_dealloc();
    }

    fn alloc_dispatch(layout: core::alloc::Layout) -> *mut u8 {
        if layout.align() > POOL_ALIGNMENT {
            allocate_aligned(layout.size(), layout.align())
        } else {
            allocate(layout.size())
        }
    }

    /// Zero-sized handle for `#[global_allocator]`. All state lives in
    /// process-wide statics and thread-locals behind the type, so any two
    /// `PageMalloc` values are always interchangeable.
    pub struct PageMalloc;

    #[cfg(feature = "debug")]
    mod reentrancy {
        use core::cell::Cell;

        std::thread_local! {
            static ACTIVE: Cell<bool> = const { Cell::new(true) };
        }

        /// RAII guard marking whether this call is nested inside another
        /// call already running on this thread. While nested (e.g. the
        /// leak tracker's own `BTreeMap` insert recursing back into the
        /// global allocator), the caller should forward straight to the
        /// platform allocator instead of touching this crate's bookkeeping
        /// again.
        pub struct Guard {
            nested: bool,
        }

        impl Guard {
            pub fn enter() -> Self {
                let nested = !ACTIVE.with(|c| c.replace(false));
                Guard { nested }
            }

            pub fn is_nested(&self) -> bool {
                self.nested
            }
        }

        impl Drop for Guard {
            fn drop(&mut self) {
                if !self.nested {
                    ACTIVE.with(|c| c.set(true));
                }
            }
        }
    }

    #[cfg(feature = "debug")]
    fn tracker() -> &'static tracker::MemoryTracker {
        static TRACKER: std::sync::OnceLock<tracker::MemoryTracker> = std::sync::OnceLock::new();
        TRACKER.get_or_init(tracker::MemoryTracker::new)
    }

    /// Walks the debug leak tracker's shards and reports every allocation
    /// still outstanding. There is no `atexit` hook; the embedder decides
    /// when "shutdown" is and calls this explicitly.
    #[cfg(feature = "debug")]
    pub fn report_leaks() -> Vec<tracker::LeakReport> {
        tracker().report_leaks()
    }

    unsafe impl core::alloc::GlobalAlloc for PageMalloc {
        #[track_caller]
        unsafe fn alloc(&self, layout: core::alloc::Layout) -> *mut u8 {
            #[cfg(feature = "debug")]
            {
                let guard = reentrancy::Guard::enter();
                if guard.is_nested() {
                    return unsafe { std::alloc::System.alloc(layout) };
                }
                let ptr = alloc_dispatch(layout);
                if !ptr.is_null() {
                    let loc = core::panic::Location::caller();
                    tracker().track(
                        crate::thread_registry::current_thread_id(),
                        ptr,
                        layout.size(),
                        loc.file(),
                        loc.line(),
                    );
                }
                ptr
            }
            #[cfg(not(feature = "debug"))]
            {
                alloc_dispatch(layout)
            }
        }

        #[track_caller]
        unsafe fn dealloc(&self, ptr: *mut u8, layout: core::alloc::Layout) {
            #[cfg(feature = "debug")]
            {
                let guard = reentrancy::Guard::enter();
                if guard.is_nested() {
                    return unsafe { std::alloc::System.dealloc(ptr, layout) };
                }
                deallocate(ptr);
                tracker().untrack(crate::thread_registry::current_thread_id(), ptr);
            }
            #[cfg(not(feature = "debug"))]
            {
                deallocate(ptr)
            }
        }

        #[track_caller]
        unsafe fn realloc(
            &self,
            ptr: *mut u8,
            layout: core::alloc::Layout,
            new_size: usize,
        ) -> *mut u8 {
            #[cfg(feature = "stats")]
            stats::record_realloc();

            // Fast path: the new size still fits in the block's existing
            // size class, so the allocation doesn't need to move at all.
            // Gated on the *old* layout also being small: otherwise `ptr`
            // may be a large-object payload, and masking it down to a page
            // boundary can land below the mapping's base, in unmapped
            // memory.
            if layout.align() <= POOL_ALIGNMENT
                && layout.size() <= MAX_SMALL_OBJECT_SIZE
                && new_size >= 1
                && new_size <= MAX_SMALL_OBJECT_SIZE
            {
                let page = page::page_of(ptr);
                if unsafe { (*page).magic.load(Ordering::Acquire) } == page::PAGE_MAGIC
                    && size_class::size_to_class(new_size) == unsafe { (*page).size_class_index }
                {
                    return ptr;
                }
            }

            let new_layout =
                unsafe { core::alloc::Layout::from_size_align_unchecked(new_size, layout.align()) };
            let new_ptr = unsafe { self.alloc(new_layout) };
            if !new_ptr.is_null() {
                let copy_size = layout.size().min(new_size);
                unsafe { ptr::copy_nonoverlapping(ptr, new_ptr, copy_size) };
                unsafe { self.dealloc(ptr, layout) };
            }
            new_ptr
        }
    }

    #[cfg(feature = "nightly")]
    unsafe impl core::alloc::Allocator for PageMalloc {
        fn allocate(
            &self,
            layout: core::alloc::Layout,
        ) -> Result<core::ptr::NonNull<[u8]>, core::alloc::AllocError> {
            let ptr = alloc_dispatch(layout);
            let ptr = core::ptr::NonNull::new(ptr).ok_or(core::alloc::AllocError)?;
            Ok(core::ptr::NonNull::slice_from_raw_parts(ptr, layout.size()))
        }

        unsafe fn deallocate(&self, ptr: core::ptr::NonNull<u8>, _layout: core::alloc::Layout) {
            deallocate(ptr.as_ptr());
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_small_round_trip_is_pool_aligned_and_lifo() {
            let p1 = allocate(7);
            let p2 = allocate(15);
            let p3 = allocate(32);
            let p4 = allocate(250);
            assert!(!p1.is_null() && !p2.is_null() && !p3.is_null() && !p4.is_null());
            assert_eq!(p1 as usize % POOL_ALIGNMENT, 0);

            deallocate(p1);
            deallocate(p2);
            deallocate(p3);
            deallocate(p4);

            // Single-threaded, same-class LIFO reuse.
            let p5 = allocate(7);
            assert_eq!(p1, p5);
            deallocate(p5);
        }

        #[test]
        fn test_aligned_allocation_honors_alignment() {
            let p = allocate_aligned(37, 32);
            assert!(!p.is_null());
            assert_eq!(p as usize % 32, 0);
            deallocate(p);
        }

        #[test]
        fn test_zero_size_allocation_returns_null() {
            assert!(allocate(0).is_null());
            assert!(allocate_aligned(0, 16).is_null());
        }

        #[test]
        fn test_large_allocation_round_trips() {
            let p = allocate(1 << 20);
            assert!(!p.is_null());
            unsafe {
                ptr::write_bytes(p, 0xAB, 1 << 20);
            }
            deallocate(p);
        }

        #[test]
        fn test_deallocate_null_is_a_no_op() {
            deallocate(ptr::null_mut());
        }

        #[test]
        fn test_foreign_pointer_deallocate_is_ignored() {
            let mut stack_value = 0u64;
            deallocate(&mut stack_value as *mut u64 as *mut u8);
        }
    }
}

#[cfg(feature = "std")]
pub use facade::*;
