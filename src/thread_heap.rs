//! The thread heap: a per-thread cache of pages, serving allocations and
//! local frees without any synchronization on the hot path.
//!
//! This is the hardest component in the allocator: it owns the CAS loops
//! over each page's free list (needed even though only the owner thread
//! pops, because the deferred-free processor — which also only ever runs on
//! the owner — can interleave pushes with a concurrent allocation if it's
//! invoked reentrantly), the refill path to the central heap, the
//! cross-thread dispatch into the deferred queue, and the unconditional
//! page return on thread exit.

use crate::central_heap::CentralHeap;
use crate::deferred_queue::DeferredQueue;
use crate::page::{self, FreeBlock, PageHeader};
use crate::size_class::NUM_SIZE_CLASSES;
use core::ptr;
use core::sync::atomic::Ordering;

pub struct ThreadHeap {
    pages: [*mut PageHeader; NUM_SIZE_CLASSES],
    deferred: DeferredQueue,
    #[cfg(feature = "debug")]
    thread_id: u32,
}

// Pages are only ever touched by the owning thread directly; the owner
// pointer stored in a page header is the only cross-thread access, and it
// only ever reaches the deferred queue (Sync) or the owner field itself
// (atomic). A ThreadHeap's address is shared across threads via that owner
// pointer, so it must be Sync; it is never genuinely accessed concurrently
// except through the two paths above.
unsafe impl Sync for ThreadHeap {}
unsafe impl Send for ThreadHeap {}

impl ThreadHeap {
    pub fn new() -> Self {
        Self {
            pages: [ptr::null_mut(); NUM_SIZE_CLASSES],
            deferred: DeferredQueue::new(),
            #[cfg(feature = "debug")]
            thread_id: crate::thread_registry::current_thread_id(),
        }
    }

    /// Pushes a pointer known to be owned by this heap onto its deferred
    /// queue, for a thread other than the owner to have routed here.
    ///
    /// # Safety
    /// `ptr` must be a block belonging to a page owned by this heap.
    pub unsafe fn push_deferred(&self, ptr: *mut u8) {
        unsafe { self.deferred.push(ptr) };
    }

    /// Services an allocation request of `class_idx`'s size, refilling from
    /// `central` if every owned page for that class is exhausted.
    ///
    /// # Safety
    /// Must only be called by the thread that owns `self`.
    pub unsafe fn allocate(&mut self, central: &CentralHeap, class_idx: usize) -> *mut u8 {
        unsafe { self.drain_deferred(central) };

        loop {
            let mut page = self.pages[class_idx];
            while !page.is_null() {
                if let Some(ptr) = unsafe { Self::try_pop(page) } {
                    #[cfg(feature = "stats")]
                    crate::stats::record_thread_cache_hit();
                    return ptr;
                }
                page = unsafe { (*page).local_next };
            }

            #[cfg(feature = "stats")]
            crate::stats::record_thread_cache_miss();
            let new_page = central.get_page(class_idx);
            if new_page.is_null() {
                return ptr::null_mut();
            }
            unsafe {
                (*new_page).owner.store(self as *mut ThreadHeap, Ordering::Release);
                (*new_page).local_next = self.pages[class_idx];
            }
            self.pages[class_idx] = new_page;
            // Loop again: a freshly refilled page's free list is full, so
            // the next iteration's try_pop is guaranteed to succeed.
        }
    }

    /// Attempts to pop one block from `page`'s free list via CAS. Returns
    /// `None` if the list was empty at the time of the read.
    unsafe fn try_pop(page: *mut PageHeader) -> Option<*mut u8> {
        loop {
            let head = unsafe { (*page).free_list.load(Ordering::Acquire) };
            if head.is_null() {
                return None;
            }
            let next = unsafe { (*head).next };
            let result = unsafe {
                (*page)
                    .free_list
                    .compare_exchange_weak(head, next, Ordering::AcqRel, Ordering::Acquire)
            };
            if result.is_ok() {
                unsafe { (*page).used_blocks.fetch_add(1, Ordering::Relaxed) };
                return Some(head as *mut u8);
            }
        }
    }

    /// Frees `ptr`, whose owning page has already been confirmed to belong
    /// to `self` by the caller (the facade, via the page's owner pointer).
    ///
    /// # Safety
    /// Must only be called by the thread that owns `self`, with `ptr`
    /// pointing into a page owned by `self`.
    pub unsafe fn deallocate_local(&mut self, central: &CentralHeap, ptr: *mut u8) {
        let page = page::page_of(ptr);
        unsafe { self.local_dealloc(central, ptr, page) };
    }

    unsafe fn local_dealloc(&mut self, central: &CentralHeap, ptr: *mut u8, page: *mut PageHeader) {
        let block = ptr as *mut FreeBlock;
        loop {
            let head = unsafe { (*page).free_list.load(Ordering::Acquire) };
            unsafe { (*block).next = head };
            let result = unsafe {
                (*page)
                    .free_list
                    .compare_exchange_weak(head, block, Ordering::Release, Ordering::Relaxed)
            };
            if result.is_ok() {
                break;
            }
        }
        if unsafe { (*page).used_blocks.fetch_sub(1, Ordering::AcqRel) } == 1 {
            unsafe { self.return_page_if_empty(central, page) };
        }
    }

    /// Unlinks `page` from this heap's per-class list, clears its owner, and
    /// hands it back to the central heap. Only called on the used-blocks
    /// 1-to-0 transition.
    unsafe fn return_page_if_empty(&mut self, central: &CentralHeap, page: *mut PageHeader) {
        let class_idx = unsafe { (*page).size_class_index };
        let mut cur = self.pages[class_idx];
        if cur == page {
            self.pages[class_idx] = unsafe { (*page).local_next };
        } else {
            while !cur.is_null() {
                let next = unsafe { (*cur).local_next };
                if next == page {
                    unsafe { (*cur).local_next = (*page).local_next };
                    break;
                }
                cur = next;
            }
        }
        unsafe {
            (*page).local_next = ptr::null_mut();
            (*page).owner.store(ptr::null_mut(), Ordering::Release);
        }
        central.return_page(page);
    }

    /// Drains the deferred-free queue, reinserting every pointer via the
    /// local fast path. Safe to call with an empty queue (the common case):
    /// a single atomic swap against null.
    ///
    /// # Safety
    /// Must only be called by the thread that owns `self`.
    pub unsafe fn drain_deferred(&mut self, central: &CentralHeap) {
        let heap_ptr: *mut ThreadHeap = self;
        let deferred_ptr: *const DeferredQueue = &self.deferred;
        unsafe {
            (*deferred_ptr).drain(|ptr| {
                let page = page::page_of(ptr);
                (*heap_ptr).local_dealloc(central, ptr, page);
            });
        }
    }

    /// Runs at thread exit: drains any still-pending cross-thread frees,
    /// then unconditionally returns every page this heap owns to the
    /// central heap, regardless of outstanding `used_blocks`. Any blocks
    /// still considered "allocated" at this point are a caller leak, not
    /// something this allocator tracks down.
    pub fn on_thread_exit(&mut self, central: &CentralHeap) {
        unsafe { self.drain_deferred(central) };
        for class_idx in 0..NUM_SIZE_CLASSES {
            let mut page = self.pages[class_idx];
            while !page.is_null() {
                let next = unsafe { (*page).local_next };
                unsafe {
                    (*page).local_next = ptr::null_mut();
                    (*page).owner.store(ptr::null_mut(), Ordering::Release);
                }
                central.return_page(page);
                page = next;
            }
            self.pages[class_idx] = ptr::null_mut();
        }
    }

    #[cfg(feature = "debug")]
    pub fn thread_id(&self) -> u32 {
        self.thread_id
    }
}
