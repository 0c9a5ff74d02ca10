//! The central heap: a process-wide singleton holding, per size class, a
//! free list of pages not currently owned by any thread heap.
//!
//! A single spinlock guards the whole free-list array. This path is cold —
//! most allocations are served entirely from a thread heap — so batching
//! refills (16 pages per mmap) and accepting one lock for the whole array
//! is simpler than per-class locks for no measured benefit.

use crate::config::{PAGES_PER_BATCH, PAGE_SIZE};
use crate::os;
use crate::page::{self, PageHeader};
use crate::size_class::NUM_SIZE_CLASSES;
use crate::sync::SpinMutex;
use core::ptr;

#[derive(Default, Clone, Copy)]
pub struct PageStats {
    pub free_page_count: usize,
}

pub struct CentralHeap {
    free_pages: SpinMutex<[*mut PageHeader; NUM_SIZE_CLASSES]>,
}

unsafe impl Send for CentralHeap {}
unsafe impl Sync for CentralHeap {}

impl CentralHeap {
    pub const fn new() -> Self {
        Self {
            free_pages: SpinMutex::new([ptr::null_mut(); NUM_SIZE_CLASSES]),
        }
    }

    /// Pops a free page for `class_idx`, refilling from the OS in batches of
    /// `PAGES_PER_BATCH` if the class is empty. Returns null on mmap failure.
    pub fn get_page(&self, class_idx: usize) -> *mut PageHeader {
        let mut lists = self.free_pages.lock();
        if lists[class_idx].is_null() {
            drop(lists);
            if !self.refill(class_idx) {
                return ptr::null_mut();
            }
            lists = self.free_pages.lock();
        }

        let page = lists[class_idx];
        debug_assert!(!page.is_null());
        lists[class_idx] = unsafe { (*page).central_next };
        unsafe {
            (*page).central_next = ptr::null_mut();
        }
        page
    }

    /// Returns a page to the free list for its size class. The caller must
    /// have already cleared `owner`; a returned page keeps whatever free
    /// list it already has (full, since it was only returned on the
    /// used-blocks 1-to-0 transition), so no reinitialization happens here.
    pub fn return_page(&self, page: *mut PageHeader) {
        let class_idx = unsafe { (*page).size_class_index };
        let mut lists = self.free_pages.lock();
        unsafe {
            (*page).central_next = lists[class_idx];
        }
        lists[class_idx] = page;
    }

    pub fn stats(&self, class_idx: usize) -> PageStats {
        let lists = self.free_pages.lock();
        let mut count = 0usize;
        let mut cur = lists[class_idx];
        while !cur.is_null() {
            count += 1;
            cur = unsafe { (*cur).central_next };
        }
        PageStats {
            free_page_count: count,
        }
    }

    /// Maps one batch of pages for `class_idx`, initializes each page's
    /// header and free list, and chains all but the first onto the class's
    /// free list. Returns false on mmap failure.
    fn refill(&self, class_idx: usize) -> bool {
        let batch = os::map_aligned(PAGES_PER_BATCH * PAGE_SIZE, PAGE_SIZE);
        if batch.is_null() {
            return false;
        }

        let mut head: *mut PageHeader = ptr::null_mut();
        for i in (0..PAGES_PER_BATCH).rev() {
            let raw = unsafe { batch.add(i * PAGE_SIZE) };
            let page = unsafe { page::init_page(raw, class_idx) };
            unsafe {
                (*page).central_next = head;
            }
            head = page;
        }

        // Another thread may have raced us through `refill` for the same
        // class (both observed it empty, both mapped a batch); chain onto
        // whatever is there rather than assuming it's still null, or the
        // loser's batch would be overwritten and its pages leaked.
        let mut lists = self.free_pages.lock();
        let mut tail = head;
        while !unsafe { (*tail).central_next }.is_null() {
            tail = unsafe { (*tail).central_next };
        }
        unsafe {
            (*tail).central_next = lists[class_idx];
        }
        lists[class_idx] = head;
        true
    }
}
