//! The 16 KiB page: the unit of currency between the central heap and a
//! thread heap, and the anchor for pointer-provenance classification.
//!
//! Every page is mapped at an address aligned to `PAGE_SIZE`, with a header
//! at offset 0, so that any block pointer inside it can be traced back to
//! its header by masking off the low bits. This is the allocator's only
//! mechanism for answering "which page, and therefore which size class and
//! which owner, does this pointer belong to".

use crate::config::PAGE_SIZE;
use crate::size_class;
use crate::thread_heap::ThreadHeap;
use core::ptr;
use core::sync::atomic::{AtomicPtr, AtomicU32, AtomicU64, Ordering};

/// Marks a page as produced by the central heap, distinguishing it from a
/// foreign pointer or a large-object allocation during pointer classification.
/// Chosen so it can never appear as a valid large-object header magic at any
/// offset a small-block pointer could mask to (see `crate::large::LARGE_MAGIC`).
pub const PAGE_MAGIC: u64 = 0x5041_4745_4845_4150; // "PAGEHEAP" in ASCII, reversed by endianness

/// Header occupying the first bytes of every page. Fields that are mutated
/// after construction are atomics: `free_list` and `used_blocks` may be
/// touched by the deferred-free processor in addition to the owning thread's
/// direct free path, and `owner` transitions exactly twice in a page's life
/// (set on refill, cleared on return).
#[repr(C)]
pub struct PageHeader {
    pub magic: AtomicU64,
    /// Thread heap that currently owns this page, or null if it sits in the
    /// central heap's free list. Raw pointer into that heap's thread-local
    /// storage; valid only while the owning thread is alive (see
    /// `ThreadHeap::on_thread_exit`).
    pub owner: AtomicPtr<ThreadHeap>,
    /// Intrusive link for the owning thread heap's per-class page list.
    /// Only ever touched by the owner thread, so a bare pointer suffices.
    pub local_next: *mut PageHeader,
    /// Intrusive link used while the page sits in the central heap's
    /// per-class free list. Only ever touched under the central heap's lock.
    pub central_next: *mut PageHeader,
    pub free_list: AtomicPtr<FreeBlock>,
    pub used_blocks: AtomicU32,
    pub size_class_index: usize,
}

/// A free block, viewed as a link in the page's free list. Overlays the
/// block's own storage; there is no block content to preserve while it sits
/// on the free list.
#[repr(C)]
pub struct FreeBlock {
    pub next: *mut FreeBlock,
}

/// Offset of the first block in a page, rounded up from the header size to
/// keep blocks aligned to `POOL_ALIGNMENT`.
pub fn payload_offset() -> usize {
    let header = core::mem::size_of::<PageHeader>();
    let align = crate::config::POOL_ALIGNMENT;
    (header + align - 1) & !(align - 1)
}

/// Number of blocks of `class_idx`'s size that fit in a page after the header.
pub fn blocks_per_page(class_idx: usize) -> usize {
    let block_size = size_class::class_to_size(class_idx);
    (PAGE_SIZE - payload_offset()) / block_size
}

/// Recovers the page containing `ptr` by masking off the low `PAGE_SIZE`
/// bits. Valid only when `ptr` genuinely falls inside an allocator-owned
/// page; callers must confirm via the magic field before trusting the
/// result.
#[inline]
pub fn page_of(ptr: *mut u8) -> *mut PageHeader {
    ((ptr as usize) & !(PAGE_SIZE - 1)) as *mut PageHeader
}

/// Initializes a freshly mapped page's header and chains its blocks into a
/// free list. `raw` must point to exactly `PAGE_SIZE` bytes of zeroed,
/// writable memory, aligned to `PAGE_SIZE`.
///
/// # Safety
/// `raw` must be a unique, valid, `PAGE_SIZE`-aligned, `PAGE_SIZE`-byte
/// mapping that no other code observes until this call returns.
pub unsafe fn init_page(raw: *mut u8, class_idx: usize) -> *mut PageHeader {
    let header = raw as *mut PageHeader;
    unsafe {
        ptr::write(
            header,
            PageHeader {
                magic: AtomicU64::new(PAGE_MAGIC),
                owner: AtomicPtr::new(ptr::null_mut()),
                local_next: ptr::null_mut(),
                central_next: ptr::null_mut(),
                free_list: AtomicPtr::new(ptr::null_mut()),
                used_blocks: AtomicU32::new(0),
                size_class_index: class_idx,
            },
        );
    }

    let block_size = size_class::class_to_size(class_idx);
    let count = blocks_per_page(class_idx);
    let base = unsafe { raw.add(payload_offset()) };

    let mut head: *mut FreeBlock = ptr::null_mut();
    for i in (0..count).rev() {
        let block = unsafe { base.add(i * block_size) } as *mut FreeBlock;
        unsafe { (*block).next = head };
        head = block;
    }
    unsafe { (*header).free_list.store(head, Ordering::Release) };

    header
}
