//! Size classes for small-object allocation.
//!
//! Unlike tcmalloc's graduated table (many size bands, each with its own
//! objects-per-span and batch-transfer size), this allocator only ever
//! carves one fixed-size 16 KiB page per class, so the table collapses to a
//! single linear formula: class `i` holds blocks of `(i + 1) * POOL_ALIGNMENT`
//! bytes, for `i` in `0..NUM_SIZE_CLASSES`.

use crate::config::POOL_ALIGNMENT;

/// Number of small-object size classes: block sizes 8, 16, ..., 256 bytes.
pub const NUM_SIZE_CLASSES: usize = 32;

/// Largest size routed through the small-object path.
pub const MAX_SMALL_SIZE: usize = NUM_SIZE_CLASSES * POOL_ALIGNMENT;

/// Map a request size to its size class index.
///
/// Caller must ensure `1 <= size <= MAX_SMALL_SIZE`; larger requests belong
/// to the large-object path and are never classified here.
#[inline]
pub fn size_to_class(size: usize) -> usize {
    debug_assert!(size >= 1 && size <= MAX_SMALL_SIZE);
    (size + POOL_ALIGNMENT - 1) / POOL_ALIGNMENT - 1
}

/// Block size served by a given class index.
#[inline]
pub fn class_to_size(class_idx: usize) -> usize {
    debug_assert!(class_idx < NUM_SIZE_CLASSES);
    (class_idx + 1) * POOL_ALIGNMENT
}
