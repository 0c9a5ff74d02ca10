//! C-ABI exports for embedding this allocator in non-Rust binaries.
//!
//! Gated behind `features = ["ffi"]`. Thin wrappers over the core facade in
//! `allocator`; like `posix_memalign`/`free`, the caller must pass back the
//! same size and alignment it allocated with.

use crate::allocator;
use crate::config::POOL_ALIGNMENT;
use core::ptr;

#[unsafe(export_name = "pagemalloc_alloc")]
pub unsafe extern "C" fn pagemalloc_alloc(size: usize, align: usize) -> *mut u8 {
    if align <= POOL_ALIGNMENT {
        allocator::allocate(size)
    } else {
        allocator::allocate_aligned(size, align)
    }
}

#[unsafe(export_name = "pagemalloc_dealloc")]
pub unsafe extern "C" fn pagemalloc_dealloc(ptr: *mut u8, _size: usize, _align: usize) {
    allocator::deallocate(ptr)
}

#[unsafe(export_name = "pagemalloc_realloc")]
pub unsafe extern "C" fn pagemalloc_realloc(
    ptr: *mut u8,
    old_size: usize,
    align: usize,
    new_size: usize,
) -> *mut u8 {
    if ptr.is_null() {
        return unsafe { pagemalloc_alloc(new_size, align) };
    }
    if new_size == 0 {
        unsafe { allocator::deallocate(ptr) };
        return ptr::null_mut();
    }

    let new_ptr = unsafe { pagemalloc_alloc(new_size, align) };
    if !new_ptr.is_null() {
        let copy_size = old_size.min(new_size);
        unsafe { ptr::copy_nonoverlapping(ptr, new_ptr, copy_size) };
        unsafe { allocator::deallocate(ptr) };
    }
    new_ptr
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_dealloc_round_trip() {
        unsafe {
            let p = pagemalloc_alloc(64, 8);
            assert!(!p.is_null());
            pagemalloc_dealloc(p, 64, 8);
        }
    }

    #[test]
    fn test_realloc_grows_and_preserves_prefix() {
        unsafe {
            let p = pagemalloc_alloc(16, 8);
            assert!(!p.is_null());
            ptr::write_bytes(p, 0x42, 16);
            let p2 = pagemalloc_realloc(p, 16, 8, 512);
            assert!(!p2.is_null());
            for i in 0..16 {
                assert_eq!(*p2.add(i), 0x42);
            }
            pagemalloc_dealloc(p2, 512, 8);
        }
    }

    #[test]
    fn test_realloc_to_zero_frees() {
        unsafe {
            let p = pagemalloc_alloc(32, 8);
            let result = pagemalloc_realloc(p, 32, 8, 0);
            assert!(result.is_null());
        }
    }
}
