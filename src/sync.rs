//! A small adaptive-spin mutex used to guard the central heap.
//!
//! The central-heap path is cold (most allocations never leave the thread
//! heap), so a full OS mutex would be overkill and, worse, would pull the
//! allocator's hot-adjacent code into `std::sync` machinery that itself may
//! allocate on some platforms during first use. A hand-rolled spinlock keeps
//! the crate usable in `no_std` builds and matches the rest of this
//! lineage, whose thread/central caches already assume a `crate::sync`
//! module rather than the external `spin` crate.

use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, Ordering};

/// Number of spin iterations attempted before yielding to the scheduler.
/// Tuning this is an optimization, not a correctness knob: any fair backoff
/// policy is acceptable.
const SPIN_LIMIT: u32 = 64;

pub struct SpinMutex<T> {
    locked: AtomicBool,
    value: UnsafeCell<T>,
}

unsafe impl<T: Send> Sync for SpinMutex<T> {}

impl<T> SpinMutex<T> {
    pub const fn new(value: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            value: UnsafeCell::new(value),
        }
    }

    #[inline]
    pub fn lock(&self) -> SpinMutexGuard<'_, T> {
        let mut spins = 0u32;
        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            if spins < SPIN_LIMIT {
                core::hint::spin_loop();
                spins += 1;
            } else {
                yield_now();
            }
        }
        SpinMutexGuard { lock: self }
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "std")] {
        #[inline]
        fn yield_now() {
            std::thread::yield_now();
        }
    } else {
        #[inline]
        fn yield_now() {
            core::hint::spin_loop();
        }
    }
}

pub struct SpinMutexGuard<'a, T> {
    lock: &'a SpinMutex<T>,
}

impl<T> Deref for SpinMutexGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.lock.value.get() }
    }
}

impl<T> DerefMut for SpinMutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.value.get() }
    }
}

impl<T> Drop for SpinMutexGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
    }
}
