//! The cross-thread deferred-free queue: a lock-free MPSC list of pointers
//! freed by a thread other than the page's owner.
//!
//! Any thread may push; only the owning thread ever pops, and it always
//! pops the entire queue in one exchange. Delivery order is unspecified —
//! callers reinsert each pointer via the normal local-free fast path, which
//! doesn't care what order that happens in.
//!
//! Earlier designs in this lineage used a general-purpose MPMC queue with a
//! dummy sentinel node and per-push/pop node allocation (see `DESIGN.md`).
//! That's unnecessary here: every pointer in this queue is, by definition,
//! already free, so the node can be the freed block itself — its first
//! machine word becomes the `next` link. This also sidesteps the obvious
//! reentrancy problem of allocating queue nodes from inside the allocator.

use core::ptr;
use core::sync::atomic::{AtomicPtr, Ordering};

#[repr(C)]
struct Node {
    next: *mut Node,
}

pub struct DeferredQueue {
    head: AtomicPtr<Node>,
}

impl DeferredQueue {
    pub const fn new() -> Self {
        Self {
            head: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Pushes `ptr` (a block being freed cross-thread) onto the queue.
    ///
    /// # Safety
    /// `ptr` must point to at least `size_of::<*mut u8>()` writable bytes
    /// that the caller no longer touches until the owner drains it back out.
    pub unsafe fn push(&self, ptr: *mut u8) {
        let node = ptr as *mut Node;
        let mut head = self.head.load(Ordering::Relaxed);
        loop {
            unsafe {
                (*node).next = head;
            }
            match self
                .head
                .compare_exchange_weak(head, node, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => break,
                Err(actual) => head = actual,
            }
        }
    }

    /// Atomically takes the whole queue and hands each pointer to `consume`.
    ///
    /// The chain is first reversed in place — walking `next` links only,
    /// never touching a node's contents beyond that one field — so that by
    /// the time any node reaches `consume` (which is free to overwrite the
    /// node's storage, e.g. by reinserting it into a page's free list) every
    /// other link has already been read. A recursive walk would give the
    /// same ordering but blow the stack on a long-lived thread whose queue
    /// has accumulated a large batch of cross-thread frees; the reversal
    /// below is the same two-phase shape without the recursion depth.
    pub fn drain(&self, mut consume: impl FnMut(*mut u8)) {
        let mut node = self.head.swap(ptr::null_mut(), Ordering::AcqRel);
        let mut reversed = ptr::null_mut();
        while !node.is_null() {
            let next = unsafe { (*node).next };
            unsafe { (*node).next = reversed };
            reversed = node;
            node = next;
        }

        let mut node = reversed;
        while !node.is_null() {
            let next = unsafe { (*node).next };
            consume(node as *mut u8);
            node = next;
        }
    }
}
