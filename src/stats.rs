//! Atomic allocation counters and a coarse size histogram, read out through
//! [`snapshot`]. Compiled in only under the `stats` feature; every update is
//! a `Relaxed` fetch-add — nothing here is load-bearing for correctness,
//! only for observability, so there is no reason to pay for a stronger
//! ordering on the hot path.

use core::sync::atomic::{AtomicU64, Ordering};

/// One bucket per power-of-two size band, from 1 B up to 128 KiB and above
/// (the last bucket catches everything bigger).
const NUM_BUCKETS: usize = 18;

static ALLOC_COUNT: AtomicU64 = AtomicU64::new(0);
static DEALLOC_COUNT: AtomicU64 = AtomicU64::new(0);
static REALLOC_COUNT: AtomicU64 = AtomicU64::new(0);
static ALLOC_BYTES: AtomicU64 = AtomicU64::new(0);
static THREAD_CACHE_HITS: AtomicU64 = AtomicU64::new(0);
static THREAD_CACHE_MISSES: AtomicU64 = AtomicU64::new(0);
static HISTOGRAM: [AtomicU64; NUM_BUCKETS] = [const { AtomicU64::new(0) }; NUM_BUCKETS];

fn bucket_for(size: usize) -> usize {
    let size = size.max(1);
    let bucket = usize::BITS - size.next_power_of_two().leading_zeros() - 1;
    (bucket as usize).min(NUM_BUCKETS - 1)
}

pub(crate) fn record_alloc(size: usize) {
    ALLOC_COUNT.fetch_add(1, Ordering::Relaxed);
    ALLOC_BYTES.fetch_add(size as u64, Ordering::Relaxed);
    HISTOGRAM[bucket_for(size)].fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_dealloc() {
    DEALLOC_COUNT.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_realloc() {
    REALLOC_COUNT.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_thread_cache_hit() {
    THREAD_CACHE_HITS.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_thread_cache_miss() {
    THREAD_CACHE_MISSES.fetch_add(1, Ordering::Relaxed);
}

/// A point-in-time read of every counter. Not atomic as a whole — no
/// cross-counter consistency is promised, matching every other
/// relaxed-counters stats module in this lineage.
#[derive(Clone, Copy, Debug, Default)]
pub struct StatsSnapshot {
    pub alloc_count: u64,
    pub dealloc_count: u64,
    pub realloc_count: u64,
    pub alloc_bytes: u64,
    pub thread_cache_hits: u64,
    pub thread_cache_misses: u64,
    pub histogram: [u64; NUM_BUCKETS],
}

pub fn snapshot() -> StatsSnapshot {
    let mut histogram = [0u64; NUM_BUCKETS];
    for (slot, counter) in histogram.iter_mut().zip(HISTOGRAM.iter()) {
        *slot = counter.load(Ordering::Relaxed);
    }
    StatsSnapshot {
        alloc_count: ALLOC_COUNT.load(Ordering::Relaxed),
        dealloc_count: DEALLOC_COUNT.load(Ordering::Relaxed),
        realloc_count: REALLOC_COUNT.load(Ordering::Relaxed),
        alloc_bytes: ALLOC_BYTES.load(Ordering::Relaxed),
        thread_cache_hits: THREAD_CACHE_HITS.load(Ordering::Relaxed),
        thread_cache_misses: THREAD_CACHE_MISSES.load(Ordering::Relaxed),
        histogram,
    }
}
