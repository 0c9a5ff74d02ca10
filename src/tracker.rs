//! Debug leak tracker: records every live allocation's size and call site,
//! sharded by thread id, for a shutdown-time leak report.
//!
//! Compiled in only under the `debug` feature. Every call here happens
//! underneath the facade's re-entrancy guard, so the map's own allocations
//! (a `BTreeMap` insert may allocate) are routed straight to the platform
//! allocator instead of recursing back into this crate.

use crate::config::MAX_THREADS;
use crate::sync::SpinMutex;
use std::collections::BTreeMap;

#[derive(Clone, Copy)]
pub struct AllocationInfo {
    pub size: usize,
    pub file: &'static str,
    pub line: u32,
}

pub struct LeakReport {
    pub ptr: usize,
    pub size: usize,
    pub file: &'static str,
    pub line: u32,
}

struct Shard {
    entries: BTreeMap<usize, AllocationInfo>,
}

pub struct MemoryTracker {
    shards: Vec<SpinMutex<Shard>>,
}

impl MemoryTracker {
    pub fn new() -> Self {
        let mut shards = Vec::with_capacity(MAX_THREADS);
        for _ in 0..MAX_THREADS {
            shards.push(SpinMutex::new(Shard {
                entries: BTreeMap::new(),
            }));
        }
        Self { shards }
    }

    fn shard(&self, thread_id: u32) -> &SpinMutex<Shard> {
        &self.shards[thread_id as usize % MAX_THREADS]
    }

    pub fn track(&self, thread_id: u32, ptr: *mut u8, size: usize, file: &'static str, line: u32) {
        let mut shard = self.shard(thread_id).lock();
        shard
            .entries
            .insert(ptr as usize, AllocationInfo { size, file, line });
    }

    pub fn untrack(&self, thread_id: u32, ptr: *mut u8) {
        let mut shard = self.shard(thread_id).lock();
        shard.entries.remove(&(ptr as usize));
    }

    pub fn report_leaks(&self) -> Vec<LeakReport> {
        let mut out = Vec::new();
        for shard in &self.shards {
            let shard = shard.lock();
            for (&ptr, info) in &shard.entries {
                out.push(LeakReport {
                    ptr,
                    size: info.size,
                    file: info.file,
                    line: info.line,
                });
            }
        }
        out
    }
}
