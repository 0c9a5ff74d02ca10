//! Compile-time configuration constants shared across the allocator.
//!
//! These mirror the fixed constants a C++ allocator of this lineage would
//! keep in a single header (`ServerConfig.h` in the codebase this design is
//! descended from): page geometry, the small-object ceiling, and the bound
//! on tracked threads.

/// log2(PAGE_SIZE). Pages are 16 KiB, matching the size class table's
/// largest class times enough headroom for the page header.
pub const PAGE_SHIFT: u32 = 14;

/// Size, in bytes, of one page handed between the central heap and a thread
/// heap. Every page is mapped at an address aligned to this value, which is
/// what lets `deallocate` recover a page from a block pointer by masking.
pub const PAGE_SIZE: usize = 1 << PAGE_SHIFT;

/// Granularity of the small-object size classes, and the natural alignment
/// every small allocation receives.
pub const POOL_ALIGNMENT: usize = 8;

/// Largest request size routed through the thread-heap/central-heap path.
/// Anything larger goes through the large-object path.
pub const MAX_SMALL_OBJECT_SIZE: usize = 256;

/// Upper bound on the number of distinct OS threads the debug leak tracker
/// can shard by without id aliasing. Does not bound how many threads the
/// allocator itself can serve; only the diagnostic tracker degrades past it.
pub const MAX_THREADS: usize = 256;

/// Number of pages the central heap mmaps at once when a size class runs dry.
pub const PAGES_PER_BATCH: usize = 16;
