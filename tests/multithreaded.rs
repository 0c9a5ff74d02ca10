//! Multithreaded integration tests: cross-thread frees, concurrent
//! allocation/deallocation churn, and thread-exit page reclamation, all
//! driven through the registered global allocator.

use pagemalloc::PageMalloc;
use std::sync::Arc;

#[global_allocator]
static GLOBAL: PageMalloc = PageMalloc;

#[test]
fn test_multithreaded_alloc() {
    let num_threads = 8;
    let iterations = 1000;

    let handles: Vec<_> = (0..num_threads)
        .map(|t| {
            std::thread::spawn(move || {
                let mut vecs: Vec<Vec<u64>> = Vec::new();
                for i in 0..iterations {
                    let v: Vec<u64> = (0..50).map(|x| x + t * iterations + i).collect();
                    vecs.push(v);
                    if vecs.len() > 10 {
                        vecs.remove(0);
                    }
                }
                vecs.len()
            })
        })
        .collect();

    for h in handles {
        let result = h.join().unwrap();
        assert!(result > 0);
    }
}

#[test]
fn test_cross_thread_free() {
    // Allocate on one thread, free on another: every page handed out here
    // gets its blocks returned through the deferred queue instead of the
    // owning thread's local free path.
    let num_threads = 4;
    let items_per_thread = 500;

    let (tx, rx) = std::sync::mpsc::channel::<Vec<Box<[u8; 64]>>>();

    let producers: Vec<_> = (0..num_threads)
        .map(|_| {
            let tx = tx.clone();
            std::thread::spawn(move || {
                let items: Vec<Box<[u8; 64]>> = (0..items_per_thread)
                    .map(|i| {
                        let mut arr = [0u8; 64];
                        arr[0] = (i & 0xFF) as u8;
                        Box::new(arr)
                    })
                    .collect();
                tx.send(items).unwrap();
            })
        })
        .collect();

    drop(tx);

    let mut total = 0;
    for items in rx {
        total += items.len();
        drop(items);
    }

    for p in producers {
        p.join().unwrap();
    }

    assert_eq!(total, num_threads * items_per_thread);
}

#[test]
fn test_arc_shared() {
    let data = Arc::new(vec![1u64, 2, 3, 4, 5]);
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let data = Arc::clone(&data);
            std::thread::spawn(move || {
                assert_eq!(data.len(), 5);
                assert_eq!(data[2], 3);
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }
}

#[test]
fn test_mixed_sizes_multithreaded() {
    let handles: Vec<_> = (0..4)
        .map(|_| {
            std::thread::spawn(|| {
                let mut allocs: Vec<Box<dyn std::any::Any>> = Vec::new();
                for i in 0..200 {
                    match i % 5 {
                        0 => allocs.push(Box::new([0u8; 8])),
                        1 => allocs.push(Box::new([0u8; 64])),
                        2 => allocs.push(Box::new([0u8; 512])),
                        3 => allocs.push(Box::new([0u8; 4096])),
                        _ => allocs.push(Box::new(vec![0u8; 16384])),
                    }
                    if allocs.len() > 50 {
                        allocs.drain(..25);
                    }
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }
}

#[test]
fn test_thread_exit_reclaims_pages_for_reuse() {
    // Spawn and join threads repeatedly so each join runs
    // ThreadHeap::on_thread_exit, returning pages to the central heap for
    // the next round's threads to refill from.
    for round in 0..20 {
        let handle = std::thread::spawn(move || {
            let mut v = Vec::new();
            for i in 0..64usize {
                v.push(Box::new([(round + i) as u8; 64]));
            }
            v.len()
        });
        assert_eq!(handle.join().unwrap(), 64);
    }
}

#[test]
fn test_producer_consumer_pool_of_buffers() {
    let (tx, rx) = std::sync::mpsc::sync_channel::<Box<[u8; 4096]>>(4);
    let rx = std::sync::Mutex::new(rx);

    std::thread::scope(|scope| {
        for p in 0..4u8 {
            let tx = tx.clone();
            scope.spawn(move || {
                for i in 0..50u8 {
                    let buf = Box::new([p.wrapping_mul(50).wrapping_add(i); 4096]);
                    tx.send(buf).unwrap();
                }
            });
        }
        drop(tx);

        scope.spawn(|| {
            let mut count = 0;
            while let Ok(buf) = rx.lock().unwrap().recv() {
                assert_eq!(buf.len(), 4096);
                count += 1;
            }
            assert_eq!(count, 200);
        });
    });
}

#[cfg(feature = "stats")]
#[test]
fn test_stats_reflect_concurrent_activity() {
    let before = pagemalloc::stats::snapshot();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            std::thread::spawn(|| {
                for _ in 0..100 {
                    let b = Box::new([0u8; 64]);
                    drop(b);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let after = pagemalloc::stats::snapshot();
    assert!(after.alloc_count >= before.alloc_count + 800);
    assert!(after.dealloc_count >= before.dealloc_count + 800);
}
