//! End-to-end routing scenarios: size-classed round trips, heap fallback on
//! exhaustion, post-release behavior, and a deterministic churn sequence
//! that cross-checks pool accounting against the caller's view.

use std::collections::HashSet;
use std::ptr::NonNull;

use fragpool_core::{AllocStrategy, FragPool, PoolInitError};

#[derive(Clone, Copy, Debug)]
struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    fn gen_range(&mut self, low: usize, high_inclusive: usize) -> usize {
        assert!(low <= high_inclusive);
        let span = high_inclusive - low + 1;
        low + (self.next_u64() as usize % span)
    }
}

#[test]
fn six_byte_requests_round_trip_through_the_eight_byte_class() {
    let pool = FragPool::with_capacity(1024);
    pool.init(&[4, 4, 2]).expect("init");
    pool.set_tracing(true);

    // Four 6-byte requests fill the 8-byte class (class 1).
    let mut ptrs = Vec::new();
    for _ in 0..4 {
        let ptr = pool.alloc(6, AllocStrategy::SizeClassed).expect("alloc");
        assert!(pool.contains(ptr.as_ptr() as usize));
        ptrs.push(ptr);
    }
    assert_eq!(pool.class_free_count(1), Some(0));
    assert_eq!(pool.class_free_count(0), Some(4), "class 0 untouched");
    assert_eq!(pool.class_free_count(2), Some(2), "class 2 untouched");

    // The fifth exceeds the class capacity and falls back to the heap.
    let overflow = pool.alloc(6, AllocStrategy::SizeClassed).expect("fallback");
    assert!(!pool.contains(overflow.as_ptr() as usize));

    let traces = pool.drain_traces();
    assert_eq!(traces.len(), 5);
    for trace in &traces[..4] {
        assert_eq!(trace.rounded, 8);
        assert!(!trace.heap_fallback);
    }
    assert!(traces[4].heap_fallback, "overflow must be flagged");

    pool.dealloc(overflow);
    for ptr in ptrs {
        pool.dealloc(ptr);
    }
    assert_eq!(pool.class_free_count(1), Some(4));
}

#[test]
fn oversized_arena_direct_request_leaves_the_cursor_unmoved() {
    let pool = FragPool::with_capacity(16);
    pool.set_tracing(true);

    let ptr = pool.alloc(20, AllocStrategy::ArenaDirect).expect("fallback");
    assert!(!pool.contains(ptr.as_ptr() as usize));
    assert_eq!(pool.used(), 0, "no partial reservation");

    let traces = pool.drain_traces();
    assert_eq!(traces.len(), 1);
    assert_eq!(traces[0].strategy, AllocStrategy::ArenaDirect);
    assert!(traces[0].heap_fallback);

    pool.dealloc(ptr);
}

#[test]
fn released_allocator_stops_probing_the_pools() {
    let pool = FragPool::with_capacity(1024);
    pool.init(&[4, 4]).expect("init");

    let ptr = pool.alloc(8, AllocStrategy::SizeClassed).expect("alloc");
    assert!(pool.contains(ptr.as_ptr() as usize));

    pool.release();
    assert!(pool.is_released());
    assert!(!pool.is_initialized());

    // The call completes quietly; the block is not returned to any pool.
    pool.dealloc(ptr);
    assert_eq!(pool.class_free_count(1), None);

    // Size-classed requests now go straight to the heap.
    let late = pool.alloc(8, AllocStrategy::SizeClassed).expect("heap");
    assert!(!pool.contains(late.as_ptr() as usize));
    pool.dealloc(late);
}

#[test]
fn init_must_fit_the_region() {
    let pool = FragPool::with_capacity(32);
    let err = pool.init(&[4, 4]).expect_err("table too large for region");
    assert!(matches!(err, PoolInitError::RegionExhausted { .. }));
}

#[test]
fn churn_keeps_pool_accounting_consistent() {
    const CLASS_COUNTS: [u32; 5] = [16, 16, 16, 16, 16];
    const OPS: usize = 2000;

    let pool = FragPool::with_capacity(64 * 1024);
    pool.init(&CLASS_COUNTS).expect("init");

    let mut rng = XorShift64::new(0xA5A5_5A5A_DEAD_BEEF);
    let mut live: Vec<NonNull<u8>> = Vec::new();
    let mut seen_fallback = false;

    for _ in 0..OPS {
        if rng.next_u64() % 3 != 0 || live.is_empty() {
            let size = rng.gen_range(1, 64);
            let ptr = pool
                .alloc(size, AllocStrategy::SizeClassed)
                .expect("heap never exhausts in this test");
            seen_fallback |= !pool.contains(ptr.as_ptr() as usize);
            live.push(ptr);
        } else {
            let idx = rng.gen_range(0, live.len() - 1);
            let ptr = live.swap_remove(idx);
            pool.dealloc(ptr);
        }

        // Blocks checked out of the pools must equal the caller's live
        // in-region pointers.
        let checked_out: u32 = (0..CLASS_COUNTS.len())
            .map(|class| {
                let free = pool.class_free_count(class).expect("class exists");
                CLASS_COUNTS[class] - free
            })
            .sum();
        let live_in_region = live
            .iter()
            .filter(|p| pool.contains(p.as_ptr() as usize))
            .count();
        assert_eq!(checked_out as usize, live_in_region);
    }

    assert!(
        seen_fallback,
        "churn should overflow at least one class into the heap"
    );

    // Draining everything restores every class to full capacity.
    for ptr in live.drain(..) {
        pool.dealloc(ptr);
    }
    for (class, &count) in CLASS_COUNTS.iter().enumerate() {
        assert_eq!(pool.class_free_count(class), Some(count));
    }
}

#[test]
fn reused_blocks_come_back_as_the_same_address_set() {
    let pool = FragPool::with_capacity(4096);
    pool.init(&[8, 8]).expect("init");

    let first: Vec<NonNull<u8>> = (0..8)
        .map(|_| pool.alloc(8, AllocStrategy::SizeClassed).expect("alloc"))
        .collect();
    let first_addrs: HashSet<usize> = first.iter().map(|p| p.as_ptr() as usize).collect();
    assert_eq!(first_addrs.len(), 8, "addresses must be distinct");

    for ptr in first {
        pool.dealloc(ptr);
    }
    let second_addrs: HashSet<usize> = (0..8)
        .map(|_| {
            pool.alloc(8, AllocStrategy::SizeClassed)
                .expect("realloc")
                .as_ptr() as usize
        })
        .collect();
    assert_eq!(first_addrs, second_addrs);
}
