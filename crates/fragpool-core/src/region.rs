//! Fixed-capacity byte region with a lock-free bump cursor.
//!
//! The region is the backing store for the whole allocator: pool slabs are
//! carved out of it at init time, and arena-direct allocations advance the
//! same cursor afterwards. The cursor only moves forward; individual
//! reservations are never returned. Reservation is a compare-and-swap retry
//! loop, so concurrent callers share a region without blocking.

use std::alloc::Layout;
use std::cell::UnsafeCell;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Minimum alignment of a region base. Covers the word-sized free-list
/// links and keeps every word-rounded reservation word-aligned.
pub const REGION_ALIGN: usize = 8;

/// Statically allocated region backing.
///
/// Zero-initialized at load time, so the backing is usable before any other
/// static state is constructed. [`claim`](Self::claim) hands the buffer out
/// at most once; a second claim returns `None` instead of aliasing it.
#[repr(align(8))]
pub struct RegionStorage<const N: usize> {
    bytes: UnsafeCell<[u8; N]>,
    claimed: AtomicBool,
}

// SAFETY: the buffer is only reachable through the single claimed
// `BumpRegion`, which hands out disjoint ranges via its atomic cursor.
unsafe impl<const N: usize> Sync for RegionStorage<N> {}

impl<const N: usize> RegionStorage<N> {
    /// Creates zeroed storage. Const, so usable as a `static` initializer.
    pub const fn new() -> Self {
        Self {
            bytes: UnsafeCell::new([0; N]),
            claimed: AtomicBool::new(false),
        }
    }

    /// Claims the backing for a region. Returns `None` when the storage was
    /// already claimed.
    pub fn claim(&'static self) -> Option<BumpRegion> {
        if self
            .claimed
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return None;
        }
        // SAFETY: a static is never null, and the claim flag guarantees this
        // is the only region ever built over the buffer.
        let base = unsafe { NonNull::new_unchecked(self.bytes.get().cast::<u8>()) };
        Some(BumpRegion {
            base,
            capacity: N,
            cursor: AtomicUsize::new(0),
            owned: None,
        })
    }
}

impl<const N: usize> Default for RegionStorage<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed byte region with a monotonically advancing cursor.
pub struct BumpRegion {
    base: NonNull<u8>,
    capacity: usize,
    /// Next free byte offset. Never decreases.
    cursor: AtomicUsize,
    /// Layout of heap-allocated backing, `None` for static storage.
    owned: Option<Layout>,
}

// SAFETY: reservations are handed out through the atomic cursor, so distinct
// callers never observe overlapping ranges.
unsafe impl Send for BumpRegion {}
unsafe impl Sync for BumpRegion {}

impl BumpRegion {
    /// Creates a heap-backed region. The backing is allocated once here and
    /// released exactly once on drop.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "region capacity must be non-zero");
        let layout = Layout::from_size_align(capacity, REGION_ALIGN).expect("region layout");
        // SAFETY: layout has non-zero size.
        let raw = unsafe { std::alloc::alloc_zeroed(layout) };
        let Some(base) = NonNull::new(raw) else {
            std::alloc::handle_alloc_error(layout);
        };
        Self {
            base,
            capacity,
            cursor: AtomicUsize::new(0),
            owned: Some(layout),
        }
    }

    /// Attempts to reserve `bytes` from the region.
    ///
    /// Lock-free: read the cursor, compute the candidate end, and publish it
    /// with a compare-and-swap. A failed exchange means another caller moved
    /// the cursor first; the attempt retries from the newly observed value,
    /// so every failure implies someone else made progress. On success the
    /// caller exclusively owns the returned range: the cursor never rewinds,
    /// so no later reservation can overlap it. Exhaustion aborts with no
    /// partial cursor movement.
    pub fn reserve(&self, bytes: usize) -> Option<NonNull<u8>> {
        let mut observed = self.cursor.load(Ordering::Relaxed);
        loop {
            let candidate = observed.checked_add(bytes)?;
            if candidate > self.capacity {
                return None;
            }
            match self.cursor.compare_exchange_weak(
                observed,
                candidate,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    // SAFETY: `observed < candidate <= capacity`, so the
                    // offset stays inside the backing allocation.
                    return Some(unsafe {
                        NonNull::new_unchecked(self.base.as_ptr().add(observed))
                    });
                }
                Err(current) => observed = current,
            }
        }
    }

    /// True when `addr` falls inside the region's byte range.
    pub fn contains(&self, addr: usize) -> bool {
        let base = self.base.as_ptr() as usize;
        addr >= base && addr < base + self.capacity
    }

    /// Total capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes reserved so far.
    pub fn used(&self) -> usize {
        self.cursor.load(Ordering::Relaxed)
    }

    /// Bytes still available for reservation.
    pub fn remaining(&self) -> usize {
        self.capacity - self.used()
    }
}

impl Drop for BumpRegion {
    fn drop(&mut self) {
        if let Some(layout) = self.owned {
            // SAFETY: `base` was allocated in `with_capacity` with this
            // exact layout and is released exactly once here.
            unsafe { std::alloc::dealloc(self.base.as_ptr(), layout) };
        }
    }
}
