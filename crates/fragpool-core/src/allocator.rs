//! Tiered allocation facade.
//!
//! Routes requests between the size-classed pools, the bump region, and the
//! general heap, and routes deallocations back by probing which tier owns
//! the pointer. The pointer is the only routing input — no tag is stored
//! per allocation.

use std::fmt;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::pool_set::{PoolInitError, PoolSet};
use crate::region::BumpRegion;
use crate::size_class::round_up_word;

/// Placement requested for an allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocStrategy {
    /// Route through the size-classed pools; heap on miss.
    SizeClassed,
    /// Bump-allocate from the region; heap on exhaustion.
    ArenaDirect,
    /// Straight to the general heap.
    Heap,
}

impl AllocStrategy {
    /// Stable label used in trace records.
    pub fn label(self) -> &'static str {
        match self {
            Self::SizeClassed => "size_classed",
            Self::ArenaDirect => "arena_direct",
            Self::Heap => "heap",
        }
    }
}

/// One structured record per allocation while tracing is enabled.
///
/// Field content is the diagnostic contract; the `Display` rendering is
/// not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocTrace {
    /// Strategy the caller requested.
    pub strategy: AllocStrategy,
    /// Size the caller asked for.
    pub requested: usize,
    /// Size after word rounding.
    pub rounded: usize,
    /// Resulting address, `None` when even the heap failed.
    pub addr: Option<usize>,
    /// Whether a specialized tier missed and the heap served the request.
    pub heap_fallback: bool,
}

impl fmt::Display for AllocTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "alloc strategy={} size={:5}b ",
            self.strategy.label(),
            self.requested
        )?;
        match self.addr {
            Some(addr) => write!(f, "{addr:#010x} succeeded")?,
            None => f.write_str("failed")?,
        }
        if self.heap_fallback {
            f.write_str(" (fallback on heap)")?;
        }
        Ok(())
    }
}

/// Three-tier allocator over a fixed byte region.
///
/// The bump path is lock-free and safe for concurrent callers. The pool set
/// performs no internal synchronization, so the facade holds it behind a
/// mutex — that mutex is the external serialization the size-classed tier's
/// contract demands. The heap tier inherits libc's thread safety.
pub struct FragPool {
    region: BumpRegion,
    pools: Mutex<Option<PoolSet>>,
    released: AtomicBool,
    tracing: AtomicBool,
    traces: Mutex<Vec<AllocTrace>>,
}

impl FragPool {
    /// Wraps an already-built region (static or heap backed).
    pub fn new(region: BumpRegion) -> Self {
        Self {
            region,
            pools: Mutex::new(None),
            released: AtomicBool::new(false),
            tracing: AtomicBool::new(false),
            traces: Mutex::new(Vec::new()),
        }
    }

    /// Heap-backed convenience constructor.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(BumpRegion::with_capacity(capacity))
    }

    /// Builds the size-classed pools, carving their slabs from the region.
    ///
    /// Must run before the first size-classed allocation and at most once.
    pub fn init(&self, block_counts: &[u32]) -> Result<(), PoolInitError> {
        if self.released.load(Ordering::Acquire) {
            return Err(PoolInitError::Released);
        }
        let mut pools = self.pools.lock();
        if pools.is_some() {
            return Err(PoolInitError::AlreadyInitialized);
        }
        *pools = Some(PoolSet::carve(&self.region, block_counts)?);
        Ok(())
    }

    /// Tears down the pool set.
    ///
    /// Must be the last lifecycle operation: afterwards only heap
    /// allocation and deallocation remain valid, and in-region pointers are
    /// no longer probed. Calling it again is a no-op.
    pub fn release(&self) {
        self.released.store(true, Ordering::Release);
        let mut pools = self.pools.lock();
        if let Some(mut set) = pools.take() {
            set.release();
        }
    }

    /// Allocates `bytes` with the requested placement.
    ///
    /// Exhaustion of a specialized tier silently falls back to the heap;
    /// `None` is returned only when the heap itself is out of memory.
    pub fn alloc(&self, bytes: usize, strategy: AllocStrategy) -> Option<NonNull<u8>> {
        let rounded = round_up_word(bytes);
        let mut ptr = match strategy {
            AllocStrategy::SizeClassed => self
                .pools
                .lock()
                .as_mut()
                .and_then(|set| set.alloc(rounded)),
            AllocStrategy::ArenaDirect => self.region.reserve(rounded),
            AllocStrategy::Heap => None,
        };
        let heap_fallback = ptr.is_none() && strategy != AllocStrategy::Heap;
        if ptr.is_none() {
            // SAFETY: plain libc allocation; a null result is handled by the
            // NonNull conversion.
            ptr = NonNull::new(unsafe { libc::malloc(rounded) }.cast::<u8>());
        }
        if self.tracing.load(Ordering::Relaxed) {
            self.traces.lock().push(AllocTrace {
                strategy,
                requested: bytes,
                rounded,
                addr: ptr.map(|p| p.as_ptr() as usize),
                heap_fallback,
            });
        }
        ptr
    }

    /// Returns `ptr` to whichever tier produced it, determined from the
    /// address alone.
    ///
    /// In-region pointers are offered to the pool set (unless released).
    /// An unclaimed in-region pointer was bump-allocated and stays reserved
    /// until the whole region goes away — deliberately so, since the
    /// arena-direct path serves short-lived startup structures. Everything
    /// outside the region is forwarded to the heap free; handing this
    /// method a pointer that came from neither tier is a caller contract
    /// violation.
    pub fn dealloc(&self, ptr: NonNull<u8>) {
        let addr = ptr.as_ptr() as usize;
        if self.region.contains(addr) {
            if !self.released.load(Ordering::Acquire) {
                if let Some(set) = self.pools.lock().as_mut() {
                    if set.dealloc(ptr) {
                        return;
                    }
                }
            }
            // Bump-allocated: reserved until the region is torn down.
        } else {
            // SAFETY: non-region pointers come from the heap tier per the
            // caller contract.
            unsafe { libc::free(ptr.as_ptr().cast()) };
        }
    }

    /// Enables or disables per-allocation trace records.
    pub fn set_tracing(&self, enabled: bool) {
        self.tracing.store(enabled, Ordering::Relaxed);
    }

    /// Snapshot of the trace records collected so far.
    pub fn traces(&self) -> Vec<AllocTrace> {
        self.traces.lock().clone()
    }

    /// Drains and returns the collected trace records.
    pub fn drain_traces(&self) -> Vec<AllocTrace> {
        std::mem::take(&mut *self.traces.lock())
    }

    /// True when `addr` falls inside the backing region.
    pub fn contains(&self, addr: usize) -> bool {
        self.region.contains(addr)
    }

    /// Region bytes reserved so far (pool slabs plus arena-direct).
    pub fn used(&self) -> usize {
        self.region.used()
    }

    /// Region bytes still available.
    pub fn remaining(&self) -> usize {
        self.region.remaining()
    }

    /// Total region capacity.
    pub fn capacity(&self) -> usize {
        self.region.capacity()
    }

    /// True once `init` has built the pool set and `release` has not torn
    /// it down.
    pub fn is_initialized(&self) -> bool {
        self.pools.lock().is_some()
    }

    /// True once `release` has run.
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Free blocks currently available in `class`, if configured.
    pub fn class_free_count(&self, class: usize) -> Option<u32> {
        self.pools
            .lock()
            .as_ref()?
            .pool(class)
            .map(|pool| pool.free_count())
    }
}
