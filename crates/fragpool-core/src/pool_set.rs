//! Ordered set of block pools spanning a logarithmic size range.
//!
//! Pool `i` holds `4 << i`-byte blocks, so the set covers 4, 8, 16, …
//! bytes with no gaps. Requests route to the smallest class that covers
//! them; deallocations route back by probing which pool's slab contains
//! the address.

use std::ptr::NonNull;

use thiserror::Error;

use crate::block_pool::BlockPool;
use crate::region::BumpRegion;
use crate::size_class::{class_index, class_size, round_up_word};

/// Upper bound on configured classes. The largest class is then
/// `4 << (MAX_CLASSES - 1)` bytes, far beyond any size the pools are meant
/// to serve.
pub const MAX_CLASSES: usize = 24;

/// Failure to build the pool set or the facade around it.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolInitError {
    /// The region cannot back another slab.
    #[error(
        "region exhausted while carving pool storage: needed {needed} bytes, {remaining} remaining"
    )]
    RegionExhausted { needed: usize, remaining: usize },
    /// The block-count table was empty.
    #[error("no size classes configured")]
    NoClasses,
    /// The block-count table names more classes than supported.
    #[error("too many size classes: {count} (max {max})", max = MAX_CLASSES)]
    TooManyClasses { count: usize },
    /// The pool set was already built.
    #[error("pool set already initialized")]
    AlreadyInitialized,
    /// The allocator was already released.
    #[error("allocator already released")]
    Released,
}

/// Block pools with power-of-two sizes, one per size class.
///
/// Unsynchronized like the pools it owns; the facade serializes access.
#[derive(Debug)]
pub struct PoolSet {
    pools: Vec<BlockPool>,
}

impl PoolSet {
    /// Builds one pool per entry in `block_counts`, class sizes doubling
    /// from 4 bytes, every slab carved from `region`.
    ///
    /// The slabs physically live inside the region's byte range; that is
    /// what lets the facade answer "does a pool own this pointer" from the
    /// address alone. A region too small for the configured table is an
    /// error, never a silently heap-backed slab.
    pub fn carve(region: &BumpRegion, block_counts: &[u32]) -> Result<Self, PoolInitError> {
        if block_counts.is_empty() {
            return Err(PoolInitError::NoClasses);
        }
        if block_counts.len() > MAX_CLASSES {
            return Err(PoolInitError::TooManyClasses {
                count: block_counts.len(),
            });
        }
        let mut pools = Vec::with_capacity(block_counts.len());
        for (class, &count) in block_counts.iter().enumerate() {
            let size = class_size(class);
            let pool = BlockPool::carve(region, size as u32, count).ok_or_else(|| {
                PoolInitError::RegionExhausted {
                    needed: size * count as usize,
                    remaining: region.remaining(),
                }
            })?;
            pools.push(pool);
        }
        Ok(Self { pools })
    }

    /// Routes a request to its size class. `None` when the size exceeds the
    /// largest configured class or that class's pool is exhausted.
    pub fn alloc(&mut self, size: usize) -> Option<NonNull<u8>> {
        let class = class_index(round_up_word(size));
        self.pools.get_mut(class)?.alloc()
    }

    /// Returns the block to whichever pool owns the address.
    ///
    /// Linear probe over the pools: the class count is small and bounded,
    /// so this stays O(pool count). `false` when no pool claims the
    /// pointer.
    pub fn dealloc(&mut self, ptr: NonNull<u8>) -> bool {
        let addr = ptr.as_ptr() as usize;
        for pool in &mut self.pools {
            if pool.owns(addr) {
                pool.dealloc(ptr);
                return true;
            }
        }
        false
    }

    /// Releases every pool.
    pub fn release(&mut self) {
        for pool in &mut self.pools {
            pool.release();
        }
        self.pools.clear();
    }

    /// Number of configured classes.
    pub fn len(&self) -> usize {
        self.pools.len()
    }

    /// True when no classes are configured.
    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    /// The pool serving `class`, if configured.
    pub fn pool(&self, class: usize) -> Option<&BlockPool> {
        self.pools.get(class)
    }
}
