//! # fragpool
//!
//! Deterministic three-tier memory allocator for latency-sensitive and
//! early-lifetime contexts: fixed-block pools with intrusive free lists, a
//! size-classed pool set spanning a logarithmic range, and a lock-free bump
//! arena that backs the pools' storage and falls back to the general heap
//! when its fixed capacity runs out.
//!
//! Deallocation needs only the pointer: each tier answers ownership from
//! its address range, so allocations carry zero metadata.

pub mod allocator;
pub mod block_pool;
pub mod global;
pub mod pool_set;
pub mod region;
pub mod size_class;

pub use allocator::{AllocStrategy, AllocTrace, FragPool};
pub use block_pool::BlockPool;
pub use global::{
    DEFAULT_BLOCK_COUNTS, GLOBAL_REGION_CAPACITY, global, init_default, init_global,
    release_global,
};
pub use pool_set::{MAX_CLASSES, PoolInitError, PoolSet};
pub use region::{BumpRegion, REGION_ALIGN, RegionStorage};
