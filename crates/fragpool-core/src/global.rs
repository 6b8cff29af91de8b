//! Process-wide allocator instance.
//!
//! The backing region is plain static storage, zero-initialized at load
//! time, so it is usable before any other static state is constructed and
//! independent of static initialization order. The pool set is the only
//! part that needs real construction, gated behind the explicit one-time
//! [`init_global`] call.

use std::sync::OnceLock;

use crate::allocator::FragPool;
use crate::pool_set::PoolInitError;
use crate::region::RegionStorage;

/// Capacity of the process-wide region.
pub const GLOBAL_REGION_CAPACITY: usize = 1024 * 1024;

/// Default per-class block counts for the process-wide instance: classes
/// 4 through 8192 bytes, weighted toward the small classes that dominate
/// latency-sensitive churn. Together the slabs take under half the region,
/// leaving the rest for arena-direct reservations.
pub const DEFAULT_BLOCK_COUNTS: [u32; 12] =
    [512, 512, 256, 256, 128, 128, 64, 64, 32, 32, 16, 16];

static GLOBAL_STORAGE: RegionStorage<GLOBAL_REGION_CAPACITY> = RegionStorage::new();
static GLOBAL: OnceLock<FragPool> = OnceLock::new();

/// The process-wide allocator.
pub fn global() -> &'static FragPool {
    GLOBAL.get_or_init(|| {
        let region = GLOBAL_STORAGE
            .claim()
            .expect("global region storage is claimed exactly once");
        FragPool::new(region)
    })
}

/// Builds the process-wide pool set. Call once, before the first
/// size-classed allocation.
pub fn init_global(block_counts: &[u32]) -> Result<(), PoolInitError> {
    global().init(block_counts)
}

/// [`init_global`] with the default class table.
pub fn init_default() -> Result<(), PoolInitError> {
    init_global(&DEFAULT_BLOCK_COUNTS)
}

/// Tears down the process-wide pool set. After this only heap allocation
/// and deallocation remain valid on the global instance.
pub fn release_global() {
    global().release();
}
