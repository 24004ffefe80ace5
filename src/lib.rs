//! A lock-free sorted set built on a Harris-style marked linked list, with
//! pluggable safe memory reclamation (epochs or hazard pointers).
//!
//! ```
//! use lfset::{EpochSet, InsertOutcome, RemoveOutcome};
//!
//! let set = EpochSet::<u64, &str>::new();
//! let handle = set.register().unwrap();
//!
//! assert_eq!(set.insert(5, "five", &handle).unwrap(), InsertOutcome::Inserted);
//! assert!(set.contains(&5, &handle).unwrap());
//! assert_eq!(set.remove(&5, &handle).unwrap(), RemoveOutcome::Removed);
//! ```

use once_cell::sync::Lazy;

#[macro_use]
mod tracing_helpers;

pub mod backoff;
pub mod config;
pub mod error;
pub mod handle;
pub mod marked_ptr;
pub mod node;
pub mod node_allocator;
pub mod reclaim;
pub mod set;

pub use config::SetConfig;
pub use error::SetError;
pub use handle::Handle;
pub use reclaim::epoch::EpochManager;
pub use reclaim::hazard::HazardDomain;
pub use set::{InsertOutcome, LockFreeSet, ReclaimStats, RemoveOutcome};

/// Set reclaiming through three-generation epochs.
pub type EpochSet<K, V = ()> = LockFreeSet<K, V, EpochManager<K, V>>;

/// Set reclaiming through per-thread hazard slots.
pub type HazardSet<K, V = ()> = LockFreeSet<K, V, HazardDomain<K, V>>;

/// Alignment for cache lines (typically 64 bytes on modern CPUs)
pub(crate) static CACHE_LINE_SIZE: Lazy<usize> = Lazy::new(|| {
    // Try data cache first (most relevant for our use case)
    cache_size::cache_line_size(1, cache_size::CacheType::Data)
        // Fall back to unified cache if data cache info isn't available
        .or_else(|| cache_size::cache_line_size(1, cache_size::CacheType::Unified))
        // Try L2 cache if L1 isn't available
        .or_else(|| cache_size::cache_line_size(2, cache_size::CacheType::Data))
        .or_else(|| cache_size::cache_line_size(2, cache_size::CacheType::Unified))
        // Default to 64 bytes if all detection fails
        .unwrap_or(64)
});
