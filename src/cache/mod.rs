//! Cache Module
//!
//! Provides partitioned in-memory caching with TTL expiration, counters and a
//! read-through helper with stale fallback.

pub mod entry;
mod shared;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use entry::CacheEntry;
pub use shared::{DataSource, Fetched, SharedCache};
pub use stats::{CacheReport, CacheStats, PartitionReport};
pub use store::{CacheStore, ClearScope, Partition};
