//! Cache Store Module
//!
//! Partitioned in-memory storage with per-entry TTL and per-partition counters.
//!
//! Reads always re-check freshness, so entries that expired but were not yet
//! swept are never returned by [`CacheStore::get`]. Only
//! [`CacheStore::peek_stale`] sees them, for stale fallback.

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;
use tracing::debug;

use crate::cache::entry::current_timestamp_ms;
use crate::cache::{CacheEntry, CacheReport, CacheStats, PartitionReport};

/// Number of keys listed per partition in [`CacheStore::stats`].
const SAMPLE_KEYS: usize = 10;

// == Partition ==
/// Logical partition of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    /// Upstream API responses
    Api,
    /// Rate-limit windows
    RateLimit,
}

impl Partition {
    pub const ALL: [Partition; 2] = [Partition::Api, Partition::RateLimit];

    pub fn as_str(&self) -> &'static str {
        match self {
            Partition::Api => "api",
            Partition::RateLimit => "rate-limit",
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// == Clear Scope ==
/// What [`CacheStore::clear`] removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearScope {
    Partition(Partition),
    All,
}

impl ClearScope {
    fn includes(&self, partition: Partition) -> bool {
        match self {
            ClearScope::All => true,
            ClearScope::Partition(p) => *p == partition,
        }
    }
}

// == Partition Storage ==
#[derive(Debug)]
struct Shard {
    entries: HashMap<String, CacheEntry>,
    stats: CacheStats,
    default_ttl: u64,
}

impl Shard {
    fn new(default_ttl: u64) -> Self {
        Self {
            entries: HashMap::new(),
            stats: CacheStats::new(),
            default_ttl,
        }
    }
}

// == Cache Store ==
/// Main cache storage with TTL support, split into partitions.
#[derive(Debug)]
pub struct CacheStore {
    api: Shard,
    rate_limit: Shard,
}

impl CacheStore {
    // == Constructor ==
    /// Creates a new CacheStore.
    ///
    /// # Arguments
    /// * `api_default_ttl` - Default TTL in seconds for the api partition
    /// * `rate_limit_default_ttl` - Default TTL in seconds for the rate-limit partition
    pub fn new(api_default_ttl: u64, rate_limit_default_ttl: u64) -> Self {
        Self {
            api: Shard::new(api_default_ttl),
            rate_limit: Shard::new(rate_limit_default_ttl),
        }
    }

    fn shard(&self, partition: Partition) -> &Shard {
        match partition {
            Partition::Api => &self.api,
            Partition::RateLimit => &self.rate_limit,
        }
    }

    fn shard_mut(&mut self, partition: Partition) -> &mut Shard {
        match partition {
            Partition::Api => &mut self.api,
            Partition::RateLimit => &mut self.rate_limit,
        }
    }

    // == Get ==
    /// Retrieves a fresh value by key, recording a hit or a miss.
    pub fn get(&mut self, partition: Partition, key: &str) -> Option<Value> {
        self.get_at(partition, key, current_timestamp_ms())
    }

    pub fn get_at(&mut self, partition: Partition, key: &str, now_ms: u64) -> Option<Value> {
        let shard = self.shard_mut(partition);
        match shard.entries.get(key) {
            Some(entry) if !entry.is_expired_at(now_ms) => {
                shard.stats.record_hit();
                debug!(partition = %partition, key, "Cache HIT");
                Some(entry.value.clone())
            }
            _ => {
                shard.stats.record_miss();
                debug!(partition = %partition, key, "Cache MISS");
                None
            }
        }
    }

    // == Set ==
    /// Stores a value, overwriting any previous entry and resetting its TTL.
    ///
    /// # Arguments
    /// * `ttl` - TTL in seconds; the partition default is used when `None`
    pub fn set(&mut self, partition: Partition, key: String, value: Value, ttl: Option<u64>) {
        self.set_at(partition, key, value, ttl, current_timestamp_ms());
    }

    pub fn set_at(
        &mut self,
        partition: Partition,
        key: String,
        value: Value,
        ttl: Option<u64>,
        now_ms: u64,
    ) {
        let shard = self.shard_mut(partition);
        let effective_ttl = ttl.unwrap_or(shard.default_ttl);
        debug!(partition = %partition, key = %key, ttl = effective_ttl, "Cache SET");
        shard
            .entries
            .insert(key, CacheEntry::new_at(value, effective_ttl, now_ms));
        shard.stats.record_set();
    }

    // == Delete ==
    /// Removes an entry. Returns whether something was removed; absent keys
    /// are not an error.
    pub fn delete(&mut self, partition: Partition, key: &str) -> bool {
        let shard = self.shard_mut(partition);
        if shard.entries.remove(key).is_some() {
            shard.stats.record_delete();
            debug!(partition = %partition, key, "Cache DELETE");
            true
        } else {
            false
        }
    }

    /// Removes every entry whose key contains `pattern`. Returns the count.
    pub fn delete_matching(&mut self, partition: Partition, pattern: &str) -> usize {
        let keys: Vec<String> = self
            .shard(partition)
            .entries
            .keys()
            .filter(|key| key.contains(pattern))
            .cloned()
            .collect();

        keys.iter().filter(|key| self.delete(partition, key)).count()
    }

    // == Has ==
    /// Existence check for a fresh entry. Does not touch hit/miss counters.
    pub fn has(&self, partition: Partition, key: &str) -> bool {
        self.has_at(partition, key, current_timestamp_ms())
    }

    pub fn has_at(&self, partition: Partition, key: &str, now_ms: u64) -> bool {
        self.shard(partition)
            .entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired_at(now_ms))
    }

    // == Peek Stale ==
    /// Returns the stored value even if it has expired.
    ///
    /// Only for stale-fallback paths. Does not touch counters.
    pub fn peek_stale(&self, partition: Partition, key: &str) -> Option<Value> {
        self.shard(partition)
            .entries
            .get(key)
            .map(|entry| entry.value.clone())
    }

    // == Clear ==
    /// Removes all entries in the given scope. Returns the number removed.
    pub fn clear(&mut self, scope: ClearScope) -> usize {
        let mut removed = 0;
        for partition in Partition::ALL {
            if scope.includes(partition) {
                let shard = self.shard_mut(partition);
                removed += shard.entries.len();
                shard.entries.clear();
            }
        }
        debug!(?scope, removed, "Cache CLEARED");
        removed
    }

    // == Error Accounting ==
    /// Counts a swallowed internal failure against a partition.
    pub fn record_error(&mut self, partition: Partition) {
        self.shard_mut(partition).stats.record_error();
    }

    // == Stats ==
    /// Returns a snapshot of both partitions.
    pub fn stats(&self) -> CacheReport {
        CacheReport {
            api: self.partition_report(Partition::Api),
            rate_limit: self.partition_report(Partition::RateLimit),
        }
    }

    fn partition_report(&self, partition: Partition) -> PartitionReport {
        let shard = self.shard(partition);
        let mut sample_keys: Vec<String> = shard.entries.keys().cloned().collect();
        sample_keys.sort();
        sample_keys.truncate(SAMPLE_KEYS);

        PartitionReport {
            counters: shard.stats.clone(),
            entries: shard.entries.len(),
            hit_rate: shard.stats.hit_rate(),
            sample_keys,
        }
    }

    // == Cleanup Expired ==
    /// Removes entries that have been expired for at least `grace_ms`.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&mut self, partition: Partition, grace_ms: u64) -> usize {
        self.cleanup_expired_at(partition, grace_ms, current_timestamp_ms())
    }

    pub fn cleanup_expired_at(&mut self, partition: Partition, grace_ms: u64, now_ms: u64) -> usize {
        let shard = self.shard_mut(partition);
        let before = shard.entries.len();
        shard
            .entries
            .retain(|_, entry| !entry.is_past_grace(now_ms, grace_ms));
        before - shard.entries.len()
    }

    // == Length ==
    /// Returns the number of entries in a partition, swept or not.
    pub fn len(&self, partition: Partition) -> usize {
        self.shard(partition).entries.len()
    }

    /// Returns true if both partitions are empty.
    pub fn is_empty(&self) -> bool {
        Partition::ALL.iter().all(|p| self.len(*p) == 0)
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new(300, 60)
    }
}
