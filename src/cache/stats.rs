//! Cache Statistics Module
//!
//! Tracks per-partition counters: hits, misses, sets, deletes and errors.

use serde::Serialize;

// == Cache Stats ==
/// Performance counters for one cache partition.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Number of successful cache retrievals
    pub hits: u64,
    /// Number of failed cache retrievals (key not found or expired)
    pub misses: u64,
    /// Number of inserts and overwrites
    pub sets: u64,
    /// Number of entries removed by explicit delete
    pub deletes: u64,
    /// Number of swallowed internal failures
    pub errors: u64,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no reads have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_set(&mut self) {
        self.sets += 1;
    }

    pub fn record_delete(&mut self) {
        self.deletes += 1;
    }

    pub fn record_error(&mut self) {
        self.errors += 1;
    }
}

// == Partition Report ==
/// Snapshot of one partition: its counters plus size information.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionReport {
    #[serde(flatten)]
    pub counters: CacheStats,
    /// Current number of entries, including expired ones not yet swept
    pub entries: usize,
    /// Hit rate as a fraction in `[0, 1]`
    pub hit_rate: f64,
    /// First few keys, for debugging
    pub sample_keys: Vec<String>,
}

// == Stats Report ==
/// Snapshot of the whole store.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheReport {
    pub api: PartitionReport,
    pub rate_limit: PartitionReport,
}
