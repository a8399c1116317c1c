//! Cache Statistics Module
//!
//! Tracks result-cache counters: hits, misses, coalesced waits, evictions and invalidations.

use serde::Serialize;

// == Cache Stats ==
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that found nothing usable
    pub misses: u64,
    /// Misses answered by another caller's in-flight computation
    pub coalesced: u64,
    /// Entries evicted due to LRU policy
    pub evictions: u64,
    /// Whole-cache invalidations
    pub invalidations: u64,
    /// Current number of entries in the cache
    pub total_entries: usize,
    /// Configured entry capacity
    pub capacity: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates zeroed counters for a cache of `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    // == Record Hit ==
    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    // == Record Miss ==
    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    // == Record Coalesced ==
    pub fn record_coalesced(&mut self) {
        self.coalesced += 1;
    }

    // == Record Eviction ==
    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    // == Record Invalidation ==
    pub fn record_invalidation(&mut self) {
        self.invalidations += 1;
    }

    // == Set Total Entries ==
    pub fn set_total_entries(&mut self, count: usize) {
        self.total_entries = count;
    }
}
