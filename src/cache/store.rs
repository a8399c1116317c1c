//! Result Cache Module
//!
//! Bounded memoization store for aggregation results, keyed by [`Signature`].
//! Combines HashMap storage with LRU tracking, optional max age and per-signature
//! single-flight computation.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

use crate::cache::{CacheEntry, CacheStats, LruTracker, Signature};

#[derive(Debug)]
struct CacheState<V> {
    entries: HashMap<Signature, CacheEntry<V>>,
    lru: LruTracker<Signature>,
    stats: CacheStats,
    capacity: usize,
    /// Bumped by every invalidation
    generation: u64,
}

impl<V: Clone> CacheState<V> {
    /// Returns a live entry's value and marks it recently used. Expired entries are dropped.
    fn take_fresh(&mut self, signature: &Signature) -> Option<V> {
        let expired = self.entries.get(signature)?.is_expired();
        if expired {
            self.remove(signature);
            return None;
        }
        self.lru.touch(signature);
        let entry = self.entries.get(signature)?;
        debug!(
            signature = signature.fingerprint(),
            age_ms = entry.age_ms(),
            "Serving cached result"
        );
        Some(entry.value.clone())
    }

    fn insert(&mut self, signature: Signature, entry: CacheEntry<V>) {
        let is_overwrite = self.entries.contains_key(&signature);

        if !is_overwrite && self.entries.len() >= self.capacity {
            if let Some(evicted) = self.lru.evict_oldest() {
                self.entries.remove(&evicted);
                self.stats.record_eviction();
                debug!(signature = evicted.fingerprint(), "Evicted cached result");
            }
        }

        self.lru.touch(&signature);
        self.entries.insert(signature, entry);
        self.stats.set_total_entries(self.entries.len());
    }

    fn remove(&mut self, signature: &Signature) {
        self.entries.remove(signature);
        self.lru.remove(signature);
        self.stats.set_total_entries(self.entries.len());
    }
}

// == Result Cache ==
/// Process-local, capacity-bounded LRU cache of computed results.
///
/// At most one computation runs per signature at a time: concurrent callers that
/// miss on the same signature wait for the first one and reuse its result.
/// Failed computations are never stored.
#[derive(Debug)]
pub struct ResultCache<V> {
    state: Mutex<CacheState<V>>,
    inflight: Mutex<HashMap<Signature, Arc<AsyncMutex<()>>>>,
    ttl: Option<u64>,
}

impl<V: Clone> ResultCache<V> {
    // == Constructor ==
    /// Creates a cache holding at most `capacity` results (minimum 1), each
    /// expiring after `ttl` seconds when given.
    pub fn new(capacity: usize, ttl: Option<u64>) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                lru: LruTracker::new(),
                stats: CacheStats::new(capacity),
                capacity,
                generation: 0,
            }),
            inflight: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    // == Get ==
    /// Returns the cached value for `signature`, counting a hit or a miss.
    pub fn get(&self, signature: &Signature) -> Option<V> {
        let mut state = self.state("get");
        let found = state.take_fresh(signature);
        match found {
            Some(_) => state.stats.record_hit(),
            None => state.stats.record_miss(),
        }
        found
    }

    // == Get Or Compute ==
    /// Returns the cached value for `signature`, or runs `compute` and stores its result.
    ///
    /// `compute` runs at most once per call and only when no fresh entry exists.
    /// An error is propagated and nothing is stored. A result computed while an
    /// invalidation happened is returned to the caller but not stored. Dropping the
    /// returned future (timeout, cancellation) leaves the cache untouched.
    pub async fn get_or_compute<F, Fut, E>(&self, signature: &Signature, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(signature) {
            return Ok(value);
        }

        let flight = self.join_flight(signature);
        let _turn = flight.lock.lock().await;

        // another caller may have stored the result while we waited
        {
            let mut state = self.state("coalesce");
            if let Some(value) = state.take_fresh(signature) {
                state.stats.record_coalesced();
                return Ok(value);
            }
        }

        let generation = self.state("generation").generation;
        debug!(signature = signature.fingerprint(), "Result cache miss, computing");
        let value = compute().await?;
        self.populate(signature, value.clone(), generation);
        Ok(value)
    }

    // == Insert ==
    /// Stores `value` under `signature`, evicting the least recently used entry when full.
    pub fn insert(&self, signature: Signature, value: V) {
        let entry = CacheEntry::new(value, self.ttl);
        self.state("insert").insert(signature, entry);
    }

    // == Invalidate All ==
    /// Clears every entry. Returns the number of entries dropped.
    pub fn invalidate_all(&self) -> usize {
        let mut state = self.state("invalidate");
        let cleared = state.entries.len();
        state.entries.clear();
        state.lru.clear();
        state.generation += 1;
        state.stats.record_invalidation();
        state.stats.set_total_entries(0);
        cleared
    }

    // == Cleanup Expired ==
    /// Removes all expired entries. Returns the number of entries removed.
    pub fn cleanup_expired(&self) -> usize {
        let mut state = self.state("cleanup");
        let expired: Vec<Signature> = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(signature, _)| signature.clone())
            .collect();

        for signature in &expired {
            state.remove(signature);
        }
        expired.len()
    }

    /// Returns true if a live entry exists, without touching LRU order or stats.
    pub fn contains(&self, signature: &Signature) -> bool {
        self.state("contains")
            .entries
            .get(signature)
            .is_some_and(|entry| !entry.is_expired())
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state("stats");
        let mut stats = state.stats.clone();
        stats.set_total_entries(state.entries.len());
        stats
    }

    pub fn len(&self) -> usize {
        self.state("len").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.state("capacity").capacity
    }

    fn populate(&self, signature: &Signature, value: V, generation: u64) {
        let mut state = self.state("populate");
        if state.generation != generation {
            debug!(
                signature = signature.fingerprint(),
                "Discarding result computed across an invalidation"
            );
            return;
        }
        state.insert(signature.clone(), CacheEntry::new(value, self.ttl));
    }

    fn join_flight(&self, signature: &Signature) -> FlightGuard<'_> {
        let lock = lock_or_recover(&self.inflight, "join_flight")
            .entry(signature.clone())
            .or_default()
            .clone();
        FlightGuard {
            inflight: &self.inflight,
            signature: signature.clone(),
            lock,
        }
    }

    fn state(&self, op: &'static str) -> MutexGuard<'_, CacheState<V>> {
        lock_or_recover(&self.state, op)
    }
}

/// Membership in the set of callers computing one signature.
struct FlightGuard<'a> {
    inflight: &'a Mutex<HashMap<Signature, Arc<AsyncMutex<()>>>>,
    signature: Signature,
    lock: Arc<AsyncMutex<()>>,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        let mut inflight = lock_or_recover(self.inflight, "leave_flight");
        let ours = inflight
            .get(&self.signature)
            .is_some_and(|current| Arc::ptr_eq(current, &self.lock));
        if ours {
            inflight.remove(&self.signature);
        }
    }
}

fn lock_or_recover<'a, T>(lock: &'a Mutex<T>, op: &'static str) -> MutexGuard<'a, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(op, "Recovered from poisoned result cache lock");
            poisoned.into_inner()
        }
    }
}
