//! Cache Module
//!
//! Signature derivation and the bounded LRU result cache for aggregation queries.

mod entry;
mod lru;
mod signature;
mod stats;
mod store;


// Re-export public types
pub use entry::CacheEntry;
pub use lru::LruTracker;
pub use signature::{build_signature, Frozen, Signature};
pub use stats::CacheStats;
pub use store::ResultCache;

/// Default number of cached results.
pub const DEFAULT_CACHE_CAPACITY: usize = 128;
