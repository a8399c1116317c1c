//! Response DTOs for the HTTP surface
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::CacheStats;
use crate::pagination::Page;
use crate::service::{BreedCount, HistogramBucket};
use crate::store::{Document, RecordId, UpdateOutcome};

/// Response body for POST /animals/page
#[derive(Debug, Clone, Serialize)]
pub struct PageResponse {
    /// Number of rows in this page
    pub count: usize,
    pub rows: Vec<Document>,
    /// Token for the next page, null once an empty page is reached
    pub next_cursor: Option<String>,
}

impl From<Page> for PageResponse {
    fn from(page: Page) -> Self {
        Self {
            count: page.rows.len(),
            next_cursor: page.next_cursor.map(|cursor| cursor.encode()),
            rows: page.rows,
        }
    }
}

/// Response body for POST /animals/count
#[derive(Debug, Clone, Serialize)]
pub struct CountResponse {
    pub total: u64,
}

/// Response body for POST /metrics/top-breeds
#[derive(Debug, Clone, Serialize)]
pub struct TopBreedsResponse {
    pub breeds: Vec<BreedCount>,
}

/// Response body for POST /metrics/age-histogram
#[derive(Debug, Clone, Serialize)]
pub struct HistogramResponse {
    pub buckets: Vec<HistogramBucket>,
}

/// Response body for POST /animals
#[derive(Debug, Clone, Serialize)]
pub struct CreateResponse {
    pub inserted_id: RecordId,
    pub status: String,
}

impl CreateResponse {
    pub fn new(inserted_id: RecordId) -> Self {
        Self {
            inserted_id,
            status: "success".to_string(),
        }
    }
}

/// Response body for PATCH /animals
#[derive(Debug, Clone, Serialize)]
pub struct UpdateResponse {
    pub matched: u64,
    pub modified: u64,
    pub status: String,
}

impl From<UpdateOutcome> for UpdateResponse {
    fn from(outcome: UpdateOutcome) -> Self {
        Self {
            matched: outcome.matched,
            modified: outcome.modified,
            status: "success".to_string(),
        }
    }
}

/// Response body for DELETE /animals
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    pub deleted_count: u64,
    pub status: String,
}

impl DeleteResponse {
    pub fn new(deleted_count: u64) -> Self {
        Self {
            deleted_count,
            status: "success".to_string(),
        }
    }
}

/// Response body for POST /cache/invalidate
#[derive(Debug, Clone, Serialize)]
pub struct InvalidateResponse {
    /// Number of cached results dropped
    pub cleared: usize,
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub hits: u64,
    pub misses: u64,
    pub coalesced: u64,
    pub evictions: u64,
    pub invalidations: u64,
    pub total_entries: usize,
    pub capacity: usize,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl From<CacheStats> for StatsResponse {
    fn from(stats: CacheStats) -> Self {
        Self {
            hit_rate: stats.hit_rate(),
            hits: stats.hits,
            misses: stats.misses,
            coalesced: stats.coalesced,
            evictions: stats.evictions,
            invalidations: stats.invalidations,
            total_entries: stats.total_entries,
            capacity: stats.capacity,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// "healthy" or "degraded"
    pub status: String,
    /// Whether the store answered its ping
    pub store_reachable: bool,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    pub fn new(store_reachable: bool) -> Self {
        let status = if store_reachable { "healthy" } else { "degraded" };
        Self {
            status: status.to_string(),
            store_reachable,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
