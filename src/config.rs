//! Configuration Module
//!
//! Handles loading query-core and server configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::DEFAULT_CACHE_CAPACITY;
use crate::pagination::DEFAULT_PAGE_SIZE;

/// Fields a caller may filter on unless `ALLOWED_FIELDS` says otherwise.
pub const DEFAULT_ALLOWED_FIELDS: &[&str] = &[
    "animal_type",
    "breed",
    "sex_upon_outcome",
    "age_upon_outcome_in_weeks",
    "outcome_type",
    "color",
];

/// Fields returned for each row of a page unless `PROJECTION_FIELDS` says otherwise.
pub const DEFAULT_PROJECTION_FIELDS: &[&str] = &[
    "animal_type",
    "breed",
    "sex_upon_outcome",
    "age_upon_outcome_in_weeks",
];

/// Query-core and server configuration.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Filter field names that survive sanitization
    pub allowed_fields: Vec<String>,
    /// Fields projected into page rows (primary key is always included)
    pub projection_fields: Vec<String>,
    /// Default number of rows per page
    pub page_size: usize,
    /// Largest page a caller may request
    pub max_page_size: usize,
    /// Maximum number of cached aggregation results
    pub cache_capacity: usize,
    /// Max age in seconds of a cached result, 0 = never expires
    pub cache_ttl: u64,
    /// Interval in seconds between sweeps of expired cache entries
    pub cleanup_interval: u64,
    /// Default number of groups returned by the top-breeds view
    pub top_breeds_limit: usize,
    /// Default histogram bucket width in weeks
    pub histogram_step: u64,
    /// Default histogram overflow threshold in weeks
    pub histogram_max_weeks: u64,
    /// Most regular buckets a histogram request may ask for
    pub histogram_max_buckets: u64,
    /// Deadline applied to every store round-trip
    pub store_timeout: Duration,
    /// HTTP server port
    pub server_port: u16,
    /// Optional JSON array of documents loaded into the store at startup
    pub seed_file: Option<PathBuf>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `ALLOWED_FIELDS` - Comma-separated filter allow-list
    /// - `PROJECTION_FIELDS` - Comma-separated row projection
    /// - `PAGE_SIZE` - Default page size (default: 25)
    /// - `MAX_PAGE_SIZE` - Page size ceiling (default: 1000)
    /// - `CACHE_CAPACITY` - Cached result capacity (default: 128)
    /// - `CACHE_TTL` - Cached result max age in seconds (default: 0, disabled)
    /// - `CLEANUP_INTERVAL` - Expired-entry sweep frequency in seconds (default: 30)
    /// - `TOP_BREEDS_LIMIT` - Default top-breeds limit (default: 10)
    /// - `HISTOGRAM_STEP` - Default bucket width in weeks (default: 26)
    /// - `HISTOGRAM_MAX_WEEKS` - Default overflow threshold (default: 520)
    /// - `HISTOGRAM_MAX_BUCKETS` - Bucket count ceiling per request (default: 1000)
    /// - `STORE_TIMEOUT_MS` - Store round-trip deadline (default: 3000)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `SEED_FILE` - Path to a JSON array of seed documents (default: unset)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            allowed_fields: env_list("ALLOWED_FIELDS").unwrap_or(defaults.allowed_fields),
            projection_fields: env_list("PROJECTION_FIELDS").unwrap_or(defaults.projection_fields),
            page_size: env_or("PAGE_SIZE", defaults.page_size),
            max_page_size: env_or("MAX_PAGE_SIZE", defaults.max_page_size),
            cache_capacity: env_or("CACHE_CAPACITY", defaults.cache_capacity),
            cache_ttl: env_or("CACHE_TTL", defaults.cache_ttl),
            cleanup_interval: env_or("CLEANUP_INTERVAL", defaults.cleanup_interval),
            top_breeds_limit: env_or("TOP_BREEDS_LIMIT", defaults.top_breeds_limit),
            histogram_step: env_or("HISTOGRAM_STEP", defaults.histogram_step),
            histogram_max_weeks: env_or("HISTOGRAM_MAX_WEEKS", defaults.histogram_max_weeks),
            histogram_max_buckets: env_or("HISTOGRAM_MAX_BUCKETS", defaults.histogram_max_buckets),
            store_timeout: Duration::from_millis(env_or("STORE_TIMEOUT_MS", 3000)),
            server_port: env_or("SERVER_PORT", defaults.server_port),
            seed_file: env::var("SEED_FILE")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
        }
    }

    /// Cache entry max age, or None when entries never expire.
    pub fn cache_ttl(&self) -> Option<u64> {
        (self.cache_ttl > 0).then_some(self.cache_ttl)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            allowed_fields: DEFAULT_ALLOWED_FIELDS.iter().map(|f| f.to_string()).collect(),
            projection_fields: DEFAULT_PROJECTION_FIELDS
                .iter()
                .map(|f| f.to_string())
                .collect(),
            page_size: DEFAULT_PAGE_SIZE,
            max_page_size: 1000,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            cache_ttl: 0,
            cleanup_interval: 30,
            top_breeds_limit: 10,
            histogram_step: 26,
            histogram_max_weeks: 520,
            histogram_max_buckets: 1000,
            store_timeout: Duration::from_millis(3000),
            server_port: 3000,
            seed_file: None,
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_list(key: &str) -> Option<Vec<String>> {
    let raw = env::var(key).ok()?;
    let fields: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_string)
        .collect();
    (!fields.is_empty()).then_some(fields)
}
