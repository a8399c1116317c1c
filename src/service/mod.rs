//! Shelter Service
//!
//! Orchestrates sanitization, signatures, the result cache and keyset pagination
//! over an injected [`DocumentStore`]. Writes go straight to the store and clear
//! the result cache afterwards.

mod histogram;

pub use histogram::{HistogramBucket, HistogramLayout, OVERFLOW_KEY};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::cache::{build_signature, CacheStats, ResultCache};
use crate::config::Config;
use crate::error::{Result, ShelterError};
use crate::filter::{FilterMap, FilterSanitizer, AGE_FIELD, BREED_FIELD};
use crate::pagination::{Cursor, KeysetPaginator, Page};
use crate::store::{
    compare_values, AggregateRow, Aggregation, Document, DocumentStore, RecordId, StoreError,
    StoreResult, UpdateOutcome,
};

const TOP_BREEDS_VIEW: &str = "top_breeds";
const AGE_HISTOGRAM_VIEW: &str = "age_histogram";

/// One group of the top-breeds view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreedCount {
    /// Breed value, null for documents without one
    pub key: Value,
    pub count: u64,
}

/// A cached aggregation result.
#[derive(Debug, Clone, PartialEq)]
pub enum AggregateView {
    TopBreeds(Vec<BreedCount>),
    AgeHistogram(Vec<HistogramBucket>),
}

#[derive(Debug, Clone, Copy)]
struct ViewDefaults {
    top_breeds_limit: usize,
    histogram_step: u64,
    histogram_max_weeks: u64,
    histogram_max_buckets: u64,
}

// == Shelter Service ==
/// Single-instance query core, constructed once by the composition root.
pub struct ShelterService {
    store: Arc<dyn DocumentStore>,
    sanitizer: FilterSanitizer,
    paginator: KeysetPaginator,
    cache: ResultCache<Arc<AggregateView>>,
    defaults: ViewDefaults,
    store_timeout: Duration,
}

impl ShelterService {
    pub fn new(store: Arc<dyn DocumentStore>, config: &Config) -> Self {
        Self {
            store,
            sanitizer: FilterSanitizer::new(config.allowed_fields.iter().cloned()),
            paginator: KeysetPaginator::new(
                config.page_size,
                config.max_page_size,
                config.projection_fields.clone(),
            ),
            cache: ResultCache::new(config.cache_capacity, config.cache_ttl()),
            defaults: ViewDefaults {
                top_breeds_limit: config.top_breeds_limit,
                histogram_step: config.histogram_step,
                histogram_max_weeks: config.histogram_max_weeks,
                histogram_max_buckets: config.histogram_max_buckets,
            },
            store_timeout: config.store_timeout,
        }
    }

    /// Sanitizes raw caller filters; see [`FilterSanitizer::sanitize`].
    pub fn sanitize(&self, raw: Option<&Value>) -> Result<FilterMap> {
        self.sanitizer.sanitize(raw)
    }

    // == Top Breeds ==
    /// Most frequent breeds among matching documents, by count descending then
    /// breed ascending. Cached per (filters, limit).
    pub async fn top_breeds(
        &self,
        raw_filters: Option<&Value>,
        limit: Option<usize>,
    ) -> Result<Vec<BreedCount>> {
        let limit = limit.unwrap_or(self.defaults.top_breeds_limit);
        if limit == 0 {
            return Err(ShelterError::Validation(
                "limit must be at least 1".to_string(),
            ));
        }

        let filters = self.sanitize(raw_filters)?;
        let signature = build_signature(
            &filters,
            &[json!(TOP_BREEDS_VIEW), json!(["limit", limit])],
        );

        let view = self
            .cache
            .get_or_compute(&signature, || async {
                let aggregation = Aggregation::GroupCount {
                    field: BREED_FIELD.to_string(),
                    limit,
                };
                let rows = self
                    .with_deadline(self.store.aggregate(&filters, &aggregation))
                    .await?;
                Ok::<_, ShelterError>(Arc::new(AggregateView::TopBreeds(rank_breeds(rows, limit))))
            })
            .await?;

        match view.as_ref() {
            AggregateView::TopBreeds(breeds) => Ok(breeds.clone()),
            AggregateView::AgeHistogram(_) => Err(view_mismatch(TOP_BREEDS_VIEW)),
        }
    }

    // == Age Histogram ==
    /// Counts of matching documents per age bucket, sorted by lower bound.
    /// Cached per (filters, step, max_weeks).
    pub async fn age_histogram(
        &self,
        raw_filters: Option<&Value>,
        step: Option<u64>,
        max_weeks: Option<u64>,
    ) -> Result<Vec<HistogramBucket>> {
        let layout = HistogramLayout::new(
            step.unwrap_or(self.defaults.histogram_step),
            max_weeks.unwrap_or(self.defaults.histogram_max_weeks),
            self.defaults.histogram_max_buckets,
        )?;

        let filters = self.sanitize(raw_filters)?;
        let signature = build_signature(
            &filters,
            &[
                json!(AGE_HISTOGRAM_VIEW),
                json!(["step", layout.step()]),
                json!(["max", layout.max_weeks()]),
            ],
        );

        let view = self
            .cache
            .get_or_compute(&signature, || async {
                let aggregation = Aggregation::Bucket {
                    field: AGE_FIELD.to_string(),
                    boundaries: layout.boundaries(),
                    default_key: json!(OVERFLOW_KEY),
                };
                let rows = self
                    .with_deadline(self.store.aggregate(&filters, &aggregation))
                    .await?;
                Ok::<_, ShelterError>(Arc::new(AggregateView::AgeHistogram(
                    layout.buckets_from_rows(rows),
                )))
            })
            .await?;

        match view.as_ref() {
            AggregateView::AgeHistogram(buckets) => Ok(buckets.clone()),
            AggregateView::TopBreeds(_) => Err(view_mismatch(AGE_HISTOGRAM_VIEW)),
        }
    }

    // == Fetch Page ==
    /// Rows after `cursor` in ascending primary-key order, projected to the
    /// configured fields. Never cached.
    pub async fn fetch_page(
        &self,
        raw_filters: Option<&Value>,
        cursor: Option<&Cursor>,
        page_size: Option<usize>,
    ) -> Result<Page> {
        let filters = self.sanitize(raw_filters)?;
        let page_size = self.paginator.page_size(page_size)?;
        let query = self.paginator.build_page_query(&filters, cursor, page_size);

        let rows = self.with_deadline(self.store.find(&query)).await?;
        let next_cursor = self.paginator.derive_next_cursor(&rows);
        debug!(
            rows = rows.len(),
            after = cursor.map(|c| c.last_id().0),
            "Fetched page"
        );

        Ok(Page { rows, next_cursor })
    }

    /// Number of documents matching the sanitized filters.
    pub async fn count(&self, raw_filters: Option<&Value>) -> Result<u64> {
        let filters = self.sanitize(raw_filters)?;
        Ok(self
            .with_deadline(self.store.count_documents(&filters))
            .await?)
    }

    // == Mutations ==
    /// Inserts a document and invalidates cached aggregations.
    pub async fn create(&self, document: Value) -> Result<RecordId> {
        let document = expect_object(document, "document")?;
        let _invalidate = self.invalidate_after_write("create");
        let id = self.with_deadline(self.store.insert_one(document)).await?;
        info!(%id, "Created document");
        Ok(id)
    }

    /// Sets `changes` on every document matching `filter`, then invalidates.
    ///
    /// Mutation filters are not whitelisted: dropping a key would widen the write.
    pub async fn update(&self, filter: Value, changes: Value) -> Result<UpdateOutcome> {
        let filter = expect_object(filter, "filter")?;
        let changes = expect_object(changes, "changes")?;
        if changes.is_empty() {
            return Err(ShelterError::Validation(
                "changes must set at least one field".to_string(),
            ));
        }

        let _invalidate = self.invalidate_after_write("update");
        let outcome = self
            .with_deadline(self.store.update_many(&filter, &changes))
            .await?;
        info!(
            matched = outcome.matched,
            modified = outcome.modified,
            "Updated documents"
        );
        Ok(outcome)
    }

    /// Deletes every document matching `filter`, then invalidates.
    pub async fn delete(&self, filter: Value) -> Result<u64> {
        let filter = expect_object(filter, "filter")?;
        let _invalidate = self.invalidate_after_write("delete");
        let deleted = self.with_deadline(self.store.delete_many(&filter)).await?;
        info!(deleted, "Deleted documents");
        Ok(deleted)
    }

    // == Invalidate ==
    /// Clears every cached aggregation. Returns the number of entries dropped.
    pub fn invalidate(&self) -> usize {
        self.cache.invalidate_all()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Removes age-expired cached results. Returns the number removed.
    pub fn cleanup_expired(&self) -> usize {
        self.cache.cleanup_expired()
    }

    /// Probes store connectivity.
    pub async fn ping(&self) -> Result<()> {
        Ok(self.with_deadline(self.store.ping()).await?)
    }

    /// Guard clearing the result cache when the write it covers ends, however it ends:
    /// success, store error, timeout, cancellation or panic.
    fn invalidate_after_write(&self, op: &'static str) -> WriteInvalidation<'_> {
        WriteInvalidation { service: self, op }
    }

    async fn with_deadline<T, F>(&self, call: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        match tokio::time::timeout(self.store_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.store_timeout)),
        }
    }
}

struct WriteInvalidation<'a> {
    service: &'a ShelterService,
    op: &'static str,
}

impl Drop for WriteInvalidation<'_> {
    fn drop(&mut self) {
        let cleared = self.service.invalidate();
        info!(op = self.op, cleared, "Invalidated result cache after write");
    }
}

/// Orders groups by count descending, then key ascending, and keeps `limit`.
fn rank_breeds(rows: Vec<AggregateRow>, limit: usize) -> Vec<BreedCount> {
    let mut breeds: Vec<BreedCount> = rows
        .into_iter()
        .map(|row| BreedCount {
            key: row.key,
            count: row.count,
        })
        .collect();
    breeds.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| compare_values(&a.key, &b.key))
    });
    breeds.truncate(limit);
    breeds
}

fn expect_object(value: Value, what: &str) -> Result<Document> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(ShelterError::Validation(format!("{what} must be an object"))),
    }
}

fn view_mismatch(view: &str) -> ShelterError {
    ShelterError::Internal(format!("cached result for {view} has the wrong shape"))
}
