//! Store Module
//!
//! The document-store boundary consumed by the query core, plus an in-memory
//! adapter used by the development server and the tests.

mod matcher;
mod memory;

pub use matcher::{compare_values, matches};
pub use memory::MemoryStore;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::filter::FilterMap;

/// Field holding the primary identifier of every document.
pub const PRIMARY_KEY: &str = "_id";

/// A structured record as returned by the store.
pub type Document = Map<String, Value>;

// == Record Id ==
/// Insertion-ordered primary identifier, unique per document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl RecordId {
    /// Reads the primary key of a document, if it holds a valid id.
    pub fn of(document: &Document) -> Option<Self> {
        document.get(PRIMARY_KEY)?.as_u64().map(RecordId)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// == Query Types ==
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortSpec {
    pub field: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }
}

/// Arguments of a `find` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindQuery {
    /// Conditions every returned document satisfies
    pub filter: FilterMap,
    /// Fields to return; empty means every field. The primary key is always returned.
    pub projection: Vec<String>,
    /// Result ordering; None leaves the store's natural order
    pub sort: Option<SortSpec>,
    /// Maximum number of documents to return
    pub limit: Option<usize>,
    /// Number of matching documents to skip
    pub skip: usize,
}

/// Aggregations the core asks the store to run over matching documents.
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregation {
    /// Count documents per distinct value of `field`, most frequent first.
    GroupCount { field: String, limit: usize },
    /// Count documents whose numeric `field` falls in `[boundaries[i], boundaries[i + 1])`.
    /// Values outside the boundaries are counted under `default_key`; documents
    /// without a numeric value are skipped.
    Bucket {
        field: String,
        boundaries: Vec<u64>,
        default_key: Value,
    },
}

/// One grouped output record of an aggregation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRow {
    pub key: Value,
    pub count: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpdateOutcome {
    pub matched: u64,
    pub modified: u64,
}

// == Store Error ==
#[derive(Error, Debug)]
pub enum StoreError {
    /// Store cannot be reached
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Round-trip exceeded its deadline
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    /// A document with this primary key already exists
    #[error("duplicate primary key {0}")]
    Duplicate(u64),

    /// Store refused the query or write
    #[error("rejected: {0}")]
    Rejected(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

// == Document Store ==
/// Opaque document store. Records are structured maps and [`PRIMARY_KEY`]
/// provides a stable total order.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find(&self, query: &FindQuery) -> StoreResult<Vec<Document>>;

    async fn count_documents(&self, filter: &FilterMap) -> StoreResult<u64>;

    async fn aggregate(
        &self,
        filter: &FilterMap,
        aggregation: &Aggregation,
    ) -> StoreResult<Vec<AggregateRow>>;

    async fn insert_one(&self, document: Document) -> StoreResult<RecordId>;

    /// Sets the fields of `changes` on every matching document.
    async fn update_many(&self, filter: &FilterMap, changes: &Document)
        -> StoreResult<UpdateOutcome>;

    async fn delete_many(&self, filter: &FilterMap) -> StoreResult<u64>;

    /// Connectivity probe.
    async fn ping(&self) -> StoreResult<()>;
}
