//! Keyset pagination.
//!
//! Pages are always read in ascending primary-key order. The next page is
//! requested with `_id > last seen id`, so no server-side cursor state exists and
//! rows are never skipped or repeated by offset drift.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Map, Value};
use tracing::warn;

use crate::error::{Result, ShelterError};
use crate::filter::FilterMap;
use crate::store::{Document, FindQuery, RecordId, SortSpec, PRIMARY_KEY};

/// Default number of rows per page.
pub const DEFAULT_PAGE_SIZE: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct CursorPayload {
    after: RecordId,
}

// == Cursor ==
/// Opaque position after the last row of a page. Serialized as a URL-safe token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    after: RecordId,
}

impl Cursor {
    pub fn after(id: RecordId) -> Self {
        Self { after: id }
    }

    /// Primary key of the last row already delivered.
    pub fn last_id(&self) -> RecordId {
        self.after
    }

    pub fn encode(&self) -> String {
        let payload = CursorPayload { after: self.after };
        let serialized = serde_json::to_vec(&payload).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(serialized)
    }

    pub fn decode(token: &str) -> Result<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|err| ShelterError::InvalidCursor(err.to_string()))?;
        let payload: CursorPayload = serde_json::from_slice(&bytes)
            .map_err(|err| ShelterError::InvalidCursor(err.to_string()))?;
        Ok(Self {
            after: payload.after,
        })
    }

    /// Decodes an optional token; absent or blank means "first page".
    pub fn from_token(token: Option<&str>) -> Result<Option<Self>> {
        match token.map(str::trim) {
            None | Some("") => Ok(None),
            Some(token) => Self::decode(token).map(Some),
        }
    }
}

impl Serialize for Cursor {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for Cursor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let token = String::deserialize(deserializer)?;
        Cursor::decode(&token).map_err(de::Error::custom)
    }
}

// == Page ==
/// One page of rows plus the cursor for the next one.
///
/// `next_cursor` is absent only when the page is empty. A full page followed by
/// nothing still carries a cursor; the following fetch returns an empty page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub rows: Vec<Document>,
    pub next_cursor: Option<Cursor>,
}

// == Keyset Paginator ==
#[derive(Debug, Clone)]
pub struct KeysetPaginator {
    default_page_size: usize,
    max_page_size: usize,
    projection: Vec<String>,
}

impl KeysetPaginator {
    pub fn new(default_page_size: usize, max_page_size: usize, projection: Vec<String>) -> Self {
        let max_page_size = max_page_size.max(1);
        Self {
            default_page_size: default_page_size.clamp(1, max_page_size),
            max_page_size,
            projection,
        }
    }

    /// Resolves a requested page size against the default and the ceiling.
    pub fn page_size(&self, requested: Option<usize>) -> Result<usize> {
        match requested {
            None => Ok(self.default_page_size),
            Some(0) => Err(ShelterError::Validation(
                "page_size must be at least 1".to_string(),
            )),
            Some(size) if size > self.max_page_size => Err(ShelterError::Validation(format!(
                "page_size must not exceed {}",
                self.max_page_size
            ))),
            Some(size) => Ok(size),
        }
    }

    /// Builds the store query for the page after `cursor`.
    ///
    /// With a cursor, the filter gains `_id > cursor` (strictly greater, the
    /// boundary row was already delivered). Without one, the filter is used as is.
    pub fn build_page_query(
        &self,
        filters: &FilterMap,
        cursor: Option<&Cursor>,
        page_size: usize,
    ) -> FindQuery {
        let mut filter = filters.clone();
        if let Some(cursor) = cursor {
            let bound = after_condition(filter.remove(PRIMARY_KEY), cursor.last_id());
            filter.insert(PRIMARY_KEY.to_string(), bound);
        }

        FindQuery {
            filter,
            projection: self.projection.clone(),
            sort: Some(SortSpec::ascending(PRIMARY_KEY)),
            limit: Some(page_size),
            skip: 0,
        }
    }

    /// Cursor positioned after the last row, or None for an empty page.
    pub fn derive_next_cursor(&self, rows: &[Document]) -> Option<Cursor> {
        let last = rows.last()?;
        match RecordId::of(last) {
            Some(id) => Some(Cursor::after(id)),
            None => {
                warn!("Last row of page has no usable primary key, ending pagination");
                None
            }
        }
    }
}

impl Default for KeysetPaginator {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE, 1000, Vec::new())
    }
}

/// Combines an existing primary-key condition with `> after`.
fn after_condition(existing: Option<Value>, after: RecordId) -> Value {
    match existing {
        None => json!({ "$gt": after.0 }),
        Some(Value::Object(ops)) if ops.keys().all(|k| k.starts_with('$')) => {
            let mut ops: Map<String, Value> = ops;
            let tighter = ops
                .get("$gt")
                .and_then(Value::as_u64)
                .map_or(after.0, |current| current.max(after.0));
            ops.insert("$gt".to_string(), Value::from(tighter));
            Value::Object(ops)
        }
        Some(equal) => json!({ "$eq": equal, "$gt": after.0 }),
    }
}
