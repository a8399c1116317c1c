//! In-memory document store.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::filter::FilterMap;
use crate::store::{
    compare_values, matches, AggregateRow, Aggregation, Document, DocumentStore, FindQuery,
    RecordId, SortDirection, StoreError, StoreResult, UpdateOutcome, PRIMARY_KEY,
};

#[derive(Debug, Default)]
struct MemoryState {
    /// Documents keyed and ordered by primary key
    documents: BTreeMap<RecordId, Document>,
    /// Next id handed out to a document inserted without one
    next_id: u64,
}

impl MemoryState {
    fn insert(&mut self, mut document: Document) -> StoreResult<RecordId> {
        let id = match document.get(PRIMARY_KEY) {
            None | Some(Value::Null) => RecordId(self.next_id.max(1)),
            Some(value) => value.as_u64().map(RecordId).ok_or_else(|| {
                StoreError::Rejected(format!("{PRIMARY_KEY} must be an unsigned integer"))
            })?,
        };

        if self.documents.contains_key(&id) {
            return Err(StoreError::Duplicate(id.0));
        }
        let after = id.0.checked_add(1).ok_or_else(|| {
            StoreError::Rejected(format!("{PRIMARY_KEY} {id} leaves no room for later ids"))
        })?;

        document.insert(PRIMARY_KEY.to_string(), Value::from(id.0));
        self.documents.insert(id, document);
        self.next_id = self.next_id.max(after);
        Ok(id)
    }

    fn matching<'a>(&'a self, filter: &FilterMap) -> StoreResult<Vec<&'a Document>> {
        let mut found = Vec::new();
        for document in self.documents.values() {
            if matches(document, filter)? {
                found.push(document);
            }
        }
        Ok(found)
    }
}

// == Memory Store ==
/// Document store kept entirely in process memory.
///
/// Ids are assigned in insertion order starting at 1 unless a document carries
/// its own numeric `_id`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store holding `documents`, inserted in order.
    pub fn from_documents<I>(documents: I) -> StoreResult<Self>
    where
        I: IntoIterator<Item = Document>,
    {
        let mut state = MemoryState::default();
        for document in documents {
            state.insert(document)?;
        }
        Ok(Self {
            state: RwLock::new(state),
        })
    }

    /// Number of stored documents.
    pub async fn len(&self) -> usize {
        self.state.read().await.documents.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find(&self, query: &FindQuery) -> StoreResult<Vec<Document>> {
        let state = self.state.read().await;
        let mut found = state.matching(&query.filter)?;

        if let Some(sort) = &query.sort {
            if sort.field != PRIMARY_KEY || sort.direction == SortDirection::Descending {
                found.sort_by(|a, b| {
                    let missing = Value::Null;
                    let ord = compare_values(
                        a.get(&sort.field).unwrap_or(&missing),
                        b.get(&sort.field).unwrap_or(&missing),
                    );
                    match sort.direction {
                        SortDirection::Ascending => ord,
                        SortDirection::Descending => ord.reverse(),
                    }
                });
            }
        }

        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(found
            .into_iter()
            .skip(query.skip)
            .take(limit)
            .map(|document| project(document, &query.projection))
            .collect())
    }

    async fn count_documents(&self, filter: &FilterMap) -> StoreResult<u64> {
        let state = self.state.read().await;
        Ok(state.matching(filter)?.len() as u64)
    }

    async fn aggregate(
        &self,
        filter: &FilterMap,
        aggregation: &Aggregation,
    ) -> StoreResult<Vec<AggregateRow>> {
        let state = self.state.read().await;
        let found = state.matching(filter)?;

        match aggregation {
            Aggregation::GroupCount { field, limit } => Ok(group_count(&found, field, *limit)),
            Aggregation::Bucket {
                field,
                boundaries,
                default_key,
            } => bucket(&found, field, boundaries, default_key),
        }
    }

    async fn insert_one(&self, document: Document) -> StoreResult<RecordId> {
        self.state.write().await.insert(document)
    }

    async fn update_many(
        &self,
        filter: &FilterMap,
        changes: &Document,
    ) -> StoreResult<UpdateOutcome> {
        if changes.contains_key(PRIMARY_KEY) {
            return Err(StoreError::Rejected(format!(
                "{PRIMARY_KEY} cannot be modified"
            )));
        }

        let mut state = self.state.write().await;
        let ids: Vec<RecordId> = state
            .matching(filter)?
            .into_iter()
            .filter_map(RecordId::of)
            .collect();

        let mut outcome = UpdateOutcome::default();
        for id in ids {
            let Some(document) = state.documents.get_mut(&id) else {
                continue;
            };
            outcome.matched += 1;
            let mut changed = false;
            for (field, value) in changes {
                if document.get(field) != Some(value) {
                    document.insert(field.clone(), value.clone());
                    changed = true;
                }
            }
            if changed {
                outcome.modified += 1;
            }
        }
        Ok(outcome)
    }

    async fn delete_many(&self, filter: &FilterMap) -> StoreResult<u64> {
        let mut state = self.state.write().await;
        let ids: Vec<RecordId> = state
            .matching(filter)?
            .into_iter()
            .filter_map(RecordId::of)
            .collect();

        for id in &ids {
            state.documents.remove(id);
        }
        Ok(ids.len() as u64)
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

fn project(document: &Document, fields: &[String]) -> Document {
    if fields.is_empty() {
        return document.clone();
    }
    document
        .iter()
        .filter(|(key, _)| key.as_str() == PRIMARY_KEY || fields.iter().any(|f| f == *key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

fn group_count(documents: &[&Document], field: &str, limit: usize) -> Vec<AggregateRow> {
    // keyed by the canonical JSON text since Value is not hashable
    let mut groups: HashMap<String, AggregateRow> = HashMap::new();
    for document in documents {
        let key = document.get(field).cloned().unwrap_or(Value::Null);
        groups
            .entry(key.to_string())
            .or_insert_with(|| AggregateRow { key, count: 0 })
            .count += 1;
    }

    let mut rows: Vec<AggregateRow> = groups.into_values().collect();
    rows.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| compare_values(&a.key, &b.key))
    });
    rows.truncate(limit);
    rows
}

fn bucket(
    documents: &[&Document],
    field: &str,
    boundaries: &[u64],
    default_key: &Value,
) -> StoreResult<Vec<AggregateRow>> {
    if boundaries.len() < 2 || boundaries.windows(2).any(|w| w[0] >= w[1]) {
        return Err(StoreError::Rejected(
            "bucket boundaries must be at least two strictly ascending values".to_string(),
        ));
    }

    let mut counts: BTreeMap<u64, u64> = BTreeMap::new();
    let mut overflow = 0;
    for document in documents {
        let Some(value) = document.get(field).and_then(Value::as_f64) else {
            continue;
        };
        // index of the first boundary above value; 0 or len means outside every bucket
        let above = boundaries.partition_point(|b| *b as f64 <= value);
        let slot = (above > 0 && above < boundaries.len()).then(|| boundaries[above - 1]);
        match slot {
            Some(lower) => *counts.entry(lower).or_insert(0) += 1,
            None => overflow += 1,
        }
    }

    let mut rows: Vec<AggregateRow> = counts
        .into_iter()
        .map(|(lower, count)| AggregateRow {
            key: Value::from(lower),
            count,
        })
        .collect();
    if overflow > 0 {
        rows.push(AggregateRow {
            key: default_key.clone(),
            count: overflow,
        });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SortSpec;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    fn filter(value: Value) -> FilterMap {
        value.as_object().cloned().unwrap()
    }

    fn sample_store() -> MemoryStore {
        MemoryStore::from_documents(vec![
            doc(json!({ "animal_type": "Dog", "breed": "Beagle", "age_upon_outcome_in_weeks": 10 })),
            doc(json!({ "animal_type": "Cat", "breed": "Siamese", "age_upon_outcome_in_weeks": 30 })),
            doc(json!({ "animal_type": "Dog", "breed": "Beagle", "age_upon_outcome_in_weeks": 60 })),
            doc(json!({ "animal_type": "Dog", "breed": "Poodle", "age_upon_outcome_in_weeks": 700 })),
        ])
        .unwrap()
    }

    #[tokio::test]
    async fn test_insert_assigns_ascending_ids() {
        let store = MemoryStore::new();
        let a = store.insert_one(doc(json!({ "breed": "A" }))).await.unwrap();
        let b = store.insert_one(doc(json!({ "breed": "B" }))).await.unwrap();
        assert_eq!(a, RecordId(1));
        assert_eq!(b, RecordId(2));
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_insert_with_explicit_id() {
        let store = MemoryStore::new();
        store.insert_one(doc(json!({ "_id": 10 }))).await.unwrap();
        let next = store.insert_one(doc(json!({ "breed": "B" }))).await.unwrap();
        assert_eq!(next, RecordId(11));

        let duplicate = store.insert_one(doc(json!({ "_id": 10 }))).await;
        assert!(matches!(duplicate, Err(StoreError::Duplicate(10))));

        let invalid = store.insert_one(doc(json!({ "_id": "x" }))).await;
        assert!(matches!(invalid, Err(StoreError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_insert_with_largest_id_is_rejected() {
        let store = MemoryStore::new();
        let result = store.insert_one(doc(json!({ "_id": u64::MAX }))).await;
        assert!(matches!(result, Err(StoreError::Rejected(_))));
        assert!(store.is_empty().await);

        let next = store.insert_one(doc(json!({ "breed": "A" }))).await.unwrap();
        assert_eq!(next, RecordId(1));

        let highest = store
            .insert_one(doc(json!({ "_id": u64::MAX - 1 })))
            .await
            .unwrap();
        assert_eq!(highest, RecordId(u64::MAX - 1));
    }

    #[tokio::test]
    async fn test_find_filters_limits_and_projects() {
        let store = sample_store();
        let query = FindQuery {
            filter: filter(json!({ "animal_type": "Dog" })),
            projection: vec!["breed".to_string()],
            sort: Some(SortSpec::ascending(PRIMARY_KEY)),
            limit: Some(2),
            skip: 0,
        };
        let rows = store.find(&query).await.unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], doc(json!({ "_id": 1, "breed": "Beagle" })));
        assert_eq!(rows[1], doc(json!({ "_id": 3, "breed": "Beagle" })));
    }

    #[tokio::test]
    async fn test_find_skip_and_descending_sort() {
        let store = sample_store();
        let query = FindQuery {
            sort: Some(SortSpec {
                field: "age_upon_outcome_in_weeks".to_string(),
                direction: SortDirection::Descending,
            }),
            skip: 1,
            ..Default::default()
        };
        let rows = store.find(&query).await.unwrap();
        let ids: Vec<u64> = rows.iter().filter_map(RecordId::of).map(|id| id.0).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn test_count_documents() {
        let store = sample_store();
        let count = store
            .count_documents(&filter(json!({ "breed": "Beagle" })))
            .await
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_group_count_orders_by_count_then_key() {
        let store = sample_store();
        let rows = store
            .aggregate(
                &FilterMap::new(),
                &Aggregation::GroupCount {
                    field: "breed".to_string(),
                    limit: 10,
                },
            )
            .await
            .unwrap();

        let keys: Vec<Value> = rows.iter().map(|r| r.key.clone()).collect();
        assert_eq!(keys, vec![json!("Beagle"), json!("Poodle"), json!("Siamese")]);
        assert_eq!(rows[0].count, 2);
    }

    #[tokio::test]
    async fn test_bucket_with_overflow() {
        let store = sample_store();
        let rows = store
            .aggregate(
                &FilterMap::new(),
                &Aggregation::Bucket {
                    field: "age_upon_outcome_in_weeks".to_string(),
                    boundaries: vec![0, 26, 52, 78],
                    default_key: json!("overflow"),
                },
            )
            .await
            .unwrap();

        assert_eq!(
            rows,
            vec![
                AggregateRow { key: json!(0), count: 1 },
                AggregateRow { key: json!(26), count: 1 },
                AggregateRow { key: json!(52), count: 1 },
                AggregateRow { key: json!("overflow"), count: 1 },
            ]
        );
    }

    #[tokio::test]
    async fn test_bucket_edges() {
        let store = MemoryStore::from_documents(
            [-1.0, 0.0, 25.9, 26.0, 51.0, 52.0]
                .into_iter()
                .map(|age| doc(json!({ "age_upon_outcome_in_weeks": age }))),
        )
        .unwrap();
        let rows = store
            .aggregate(
                &FilterMap::new(),
                &Aggregation::Bucket {
                    field: "age_upon_outcome_in_weeks".to_string(),
                    boundaries: vec![0, 26, 52],
                    default_key: json!("overflow"),
                },
            )
            .await
            .unwrap();

        assert_eq!(
            rows,
            vec![
                AggregateRow { key: json!(0), count: 2 },
                AggregateRow { key: json!(26), count: 2 },
                AggregateRow { key: json!("overflow"), count: 2 },
            ]
        );
    }

    #[tokio::test]
    async fn test_bucket_rejects_bad_boundaries() {
        let store = sample_store();
        let result = store
            .aggregate(
                &FilterMap::new(),
                &Aggregation::Bucket {
                    field: "age_upon_outcome_in_weeks".to_string(),
                    boundaries: vec![26, 26],
                    default_key: json!("overflow"),
                },
            )
            .await;
        assert!(matches!(result, Err(StoreError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_update_many_counts_matched_and_modified() {
        let store = sample_store();
        let changes = doc(json!({ "breed": "Beagle" }));
        let outcome = store
            .update_many(&filter(json!({ "animal_type": "Dog" })), &changes)
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome { matched: 3, modified: 1 });
    }

    #[tokio::test]
    async fn test_update_cannot_change_primary_key() {
        let store = sample_store();
        let result = store
            .update_many(&FilterMap::new(), &doc(json!({ "_id": 99 })))
            .await;
        assert!(matches!(result, Err(StoreError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_delete_many() {
        let store = sample_store();
        let deleted = store
            .delete_many(&filter(json!({ "animal_type": "Dog" })))
            .await
            .unwrap();
        assert_eq!(deleted, 3);
        assert_eq!(store.len().await, 1);
    }
}
