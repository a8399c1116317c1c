//! Request DTOs for the HTTP surface
//!
//! Filters arrive raw and unsanitized, either as a filter map, as a typed
//! selection from the UI controls, or both.

use serde::Deserialize;
use serde_json::Value;

use crate::filter::FilterSelection;

/// Filter part shared by every read request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterInput {
    /// Raw filter map
    #[serde(default)]
    pub filters: Option<Value>,
    /// Typed selection; its conditions override same-named keys of `filters`
    #[serde(default)]
    pub selection: Option<FilterSelection>,
}

impl FilterInput {
    /// Combines `filters` and `selection` into one raw filter value.
    ///
    /// A non-object `filters` is returned untouched so that sanitization rejects it.
    pub fn resolve(&self) -> Option<Value> {
        let Some(selection) = &self.selection else {
            return self.filters.clone();
        };
        match &self.filters {
            None | Some(Value::Null) => Some(Value::Object(selection.to_filter_map())),
            Some(Value::Object(map)) => {
                let mut merged = map.clone();
                merged.extend(selection.to_filter_map());
                Some(Value::Object(merged))
            }
            Some(other) => Some(other.clone()),
        }
    }
}

/// Request body for POST /animals/page
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageRequest {
    #[serde(flatten)]
    pub input: FilterInput,
    /// Token from the previous page; absent or empty for the first page
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default)]
    pub page_size: Option<usize>,
}

/// Request body for POST /animals/count
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CountRequest {
    #[serde(flatten)]
    pub input: FilterInput,
}

/// Request body for POST /metrics/top-breeds
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TopBreedsRequest {
    #[serde(flatten)]
    pub input: FilterInput,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Request body for POST /metrics/age-histogram
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistogramRequest {
    #[serde(flatten)]
    pub input: FilterInput,
    /// Bucket width in weeks
    #[serde(default)]
    pub step: Option<u64>,
    /// Overflow threshold in weeks
    #[serde(default)]
    pub max_weeks: Option<u64>,
}

/// Request body for POST /animals
#[derive(Debug, Clone, Deserialize)]
pub struct CreateRequest {
    pub document: Value,
}

/// Request body for PATCH /animals
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateRequest {
    pub filter: Value,
    pub changes: Value,
}

/// Request body for DELETE /animals
#[derive(Debug, Clone, Deserialize)]
pub struct DeleteRequest {
    pub filter: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_page_request_deserialize() {
        let json = r#"{"filters": {"breed": "Beagle"}, "cursor": "abc", "page_size": 10}"#;
        let req: PageRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.input.filters, Some(json!({ "breed": "Beagle" })));
        assert_eq!(req.cursor.as_deref(), Some("abc"));
        assert_eq!(req.page_size, Some(10));
    }

    #[test]
    fn test_empty_body_is_first_unfiltered_page() {
        let req: PageRequest = serde_json::from_str("{}").unwrap();
        assert!(req.input.resolve().is_none());
        assert!(req.cursor.is_none());
        assert!(req.page_size.is_none());
    }

    #[test]
    fn test_selection_overrides_filters() {
        let json = r#"{
            "filters": {"breed": "Beagle", "animal_type": "Cat"},
            "selection": {"species": ["Dog"]},
            "limit": 3
        }"#;
        let req: TopBreedsRequest = serde_json::from_str(json).unwrap();
        let resolved = req.input.resolve().unwrap();

        assert_eq!(resolved["breed"], json!("Beagle"));
        assert_eq!(resolved["animal_type"], json!({ "$in": ["Dog"] }));
        assert_eq!(req.limit, Some(3));
    }

    #[test]
    fn test_non_object_filters_survive_resolution() {
        let input = FilterInput {
            filters: Some(json!([1])),
            selection: Some(FilterSelection::default()),
        };
        assert_eq!(input.resolve(), Some(json!([1])));
    }

    #[test]
    fn test_histogram_request_deserialize() {
        let json = r#"{"step": 52, "max_weeks": 260}"#;
        let req: HistogramRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.step, Some(52));
        assert_eq!(req.max_weeks, Some(260));
    }

    #[test]
    fn test_update_request_requires_both_parts() {
        assert!(serde_json::from_str::<UpdateRequest>(r#"{"filter": {}}"#).is_err());
    }
}
