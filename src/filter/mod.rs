//! Filter Module
//!
//! Filter maps as they travel from the UI to the store, and the sanitization boundary
//! every filter crosses before reaching an aggregation or pagination path.

mod sanitize;

pub use sanitize::{FilterSanitizer, SanitizeReport};

use serde::Deserialize;
use serde_json::{json, Map, Value};

// == Field Names ==
pub const SPECIES_FIELD: &str = "animal_type";
pub const SEX_FIELD: &str = "sex_upon_outcome";
pub const AGE_FIELD: &str = "age_upon_outcome_in_weeks";
pub const BREED_FIELD: &str = "breed";

/// Field name to condition. A condition is a scalar (equality), a range object
/// (`{"$gte": a, "$lte": b}`) or a set-membership object (`{"$in": [..]}`).
pub type FilterMap = Map<String, Value>;

// == Filter Selection ==
/// Typed selection coming from the UI's filter controls.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterSelection {
    /// Selected species, e.g. `["Dog", "Cat"]`
    #[serde(default)]
    pub species: Vec<String>,
    /// Selected sex-upon-outcome values
    #[serde(default)]
    pub sex: Vec<String>,
    /// Inclusive age range in weeks
    #[serde(default)]
    pub age_range: Option<(i64, i64)>,
}

impl FilterSelection {
    /// Builds the raw filter map for this selection.
    ///
    /// Empty selections add no condition. The result still has to go through
    /// [`FilterSanitizer`] before it is used.
    pub fn to_filter_map(&self) -> FilterMap {
        let mut filters = FilterMap::new();
        if !self.species.is_empty() {
            filters.insert(SPECIES_FIELD.to_string(), json!({ "$in": self.species }));
        }
        if !self.sex.is_empty() {
            filters.insert(SEX_FIELD.to_string(), json!({ "$in": self.sex }));
        }
        if let Some((low, high)) = self.age_range {
            filters.insert(
                AGE_FIELD.to_string(),
                json!({ "$gte": low.min(high), "$lte": low.max(high) }),
            );
        }
        filters
    }
}
