//! Filter Sanitizer
//!
//! Whitelists raw filter input before it reaches any query path.

use std::collections::HashSet;

use serde_json::Value;
use tracing::debug;

use crate::error::{Result, ShelterError};
use crate::filter::FilterMap;

/// Outcome of sanitizing a filter, with the keys that were dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SanitizeReport {
    /// The sanitized filter
    pub filters: FilterMap,
    /// Keys removed because they are not allowed or carry a null value
    pub dropped: Vec<String>,
}

// == Filter Sanitizer ==
/// Keeps only allow-listed, non-null filter keys. Values pass through untouched.
#[derive(Debug, Clone)]
pub struct FilterSanitizer {
    allowed: HashSet<String>,
}

impl FilterSanitizer {
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns true if `field` may appear in a sanitized filter.
    pub fn is_allowed(&self, field: &str) -> bool {
        self.allowed.contains(field)
    }

    /// Sanitizes raw caller input.
    ///
    /// Absent or null input yields an empty filter. Anything that is not a JSON
    /// object fails with [`ShelterError::Validation`].
    pub fn sanitize(&self, raw: Option<&Value>) -> Result<FilterMap> {
        self.sanitize_with_report(raw).map(|report| report.filters)
    }

    /// Same as [`sanitize`](Self::sanitize), also listing the dropped keys.
    pub fn sanitize_with_report(&self, raw: Option<&Value>) -> Result<SanitizeReport> {
        match raw {
            None | Some(Value::Null) => Ok(SanitizeReport::default()),
            Some(Value::Object(map)) => Ok(self.sanitize_map(map)),
            Some(other) => Err(ShelterError::Validation(format!(
                "filters must be an object, got {}",
                json_kind(other)
            ))),
        }
    }

    /// Sanitizes an already map-shaped filter.
    pub fn sanitize_map(&self, raw: &FilterMap) -> SanitizeReport {
        let mut report = SanitizeReport::default();
        for (key, value) in raw {
            if value.is_null() || !self.is_allowed(key) {
                report.dropped.push(key.clone());
                continue;
            }
            report.filters.insert(key.clone(), value.clone());
        }

        if !report.dropped.is_empty() {
            debug!(dropped = ?report.dropped, "Dropped filter keys");
        }
        report
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
