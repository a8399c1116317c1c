//! Fixed-width age buckets with an overflow bucket.

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::error::{Result, ShelterError};
use crate::store::AggregateRow;

/// Store-side key of the overflow bucket.
pub const OVERFLOW_KEY: &str = "overflow";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistogramBucket {
    /// Inclusive lower bound in weeks
    pub lower: u64,
    /// Exclusive upper bound in weeks, None for the overflow bucket
    pub upper: Option<u64>,
    /// Display label, `[26,52)` or `≥520`
    pub label: String,
    pub count: u64,
}

/// Bucket layout `[0,step), [step,2*step), ..., [max_weeks, ∞)`.
///
/// When `max_weeks` is not a multiple of `step` the last regular bucket is narrower.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistogramLayout {
    step: u64,
    max_weeks: u64,
}

impl HistogramLayout {
    /// Validates a layout of at most `max_buckets` regular buckets.
    pub fn new(step: u64, max_weeks: u64, max_buckets: u64) -> Result<Self> {
        if step == 0 {
            return Err(ShelterError::Validation("step must be at least 1".to_string()));
        }
        if max_weeks == 0 {
            return Err(ShelterError::Validation(
                "max_weeks must be at least 1".to_string(),
            ));
        }
        let buckets = max_weeks.div_ceil(step);
        if buckets > max_buckets {
            return Err(ShelterError::Validation(format!(
                "step {step} over {max_weeks} weeks needs {buckets} buckets, at most {max_buckets} allowed"
            )));
        }
        Ok(Self { step, max_weeks })
    }

    pub fn step(&self) -> u64 {
        self.step
    }

    pub fn max_weeks(&self) -> u64 {
        self.max_weeks
    }

    /// Ascending bucket boundaries, ending with `max_weeks`.
    pub fn boundaries(&self) -> Vec<u64> {
        let mut boundaries: Vec<u64> = (0..self.max_weeks).step_by(self.step as usize).collect();
        boundaries.push(self.max_weeks);
        boundaries
    }

    /// Turns grouped store rows into buckets sorted by lower bound.
    pub fn buckets_from_rows(&self, rows: Vec<AggregateRow>) -> Vec<HistogramBucket> {
        let boundaries = self.boundaries();
        let mut buckets: Vec<HistogramBucket> = rows
            .into_iter()
            .filter_map(|row| self.bucket_for(&boundaries, row))
            .collect();
        buckets.sort_by_key(|bucket| bucket.lower);
        buckets
    }

    fn bucket_for(&self, boundaries: &[u64], row: AggregateRow) -> Option<HistogramBucket> {
        if row.key == Value::from(OVERFLOW_KEY) {
            return Some(HistogramBucket {
                lower: self.max_weeks,
                upper: None,
                label: format!("≥{}", self.max_weeks),
                count: row.count,
            });
        }

        let lower = row.key.as_u64();
        let upper = lower.and_then(|lower| {
            let index = boundaries.iter().position(|b| *b == lower)?;
            boundaries.get(index + 1).copied()
        });
        match (lower, upper) {
            (Some(lower), Some(upper)) => Some(HistogramBucket {
                lower,
                upper: Some(upper),
                label: format!("[{lower},{upper})"),
                count: row.count,
            }),
            _ => {
                warn!(key = %row.key, "Store returned a bucket outside the layout");
                None
            }
        }
    }
}
