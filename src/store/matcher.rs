//! Filter evaluation against documents, used by [`MemoryStore`](super::MemoryStore).

use std::cmp::Ordering;

use serde_json::Value;

use crate::filter::FilterMap;
use crate::store::{Document, StoreError, StoreResult};

/// Total order over JSON values: null < bool < number < string < array < object.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
                return x.cmp(&y);
            }
            if let (Some(x), Some(y)) = (x.as_u64(), y.as_u64()) {
                return x.cmp(&y);
            }
            let (x, y) = (x.as_f64().unwrap_or(f64::NAN), y.as_f64().unwrap_or(f64::NAN));
            x.total_cmp(&y)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => x
            .iter()
            .zip(y.iter())
            .map(|(x, y)| compare_values(x, y))
            .find(|ord| ord.is_ne())
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        (Value::Object(_), Value::Object(_)) => a.to_string().cmp(&b.to_string()),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Returns true if `document` satisfies every condition of `filter`.
///
/// Missing fields evaluate as null. Range operators only match values of the
/// same JSON type as their operand.
pub fn matches(document: &Document, filter: &FilterMap) -> StoreResult<bool> {
    for (field, condition) in filter {
        let actual = document.get(field).unwrap_or(&Value::Null);
        if !condition_holds(actual, condition)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn condition_holds(actual: &Value, condition: &Value) -> StoreResult<bool> {
    let operators = match condition {
        Value::Object(map) if !map.is_empty() && map.keys().all(|k| k.starts_with('$')) => map,
        _ => return Ok(values_equal(actual, condition)),
    };

    for (op, operand) in operators {
        let holds = match op.as_str() {
            "$eq" => values_equal(actual, operand),
            "$ne" => !values_equal(actual, operand),
            "$in" => set_operand(op, operand)?
                .iter()
                .any(|v| values_equal(actual, v)),
            "$nin" => !set_operand(op, operand)?
                .iter()
                .any(|v| values_equal(actual, v)),
            "$gt" => comparable(actual, operand).is_some_and(Ordering::is_gt),
            "$gte" => comparable(actual, operand).is_some_and(Ordering::is_ge),
            "$lt" => comparable(actual, operand).is_some_and(Ordering::is_lt),
            "$lte" => comparable(actual, operand).is_some_and(Ordering::is_le),
            other => {
                return Err(StoreError::Rejected(format!(
                    "unsupported operator {other}"
                )))
            }
        };
        if !holds {
            return Ok(false);
        }
    }
    Ok(true)
}

fn values_equal(a: &Value, b: &Value) -> bool {
    compare_values(a, b).is_eq()
}

fn comparable(actual: &Value, operand: &Value) -> Option<Ordering> {
    (type_rank(actual) == type_rank(operand)).then(|| compare_values(actual, operand))
}

fn set_operand<'a>(op: &str, operand: &'a Value) -> StoreResult<&'a Vec<Value>> {
    operand
        .as_array()
        .ok_or_else(|| StoreError::Rejected(format!("{op} needs an array operand")))
}
