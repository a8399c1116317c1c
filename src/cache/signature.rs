//! Signature Module
//!
//! Derives order-independent cache keys from filter maps and extra parameters.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde_json::{Number, Value};

use crate::filter::FilterMap;

/// Operators whose operand is a set: element order and duplicates are irrelevant.
const SET_OPERATORS: &[&str] = &["$in", "$nin"];

// == Frozen Value ==
/// Hashable, totally ordered rendition of a JSON value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Frozen {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    /// IEEE-754 bits of a non-integral value
    Float(u64),
    String(String),
    Seq(Vec<Frozen>),
    /// Entries sorted by key
    Map(Vec<(String, Frozen)>),
}

impl Frozen {
    /// Recursively normalizes `value`.
    ///
    /// Maps become key-sorted entry lists. Sequences keep their order, except the
    /// operand of a set operator (`$in`, `$nin`) which is sorted and de-duplicated.
    /// Numbers that compare equal freeze equal: `10`, `10.0` and `-0.0`/`0` pairs alike.
    pub fn freeze(value: &Value) -> Self {
        match value {
            Value::Null => Frozen::Null,
            Value::Bool(b) => Frozen::Bool(*b),
            Value::Number(n) => freeze_number(n),
            Value::String(s) => Frozen::String(s.clone()),
            Value::Array(items) => Frozen::Seq(items.iter().map(Frozen::freeze).collect()),
            Value::Object(map) => {
                let mut entries: Vec<(String, Frozen)> = map
                    .iter()
                    .map(|(key, value)| {
                        let frozen = if SET_OPERATORS.contains(&key.as_str()) {
                            freeze_set(value)
                        } else {
                            Frozen::freeze(value)
                        };
                        (key.clone(), frozen)
                    })
                    .collect();
                entries.sort_by(|a, b| a.0.cmp(&b.0));
                Frozen::Map(entries)
            }
        }
    }
}

fn freeze_number(n: &Number) -> Frozen {
    if let Some(i) = n.as_i64() {
        Frozen::Int(i)
    } else if let Some(u) = n.as_u64() {
        Frozen::UInt(u)
    } else {
        freeze_float(n.as_f64().unwrap_or(f64::NAN))
    }
}

/// Integral floats fold into the integer they equal, so `10.0` keys like `10`.
fn freeze_float(f: f64) -> Frozen {
    const I64_BOUND: f64 = 9_223_372_036_854_775_808.0; // 2^63
    const U64_BOUND: f64 = 18_446_744_073_709_551_616.0; // 2^64

    if f.fract() == 0.0 {
        if (-I64_BOUND..I64_BOUND).contains(&f) {
            return Frozen::Int(f as i64);
        }
        if (0.0..U64_BOUND).contains(&f) {
            return Frozen::UInt(f as u64);
        }
    }
    Frozen::Float(f.to_bits())
}

fn freeze_set(value: &Value) -> Frozen {
    match value {
        Value::Array(items) => {
            let mut members: Vec<Frozen> = items.iter().map(Frozen::freeze).collect();
            members.sort();
            members.dedup();
            Frozen::Seq(members)
        }
        other => Frozen::freeze(other),
    }
}

// == Signature ==
/// Cache key for a (filter, extra parameters) combination.
///
/// Two filters with the same keys and values produce the same signature no matter
/// the insertion order of their keys. Extras are positional.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    filters: Frozen,
    extras: Vec<Frozen>,
}

impl Signature {
    /// Stable 64-bit digest, handy for log correlation.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

/// Builds the signature of `filters` plus positional `extras`. Pure and deterministic.
pub fn build_signature(filters: &FilterMap, extras: &[Value]) -> Signature {
    Signature {
        filters: Frozen::freeze(&Value::Object(filters.clone())),
        extras: extras.iter().map(Frozen::freeze).collect(),
    }
}
