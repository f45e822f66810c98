//! Dynamically-shaped run state as a closed tagged value tree.
//!
//! Producers emit arbitrary JSON, but the canonicalizer and differ need
//! exhaustive recursion, so the tree is a closed enum rather than
//! `serde_json::Value`. Two things JSON cannot express are first-class
//! here: `undefined` leaves (omitted from objects, nulled in arrays) and
//! array holes (preserved as holes).

use indexmap::IndexMap;
use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// A JSON-like value as observed from a producer.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// An `undefined` leaf (not representable in JSON)
    Undefined,
    /// JSON null
    Null,
    /// JSON boolean
    Bool(bool),
    /// A finite or non-finite double-precision number
    Number(f64),
    /// An integer outside native float precision, as normalized decimal digits
    BigInt(String),
    /// JSON string
    String(String),
    /// JSON array; holes are preserved, not coerced to null
    Array(Vec<Slot>),
    /// JSON object with insertion order retained
    Object(IndexMap<String, Value>),
}

/// One position in an array: either a hole or a value.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    /// A sparse-array hole
    Hole,
    /// A present element
    Item(Value),
}

/// Largest integer exactly representable as a double (2^53 - 1), in decimal.
const MAX_SAFE_DECIMAL: &str = "9007199254740991";

impl Value {
    /// Create an empty object
    #[must_use]
    pub fn object() -> Self {
        Self::Object(IndexMap::new())
    }

    /// Create an empty array
    #[must_use]
    pub fn array() -> Self {
        Self::Array(Vec::new())
    }

    /// Create a big integer from decimal digits with an optional leading `-`.
    ///
    /// Returns `None` if the input is not a decimal integer. The stored
    /// form is normalized: no leading zeros, no `-0`.
    #[must_use]
    pub fn big_int(digits: &str) -> Option<Self> {
        normalize_decimal(digits).map(Self::BigInt)
    }

    /// Convert an ingress `serde_json::Value` into a value tree.
    ///
    /// Integers beyond 2^53 - 1 become `BigInt` so that no precision is
    /// lost before hashing; everything else maps one-to-one.
    #[must_use]
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    if i.unsigned_abs() <= MAX_SAFE_INTEGER_U64 {
                        Self::Number(i as f64)
                    } else {
                        Self::BigInt(i.to_string())
                    }
                } else if let Some(u) = n.as_u64() {
                    if u <= MAX_SAFE_INTEGER_U64 {
                        Self::Number(u as f64)
                    } else {
                        Self::BigInt(u.to_string())
                    }
                } else {
                    Self::Number(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => Self::Array(
                items
                    .into_iter()
                    .map(|item| Slot::Item(Self::from_json(item)))
                    .collect(),
            ),
            serde_json::Value::Object(entries) => Self::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Project back onto plain JSON.
    ///
    /// `Undefined` and holes collapse to null and big integers become
    /// decimal strings; this is a lossy export for consumers, not a
    /// round-trip format.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Undefined | Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::BigInt(digits) => serde_json::Value::String(digits.clone()),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Array(slots) => serde_json::Value::Array(
                slots
                    .iter()
                    .map(|slot| match slot {
                        Slot::Hole => serde_json::Value::Null,
                        Slot::Item(v) => v.to_json(),
                    })
                    .collect(),
            ),
            Self::Object(entries) => serde_json::Value::Object(
                entries
                    .iter()
                    .filter(|(_, v)| !matches!(v, Self::Undefined))
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }

    /// True for `Undefined`
    #[must_use]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// View as an object map
    #[must_use]
    pub fn as_object(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Self::Object(entries) => Some(entries),
            _ => None,
        }
    }

    /// View as a mutable object map
    pub fn as_object_mut(&mut self) -> Option<&mut IndexMap<String, Value>> {
        match self {
            Self::Object(entries) => Some(entries),
            _ => None,
        }
    }

    /// View as a string slice
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// View as a number
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Look up an object entry by key
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|entries| entries.get(key))
    }
}

/// 2^53 - 1 as an integer, the boundary `from_json` keeps in `Number`.
const MAX_SAFE_INTEGER_U64: u64 = 9_007_199_254_740_991;

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Self::from_json)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        if i.unsigned_abs() <= MAX_SAFE_INTEGER_U64 {
            Self::Number(i as f64)
        } else {
            Self::BigInt(i.to_string())
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

/// Check whether a decimal magnitude (digits only, no sign) exceeds 2^53 - 1.
#[must_use]
pub(crate) fn decimal_exceeds_safe(digits: &str) -> bool {
    let trimmed = digits.trim_start_matches('0');
    match trimmed.len().cmp(&MAX_SAFE_DECIMAL.len()) {
        std::cmp::Ordering::Greater => true,
        std::cmp::Ordering::Less => false,
        std::cmp::Ordering::Equal => trimmed > MAX_SAFE_DECIMAL,
    }
}

/// Normalize a signed decimal string: strip leading zeros, collapse `-0`.
pub(crate) fn normalize_decimal(input: &str) -> Option<String> {
    let (negative, digits) = match input.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, input),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let trimmed = digits.trim_start_matches('0');
    if trimmed.is_empty() {
        return Some("0".to_string());
    }
    Some(if negative {
        format!("-{}", trimmed)
    } else {
        trimmed.to_string()
    })
}
