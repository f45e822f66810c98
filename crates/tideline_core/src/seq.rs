//! Sequence arithmetic over producer-issued sequence numbers.
//!
//! The producer encodes sequence numbers as decimal strings because they
//! can outgrow every native integer width on the wire. Ordering must stay
//! exact past 2^63, so comparison works on the normalized digit string
//! and no floating point is involved anywhere.
//!
//! `"0"` is the wire-format default meaning "unassigned"; negative values
//! are synthetic, locally-originated placeholders. Neither is a real
//! ordering position.

use crate::error::CoreError;
use crate::value::normalize_decimal;
use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// An arbitrarily large signed integer sequence number, held in
/// normalized decimal form (no leading zeros, no `-0`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeqNum(String);

impl SeqNum {
    /// The unassigned sequence, `"0"`
    #[must_use]
    pub fn zero() -> Self {
        Self("0".to_string())
    }

    /// Parse a decimal-string encoding.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidSeq` if the input is not an optionally
    /// negated run of ASCII digits.
    pub fn parse(input: &str) -> Result<Self, CoreError> {
        normalize_decimal(input).map(Self).ok_or_else(|| {
            let mut shown = input.to_string();
            shown.truncate(32);
            CoreError::InvalidSeq { input: shown }
        })
    }

    /// The normalized decimal encoding
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True iff this is a real, server-assigned ordering position
    /// (strictly greater than zero). Zero (unassigned) and negatives
    /// (synthetic placeholders) both fail this, for different reasons.
    #[must_use]
    pub fn is_real(&self) -> bool {
        !self.is_zero() && !self.is_synthetic()
    }

    /// True iff this is the unassigned sequence
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == "0"
    }

    /// True iff this is a locally-originated placeholder (negative)
    #[must_use]
    pub fn is_synthetic(&self) -> bool {
        self.0.starts_with('-')
    }

    /// Exact total-order comparison
    #[must_use]
    pub fn compare(&self, other: &Self) -> Ordering {
        match (self.is_synthetic(), other.is_synthetic()) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => compare_magnitudes(&self.0, &other.0),
            (true, true) => compare_magnitudes(&other.0[1..], &self.0[1..]),
        }
    }
}

/// Compare two normalized non-negative digit strings.
fn compare_magnitudes(a: &str, b: &str) -> Ordering {
    match a.len().cmp(&b.len()) {
        Ordering::Equal => a.cmp(b),
        unequal => unequal,
    }
}

impl Ord for SeqNum {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl PartialOrd for SeqNum {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for SeqNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SeqNum {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<u64> for SeqNum {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

impl From<i64> for SeqNum {
    fn from(n: i64) -> Self {
        Self(n.to_string())
    }
}

impl Serialize for SeqNum {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for SeqNum {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
