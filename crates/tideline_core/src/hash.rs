//! State integrity hashing.
//!
//! SHA-256 over the UTF-8 bytes of the canonical string form. The digest
//! must match, byte for byte, the checksum the producer attaches to its
//! checkpoints, so the canonical form is the only thing that feeds it.

use crate::canon::canonicalize;
use crate::error::CoreError;
use crate::value::{decimal_exceeds_safe, Slot, Value};
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use std::fmt;

/// Largest integer exactly representable as a double: 2^53 - 1.
pub const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// A SHA-256 digest (256 bits / 32 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Digest([u8; 32]);

impl Digest {
    /// The number of bytes in a digest
    pub const LEN: usize = 32;

    /// Compute the SHA-256 digest of raw bytes
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    /// The all-zero digest, used as "nothing hashed yet"
    #[must_use]
    pub const fn empty() -> Self {
        Self([0u8; 32])
    }

    /// Create from bytes
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get as bytes
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string
    ///
    /// # Errors
    ///
    /// Returns error if hex is invalid or not 32 bytes
    pub fn from_hex(hex_str: &str) -> Result<Self, CoreError> {
        let bytes = hex::decode(hex_str).map_err(|_| CoreError::InvalidHex)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|rejected: Vec<u8>| CoreError::InvalidLength(rejected.len()))?;
        Ok(Self(arr))
    }

    /// Check if this digest matches the given data
    #[must_use]
    pub fn verify(&self, data: &[u8]) -> bool {
        Self::compute(data) == *self
    }
}

impl Default for Digest {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Result of hashing one state.
///
/// The precision flag rides alongside the digest instead of living in any
/// shared scratch state, so interleaved hash calls can never bleed into
/// each other's results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateHash {
    /// SHA-256 over the canonical form
    pub digest: Digest,
    /// True if any numeric leaf exceeds 2^53 - 1 in magnitude; such a
    /// value may have lost precision before it reached this process, so
    /// the digest proves transport integrity but not the producer's
    /// original value.
    pub has_unsafe_numbers: bool,
}

/// Hash a state value. Pure: no caches, no shared flags.
#[must_use]
pub fn hash_state(value: &Value) -> StateHash {
    let canonical = canonicalize(value);
    StateHash {
        digest: Digest::compute(canonical.as_bytes()),
        has_unsafe_numbers: has_unsafe_numbers(value),
    }
}

fn has_unsafe_numbers(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.is_finite() && n.abs() > MAX_SAFE_INTEGER,
        Value::BigInt(digits) => decimal_exceeds_safe(digits.trim_start_matches('-')),
        Value::Array(slots) => slots.iter().any(|slot| match slot {
            Slot::Hole => false,
            Slot::Item(v) => has_unsafe_numbers(v),
        }),
        Value::Object(entries) => entries.values().any(has_unsafe_numbers),
        Value::Undefined | Value::Null | Value::Bool(_) | Value::String(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hash_json(json: serde_json::Value) -> StateHash {
        hash_state(&Value::from_json(json))
    }

    #[test]
    fn test_digest_compute() {
        let digest = Digest::compute(b"hello world");
        assert_eq!(digest.to_hex().len(), 64);
    }

    #[test]
    fn test_digest_from_to_hex() {
        let digest = Digest::compute(b"test");
        let restored = Digest::from_hex(&digest.to_hex()).unwrap();
        assert_eq!(digest, restored);
    }

    #[test]
    fn test_digest_from_hex_rejects_bad_input() {
        assert_eq!(Digest::from_hex("zz"), Err(CoreError::InvalidHex));
        assert_eq!(Digest::from_hex("abcd"), Err(CoreError::InvalidLength(2)));
    }

    #[test]
    fn test_digest_verify() {
        let digest = Digest::compute(b"payload");
        assert!(digest.verify(b"payload"));
        assert!(!digest.verify(b"other"));
    }

    #[test]
    fn test_companion_interop_vector() {
        // The shared fixture: key order must not matter and the digest is
        // pinned against the producer-side implementation.
        let h = hash_json(json!({"b": 2, "a": 1, "nested": {"z": "x", "y": [true, null]}}));
        assert_eq!(
            h.digest.to_hex(),
            "f35279c8aa6b00bc82d43a191596cc3b41b7de7899ee16e36a08efe3afc45103"
        );
        assert!(!h.has_unsafe_numbers);
    }

    #[test]
    fn test_empty_containers() {
        assert_eq!(
            hash_json(json!({})).digest.to_hex(),
            "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a"
        );
        assert_eq!(
            hash_json(json!([])).digest.to_hex(),
            "4f53cda18c2baa0c0354bb5f9a3ecbe5ed12ab4d8e11ba873c2f11161202b945"
        );
    }

    #[test]
    fn test_hash_is_stable_across_calls() {
        let v = Value::from_json(json!({"a": [1, 2, 3], "b": "x"}));
        assert_eq!(hash_state(&v), hash_state(&v));
    }

    #[test]
    fn test_unsafe_number_boundary() {
        assert!(!hash_json(json!({"n": 9007199254740991u64})).has_unsafe_numbers);
        assert!(hash_json(json!({"n": 9007199254740993u64})).has_unsafe_numbers);
        assert!(hash_json(json!({"n": -9007199254740993i64})).has_unsafe_numbers);
        assert!(hash_json(json!({"nested": [{"n": 9007199254740993u64}]})).has_unsafe_numbers);
    }

    #[test]
    fn test_unsafe_flag_does_not_alter_digest() {
        let safe = hash_json(json!({"n": "9007199254740993"}));
        let unsafe_state = hash_json(json!({"n": 9007199254740993u64}));
        // Same canonical form (quoted decimal string), same digest, but
        // only the genuinely numeric state raises the flag.
        assert_eq!(safe.digest, unsafe_state.digest);
        assert!(!safe.has_unsafe_numbers);
        assert!(unsafe_state.has_unsafe_numbers);
    }

    #[test]
    fn test_concurrent_calls_are_isolated() {
        use std::thread;

        let handles: Vec<_> = (0..8)
            .map(|i| {
                thread::spawn(move || {
                    let mut flags = Vec::new();
                    for _ in 0..200 {
                        let h = if i % 2 == 0 {
                            hash_json(json!({"n": 9007199254740993u64}))
                        } else {
                            hash_json(json!({"n": 1}))
                        };
                        flags.push(h.has_unsafe_numbers);
                    }
                    (i, flags)
                })
            })
            .collect();

        for handle in handles {
            let (i, flags) = handle.join().unwrap();
            let expected = i % 2 == 0;
            assert!(flags.iter().all(|&f| f == expected));
        }
    }
}
