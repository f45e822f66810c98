//! Core error types for TIDELINE.

use std::fmt;

/// Core result type
pub type CoreResult<T> = Result<T, CoreError>;

/// Core error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A sequence number string that does not encode a decimal integer
    InvalidSeq {
        /// The rejected input, truncated for display
        input: String,
    },

    /// Invalid hex encoding
    InvalidHex,

    /// Invalid digest length (not 32 bytes)
    InvalidLength(usize),

    /// Hash mismatch between a stored and a recomputed digest
    HashMismatch {
        /// Hex of the digest that was expected
        expected: String,
        /// Hex of the digest that was computed
        actual: String,
    },
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSeq { input } => write!(f, "Invalid sequence number: {:?}", input),
            Self::InvalidHex => write!(f, "Invalid hex encoding"),
            Self::InvalidLength(len) => {
                write!(f, "Invalid digest length: {} (expected 32)", len)
            }
            Self::HashMismatch { expected, actual } => {
                write!(f, "Hash mismatch: expected {}, got {}", expected, actual)
            }
        }
    }
}

impl std::error::Error for CoreError {}
