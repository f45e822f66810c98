//! Store configuration surface.
//!
//! The options arrive from an external query-string parser as raw
//! key/value strings. A malformed value leaves its field at the previous
//! value; one bad option never fails the whole parse.

use serde::{Deserialize, Serialize};

/// Tunable limits for the run-state store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Cap on buffered events per run (FIFO eviction past it)
    pub max_events_per_run: usize,
    /// Cap on concurrently observed runs
    pub max_runs: usize,
    /// A checkpoint is captured every this many applied events
    pub checkpoint_interval: usize,
    /// Cap on stored checkpoints per run
    pub max_checkpoints_per_run: usize,
    /// Ceiling on one checkpoint snapshot's canonical size
    pub max_checkpoint_state_size_bytes: usize,
    /// Ceiling on the live materialized state's canonical size
    pub max_full_state_size_bytes: usize,
    /// Ceiling on the stored schema's canonical size
    pub max_schema_json_size_bytes: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_events_per_run: 2048,
            max_runs: 16,
            checkpoint_interval: 20,
            max_checkpoints_per_run: 8,
            max_checkpoint_state_size_bytes: 2 * 1024 * 1024,
            max_full_state_size_bytes: 8 * 1024 * 1024,
            max_schema_json_size_bytes: 256 * 1024,
        }
    }
}

impl StoreConfig {
    /// Apply one recognized option from an external parser.
    ///
    /// Returns true if the option was recognized and valid. Unknown keys
    /// and malformed values are ignored (the field keeps its previous
    /// value) and reported at debug level.
    pub fn apply_option(&mut self, key: &str, value: &str) -> bool {
        let applied = match key {
            "maxEventsPerRun" => apply_count(&mut self.max_events_per_run, value),
            "maxRuns" => apply_count(&mut self.max_runs, value),
            "checkpointInterval" => apply_count(&mut self.checkpoint_interval, value),
            "maxCheckpointsPerRun" => apply_count(&mut self.max_checkpoints_per_run, value),
            "maxCheckpointStateSizeBytes" => {
                apply_bytes(&mut self.max_checkpoint_state_size_bytes, value)
            }
            "maxFullStateSizeBytes" => apply_bytes(&mut self.max_full_state_size_bytes, value),
            "maxSchemaJsonSizeBytes" => apply_bytes(&mut self.max_schema_json_size_bytes, value),
            _ => false,
        };
        if !applied {
            tracing::debug!(key, value, "ignoring unrecognized or malformed option");
        }
        applied
    }
}

fn apply_count(field: &mut usize, value: &str) -> bool {
    match value.parse::<usize>() {
        Ok(n) if n > 0 => {
            *field = n;
            true
        }
        _ => false,
    }
}

fn apply_bytes(field: &mut usize, value: &str) -> bool {
    match parse_byte_size(value) {
        Some(n) if n > 0 => {
            *field = n;
            true
        }
        _ => false,
    }
}

/// Parse a byte count with an optional case-insensitive K/M/G suffix
/// (x1024, x1024^2, x1024^3).
#[must_use]
pub fn parse_byte_size(value: &str) -> Option<usize> {
    let trimmed = value.trim();
    let (digits, multiplier) = match trimmed.chars().last() {
        Some('k') | Some('K') => (&trimmed[..trimmed.len() - 1], 1024usize),
        Some('m') | Some('M') => (&trimmed[..trimmed.len() - 1], 1024 * 1024),
        Some('g') | Some('G') => (&trimmed[..trimmed.len() - 1], 1024 * 1024 * 1024),
        _ => (trimmed, 1),
    };
    digits
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
}
