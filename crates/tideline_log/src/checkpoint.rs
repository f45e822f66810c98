//! Hash-verified state checkpoints.
//!
//! A checkpoint is a full deep copy of the materialized state at one
//! sequence, captured every Nth applied event so that reconstruction
//! never replays more than one interval. The stored hash must equal the
//! hash of the stored snapshot; anything else marks the checkpoint
//! untrustworthy and replay falls back past it.

use tideline_core::{hash_state, CheckpointId, Digest, SeqNum, Timestamp, Value};

/// A captured state snapshot plus its integrity hash
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    /// Sequence the snapshot was taken at
    pub seq: SeqNum,
    /// Deep copy of the materialized state at `seq`
    pub state: Value,
    /// SHA-256 over the snapshot's canonical form
    pub state_hash: Digest,
    /// True if the snapshot held precision-unsafe numbers when captured
    pub has_unsafe_numbers: bool,
    /// Issued id; all-zero means "none issued" and fails verification
    pub checkpoint_id: CheckpointId,
    /// Capture wall-clock time (metadata only)
    pub created_at: Timestamp,
}

impl Checkpoint {
    /// Capture a checkpoint from the live state.
    ///
    /// The state is deep-cloned: the checkpoint must never alias the
    /// live value, which keeps mutating under later events.
    #[must_use]
    pub fn capture(seq: SeqNum, state: &Value, created_at: Timestamp) -> Self {
        let snapshot = state.clone();
        let hash = hash_state(&snapshot);
        Self {
            seq,
            state: snapshot,
            state_hash: hash.digest,
            has_unsafe_numbers: hash.has_unsafe_numbers,
            checkpoint_id: CheckpointId::generate(),
            created_at,
        }
    }

    /// True iff this checkpoint can anchor a reconstruction: its id was
    /// actually issued and its snapshot still hashes to the stored digest.
    #[must_use]
    pub fn verify(&self) -> bool {
        self.checkpoint_id.is_valid() && hash_state(&self.state).digest == self.state_hash
    }
}

/// Count-bounded, ascending list of checkpoints for one run
#[derive(Debug, Clone)]
pub struct CheckpointList {
    entries: Vec<Checkpoint>,
    capacity: usize,
}

impl CheckpointList {
    /// Create a list holding at most `capacity` checkpoints
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    /// Append a checkpoint, evicting the oldest if the cap is exceeded.
    ///
    /// The newest entry is never evicted: the live state always keeps at
    /// least one checkpoint at or before it to reconstruct from. An
    /// out-of-order push is dropped with a warning.
    pub fn push(&mut self, checkpoint: Checkpoint) -> Option<Checkpoint> {
        if let Some(newest) = self.entries.last() {
            if checkpoint.seq.compare(&newest.seq).is_le() {
                tracing::warn!(
                    seq = %checkpoint.seq,
                    newest = %newest.seq,
                    "dropping out-of-order checkpoint"
                );
                return None;
            }
        }
        self.entries.push(checkpoint);
        if self.entries.len() > self.capacity && self.entries.len() > 1 {
            let evicted = self.entries.remove(0);
            tracing::debug!(seq = %evicted.seq, "evicting oldest checkpoint");
            Some(evicted)
        } else {
            None
        }
    }

    /// Number of stored checkpoints
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no checkpoints are stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The newest checkpoint
    #[must_use]
    pub fn newest(&self) -> Option<&Checkpoint> {
        self.entries.last()
    }

    /// All checkpoints with `seq <= target`, ascending.
    ///
    /// Reconstruction walks these newest-first, skipping any entry that
    /// fails verification.
    #[must_use]
    pub fn at_or_before(&self, target: &SeqNum) -> &[Checkpoint] {
        let cut = self
            .entries
            .partition_point(|cp| cp.seq.compare(target).is_le());
        &self.entries[..cut]
    }

    /// Iterate all checkpoints, ascending
    pub fn iter(&self) -> impl Iterator<Item = &Checkpoint> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state(n: u64) -> Value {
        Value::from_json(json!({"counter": n}))
    }

    fn checkpoint(seq: u64) -> Checkpoint {
        Checkpoint::capture(SeqNum::from(seq), &state(seq), Timestamp::from_millis(seq))
    }

    #[test]
    fn test_capture_hashes_snapshot() {
        let cp = checkpoint(5);
        assert_eq!(cp.state_hash, hash_state(&state(5)).digest);
        assert!(!cp.has_unsafe_numbers);
        assert!(cp.checkpoint_id.is_valid());
        assert!(cp.verify());
    }

    #[test]
    fn test_capture_is_a_deep_copy() {
        let mut live = state(1);
        let cp = Checkpoint::capture(SeqNum::from(1u64), &live, Timestamp::from_millis(0));
        if let Some(entries) = live.as_object_mut() {
            entries.insert("counter".to_string(), Value::from(99.0));
        }
        // The checkpoint must not see the later mutation
        assert_eq!(cp.state.get("counter"), Some(&Value::Number(1.0)));
        assert!(cp.verify());
    }

    #[test]
    fn test_verify_detects_tampering() {
        let mut cp = checkpoint(1);
        cp.state = state(2);
        assert!(!cp.verify());
    }

    #[test]
    fn test_verify_rejects_unissued_id() {
        let mut cp = checkpoint(1);
        cp.checkpoint_id = CheckpointId::from_bytes(vec![0; 16]);
        assert!(!cp.verify());
    }

    #[test]
    fn test_list_bounded_growth() {
        let mut list = CheckpointList::new(3);
        for i in 1..=8 {
            list.push(checkpoint(i));
            assert!(list.len() <= 3);
        }
        assert_eq!(list.len(), 3);
        // Oldest entries went first; the newest survives
        assert_eq!(list.newest().map(|cp| cp.seq.clone()), Some(SeqNum::from(8u64)));
    }

    #[test]
    fn test_list_capacity_one_keeps_newest() {
        let mut list = CheckpointList::new(1);
        list.push(checkpoint(1));
        list.push(checkpoint(2));
        assert_eq!(list.len(), 1);
        assert_eq!(list.newest().map(|cp| cp.seq.clone()), Some(SeqNum::from(2u64)));
    }

    #[test]
    fn test_list_drops_out_of_order() {
        let mut list = CheckpointList::new(4);
        list.push(checkpoint(5));
        list.push(checkpoint(3));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_at_or_before() {
        let mut list = CheckpointList::new(10);
        for i in [2u64, 4, 6] {
            list.push(checkpoint(i));
        }
        let hits = list.at_or_before(&SeqNum::from(5u64));
        assert_eq!(hits.len(), 2);
        assert_eq!(hits.last().map(|cp| cp.seq.clone()), Some(SeqNum::from(4u64)));

        assert!(list.at_or_before(&SeqNum::from(1u64)).is_empty());
        assert_eq!(list.at_or_before(&SeqNum::from(6u64)).len(), 3);
    }
}
