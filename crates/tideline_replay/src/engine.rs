//! Checkpoint-and-replay reconstruction.
//!
//! "What was the state at sequence N" is answered from the nearest
//! trusted checkpoint at or before N plus a forward replay of the
//! buffered events in between. Replay always runs on clones; the live
//! state and its buffers are never touched, so a reconstruction
//! superseded by a newer cursor move can simply be discarded.

use crate::apply::{apply_event, initial_state};
use crate::diff::diff;
use crate::store::{RunState, RunStore};
use tideline_core::{SeqNum, ThreadId, Value};
use tideline_log::StoreConfig;

/// Why a reconstruction could not be served
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplayError {
    /// The run is not (or no longer) observed
    #[error("unknown run: {0}")]
    UnknownRun(ThreadId),
    /// Events needed for the target span were evicted; the state at this
    /// point is unavailable, not approximated
    #[error("history for run {thread_id} at seq {target} is no longer retained")]
    HistoryUnavailable {
        /// The run whose history is gone
        thread_id: ThreadId,
        /// The unreachable target sequence
        target: SeqNum,
    },
}

/// What a reconstruction started from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayBase {
    /// The empty initial state (full replay)
    Empty,
    /// A verified checkpoint at this sequence
    Checkpoint(SeqNum),
}

/// A materialized state at one timeline position
#[derive(Debug, Clone, PartialEq)]
pub struct Reconstruction {
    /// The run this was reconstructed for
    pub thread_id: ThreadId,
    /// The requested sequence
    pub at: SeqNum,
    /// The reconstructed state (an independent deep copy)
    pub state: Value,
    /// What the replay started from
    pub base: ReplayBase,
    /// How many buffered events were replayed on top of the base
    pub replayed_events: usize,
    /// Pointer paths that changed versus the previous materialization
    pub changed_paths: Vec<String>,
}

/// Reconstruct the state of one run at `target` without touching the
/// run's buffers. Checkpoints that fail verification (hash mismatch or
/// unissued id) are skipped with a warning, falling back to the next
/// older anchor and finally to full replay from the empty state.
pub(crate) fn reconstruct(
    run: &RunState,
    target: &SeqNum,
    config: &StoreConfig,
) -> Result<(Value, ReplayBase, usize), ReplayError> {
    let mut base_state = None;
    for checkpoint in run.checkpoints.at_or_before(target).iter().rev() {
        if checkpoint.verify() {
            base_state = Some((checkpoint.state.clone(), checkpoint.seq.clone()));
            break;
        }
        tracing::warn!(
            run = %run.thread_id(),
            seq = %checkpoint.seq,
            "checkpoint failed verification, falling back"
        );
    }

    let (mut state, base, after) = match base_state {
        Some((state, seq)) => (state, ReplayBase::Checkpoint(seq.clone()), Some(seq)),
        None => (initial_state(), ReplayBase::Empty, None),
    };

    if run.events.has_gap(after.as_ref(), target) {
        return Err(ReplayError::HistoryUnavailable {
            thread_id: run.thread_id().clone(),
            target: target.clone(),
        });
    }

    let mut replayed = 0;
    for event in run.events.range(after.as_ref(), target) {
        apply_event(&mut state, event, config);
        replayed += 1;
    }

    Ok((state, base, replayed))
}

impl RunStore {
    /// Reconstruct the state of a run at `target` and report what changed
    /// versus the previous materialization.
    ///
    /// The returned state is an independent deep copy; holding it across
    /// later ingests is safe.
    ///
    /// # Errors
    ///
    /// [`ReplayError::UnknownRun`] if the run is not observed;
    /// [`ReplayError::HistoryUnavailable`] if the target span needs
    /// evicted events.
    pub fn reconstruct_at(
        &mut self,
        thread_id: &ThreadId,
        target: &SeqNum,
    ) -> Result<Reconstruction, ReplayError> {
        let config = self.config().clone();
        let run = self
            .run_mut(thread_id)
            .ok_or_else(|| ReplayError::UnknownRun(thread_id.clone()))?;

        let (state, base, replayed_events) = reconstruct(run, target, &config)?;

        let changed_paths = match &run.last_materialized {
            Some(previous) => diff(&state, previous),
            None => diff(&state, &Value::Null),
        };
        run.last_materialized = Some(state.clone());

        Ok(Reconstruction {
            thread_id: thread_id.clone(),
            at: target.clone(),
            state,
            base,
            replayed_events,
            changed_paths,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;
    use tideline_core::Timestamp;
    use tideline_log::{Event, EventKind};

    fn tid(s: &str) -> ThreadId {
        ThreadId::new(s)
    }

    fn values_event(seq: u64, key: &str, value: u64) -> Event {
        Event::new(
            SeqNum::from(seq),
            EventKind::ValuesChanged,
            Timestamp::from_millis(seq * 10),
        )
        .with_payload(Value::from_json(json!({ key: value })))
    }

    fn store_with(interval: usize, max_events: usize) -> RunStore {
        RunStore::new(StoreConfig {
            checkpoint_interval: interval,
            max_events_per_run: max_events,
            max_checkpoints_per_run: 4,
            ..StoreConfig::default()
        })
    }

    /// Fold events 1..=k from the empty state, the oracle replay must match.
    fn fold(events: &[Event], upto: usize, config: &StoreConfig) -> Value {
        let mut state = initial_state();
        for event in &events[..upto] {
            apply_event(&mut state, event, config);
        }
        state
    }

    #[test]
    fn test_unknown_run() {
        let mut store = store_with(4, 100);
        let err = store.reconstruct_at(&tid("ghost"), &SeqNum::from(1u64));
        assert_eq!(err, Err(ReplayError::UnknownRun(tid("ghost"))));
    }

    #[test]
    fn test_replay_equals_fold_at_every_position() {
        let mut store = store_with(4, 100);
        let events: Vec<Event> = (1..=20)
            .map(|i| values_event(i, if i % 2 == 0 { "even" } else { "odd" }, i))
            .collect();
        for event in &events {
            store.ingest(&tid("t1"), event.clone());
        }

        let config = store.config().clone();
        for k in 1..=20usize {
            let recon = store
                .reconstruct_at(&tid("t1"), &SeqNum::from(k as u64))
                .unwrap();
            let expected = fold(&events, k, &config);
            assert!(
                diff(&recon.state, &expected).is_empty(),
                "replay diverged from fold at k={k}"
            );
        }
    }

    #[test]
    fn test_replay_uses_checkpoints() {
        let mut store = store_with(4, 100);
        for i in 1..=10 {
            store.ingest(&tid("t1"), values_event(i, "n", i));
        }
        // Target 10: nearest checkpoint is at 8, replay 9 and 10
        let recon = store
            .reconstruct_at(&tid("t1"), &SeqNum::from(10u64))
            .unwrap();
        assert_eq!(recon.base, ReplayBase::Checkpoint(SeqNum::from(8u64)));
        assert_eq!(recon.replayed_events, 2);
    }

    #[test]
    fn test_replay_from_empty_before_first_checkpoint() {
        let mut store = store_with(4, 100);
        for i in 1..=3 {
            store.ingest(&tid("t1"), values_event(i, "n", i));
        }
        let recon = store
            .reconstruct_at(&tid("t1"), &SeqNum::from(3u64))
            .unwrap();
        assert_eq!(recon.base, ReplayBase::Empty);
        assert_eq!(recon.replayed_events, 3);
    }

    #[test]
    fn test_corrupt_checkpoint_falls_back() {
        let mut store = store_with(4, 100);
        for i in 1..=10 {
            store.ingest(&tid("t1"), values_event(i, "n", i));
        }
        let config = store.config().clone();

        // Tamper with the newest checkpoint's snapshot (seq 8)
        {
            let run = store.run_mut(&tid("t1")).unwrap();
            let tampered: Vec<_> = run
                .checkpoints
                .iter()
                .cloned()
                .map(|mut cp| {
                    if cp.seq == SeqNum::from(8u64) {
                        cp.state = Value::from_json(json!({"forged": true}));
                    }
                    cp
                })
                .collect();
            let mut rebuilt = tideline_log::CheckpointList::new(4);
            for cp in tampered {
                rebuilt.push(cp);
            }
            run.checkpoints = rebuilt;
        }

        let recon = store
            .reconstruct_at(&tid("t1"), &SeqNum::from(10u64))
            .unwrap();
        // Fell back to the older checkpoint at 4 and replayed 5..=10
        assert_eq!(recon.base, ReplayBase::Checkpoint(SeqNum::from(4u64)));
        assert_eq!(recon.replayed_events, 6);

        // And the result is still exact
        let events: Vec<Event> = (1..=10).map(|i| values_event(i, "n", i)).collect();
        let expected = fold(&events, 10, &config);
        assert!(diff(&recon.state, &expected).is_empty());
    }

    #[test]
    fn test_gap_is_reported_not_approximated() {
        // Tiny buffer, no checkpoints yet: early history gets evicted
        let mut store = store_with(100, 4);
        for i in 1..=10 {
            store.ingest(&tid("t1"), values_event(i, "n", i));
        }
        let err = store.reconstruct_at(&tid("t1"), &SeqNum::from(3u64));
        assert_eq!(
            err,
            Err(ReplayError::HistoryUnavailable {
                thread_id: tid("t1"),
                target: SeqNum::from(3u64),
            })
        );
    }

    #[test]
    fn test_checkpoint_bridges_evicted_history() {
        // Buffer keeps only 4 events but a checkpoint at 8 anchors the tail
        let mut store = store_with(4, 4);
        for i in 1..=10 {
            store.ingest(&tid("t1"), values_event(i, "n", i));
        }
        let recon = store
            .reconstruct_at(&tid("t1"), &SeqNum::from(10u64))
            .unwrap();
        assert_eq!(recon.base, ReplayBase::Checkpoint(SeqNum::from(8u64)));

        let config = store.config().clone();
        let events: Vec<Event> = (1..=10).map(|i| values_event(i, "n", i)).collect();
        let expected = fold(&events, 10, &config);
        assert!(diff(&recon.state, &expected).is_empty());
    }

    #[test]
    fn test_changed_paths_between_materializations() {
        let mut store = store_with(100, 100);
        store.ingest(&tid("t1"), values_event(1, "a", 1));
        store.ingest(&tid("t1"), values_event(2, "b", 2));

        // First materialization: everything changed relative to nothing
        let first = store
            .reconstruct_at(&tid("t1"), &SeqNum::from(1u64))
            .unwrap();
        assert_eq!(first.changed_paths, vec!["/"]);

        // Scrub forward one event: only the new key differs
        let second = store
            .reconstruct_at(&tid("t1"), &SeqNum::from(2u64))
            .unwrap();
        assert_eq!(second.changed_paths, vec!["/values/b"]);

        // Scrub back again: the same key differs, from the other side
        let third = store
            .reconstruct_at(&tid("t1"), &SeqNum::from(1u64))
            .unwrap();
        assert_eq!(third.changed_paths, vec!["/values/b"]);
    }

    #[test]
    fn test_reconstruction_is_a_deep_copy() {
        let mut store = store_with(100, 100);
        store.ingest(&tid("t1"), values_event(1, "a", 1));
        let recon = store
            .reconstruct_at(&tid("t1"), &SeqNum::from(1u64))
            .unwrap();

        // Later ingests must not show through the returned snapshot
        store.ingest(&tid("t1"), values_event(2, "a", 99));
        assert_eq!(
            recon.state.get("values").unwrap().get("a"),
            Some(&Value::Number(1.0))
        );
    }

    #[test]
    fn test_target_beyond_high_water_replays_everything() {
        let mut store = store_with(100, 100);
        for i in 1..=3 {
            store.ingest(&tid("t1"), values_event(i, "n", i));
        }
        let recon = store
            .reconstruct_at(&tid("t1"), &SeqNum::from(1000u64))
            .unwrap();
        assert_eq!(recon.replayed_events, 3);
    }

    proptest! {
        // Checkpointing is a pure optimization: whatever the interval and
        // whatever the stream, reconstruction must equal the plain fold.
        #[test]
        fn prop_reconstruction_equals_fold(
            keys in proptest::collection::vec(0u8..4, 1..30),
            interval in 1usize..6,
            k_fraction in 0.0f64..1.0,
        ) {
            let mut store = store_with(interval, 100);
            let events: Vec<Event> = keys
                .iter()
                .enumerate()
                .map(|(i, key)| {
                    values_event((i + 1) as u64, &format!("k{key}"), i as u64)
                })
                .collect();
            for event in &events {
                store.ingest(&tid("t1"), event.clone());
            }

            let k = ((events.len() as f64 * k_fraction) as usize).max(1);
            let recon = store
                .reconstruct_at(&tid("t1"), &SeqNum::from(k as u64))
                .unwrap();
            let expected = fold(&events, k, &store.config().clone());
            prop_assert!(diff(&recon.state, &expected).is_empty());
        }
    }
}
