//! Per-run state store.
//!
//! Owns one `RunState` per observed run: the live materialized state
//! (mutated only by `ingest`), the bounded event buffer, the bounded
//! checkpoint list, and the high-water sequence. Everything a consumer
//! reads back out (snapshots, replays, views) is an independent deep
//! copy, never an alias into the live state.

use crate::apply::apply_event;
use crate::apply::initial_state;
use crate::schema::SchemaTracker;
use indexmap::IndexMap;
use tideline_core::{canonical_size, SeqNum, ThreadId, Timestamp, Value};
use tideline_log::{Checkpoint, CheckpointList, Event, EventBuffer, StoreConfig};

/// Decides whether an incoming real event supersedes a parked synthetic
/// placeholder. Producers differ in how they acknowledge optimistic
/// events, so this is pluggable.
pub trait ReconcilePolicy: Send {
    /// True if `incoming` is the server-acknowledged form of `placeholder`
    fn matches(&self, placeholder: &Event, incoming: &Event) -> bool;
}

/// Default policy: a placeholder is acknowledged by the first real event
/// with the same kind and node name.
#[derive(Debug, Clone, Copy, Default)]
pub struct KindNodeMatch;

impl ReconcilePolicy for KindNodeMatch {
    fn matches(&self, placeholder: &Event, incoming: &Event) -> bool {
        placeholder.kind == incoming.kind && placeholder.node_name == incoming.node_name
    }
}

/// What happened to one ingested event
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// Applied to the live state
    Applied {
        /// A checkpoint was captured after this event
        checkpointed: bool,
        /// Seq of a parked placeholder this event superseded, if any
        reconciled: Option<SeqNum>,
    },
    /// Dropped: seq not strictly above the run's high-water mark
    DroppedStale {
        /// The high-water mark the event failed to clear
        high_water: SeqNum,
    },
    /// Dropped: the producer never assigned a sequence (`"0"`)
    DroppedUnassigned,
    /// A synthetic placeholder, parked for reconciliation
    Parked,
}

/// All retained state for one observed run
#[derive(Debug)]
pub struct RunState {
    thread_id: ThreadId,
    live: Value,
    high_water: Option<SeqNum>,
    pub(crate) events: EventBuffer,
    pub(crate) checkpoints: CheckpointList,
    pub(crate) schema: SchemaTracker,
    /// Baseline for "what changed" on the next materialization
    pub(crate) last_materialized: Option<Value>,
    applied_count: u64,
    pending_synthetic: Vec<Event>,
    /// Store tick of the last touch; drives least-recently-updated
    /// eviction deterministically (wall clock ties would not).
    last_touched: u64,
}

impl RunState {
    fn new(thread_id: ThreadId, config: &StoreConfig, tick: u64) -> Self {
        Self {
            thread_id,
            live: initial_state(),
            high_water: None,
            events: EventBuffer::new(config.max_events_per_run),
            checkpoints: CheckpointList::new(config.max_checkpoints_per_run),
            schema: SchemaTracker::new(),
            last_materialized: None,
            applied_count: 0,
            pending_synthetic: Vec::new(),
            last_touched: tick,
        }
    }

    /// The run this state belongs to
    #[must_use]
    pub fn thread_id(&self) -> &ThreadId {
        &self.thread_id
    }

    /// The live materialized state (read-only; `ingest` is the only writer)
    #[must_use]
    pub fn live_state(&self) -> &Value {
        &self.live
    }

    /// Highest applied real sequence, if any event was applied
    #[must_use]
    pub fn high_water(&self) -> Option<&SeqNum> {
        self.high_water.as_ref()
    }

    /// Number of buffered events
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Number of stored checkpoints
    #[must_use]
    pub fn checkpoint_count(&self) -> usize {
        self.checkpoints.len()
    }

    /// Number of parked synthetic placeholders
    #[must_use]
    pub fn pending_synthetic_count(&self) -> usize {
        self.pending_synthetic.len()
    }

    /// Capture a checkpoint of the live state at the current high-water
    /// sequence.
    ///
    /// Returns false without storing anything when no event has been
    /// applied yet or the snapshot's canonical size exceeds the
    /// checkpoint ceiling (an oversized snapshot is rejected, never
    /// stored whole; replay still covers the span from an older anchor).
    pub fn snapshot(&mut self, config: &StoreConfig) -> bool {
        let Some(seq) = self.high_water.clone() else {
            return false;
        };
        let size = canonical_size(&self.live);
        if size > config.max_checkpoint_state_size_bytes {
            tracing::warn!(
                run = %self.thread_id,
                seq = %seq,
                size,
                "snapshot exceeds checkpoint size ceiling, skipping"
            );
            return false;
        }
        let checkpoint = Checkpoint::capture(seq, &self.live, Timestamp::now());
        self.checkpoints.push(checkpoint);
        true
    }

    fn park(&mut self, event: Event, cap: usize) {
        self.pending_synthetic.push(event);
        if self.pending_synthetic.len() > cap {
            let dropped = self.pending_synthetic.remove(0);
            tracing::warn!(
                run = %self.thread_id,
                seq = %dropped.seq,
                "dropping oldest parked placeholder"
            );
        }
    }

    fn reconcile(&mut self, policy: &dyn ReconcilePolicy, incoming: &Event) -> Option<SeqNum> {
        let index = self
            .pending_synthetic
            .iter()
            .position(|placeholder| policy.matches(placeholder, incoming))?;
        let placeholder = self.pending_synthetic.remove(index);
        tracing::debug!(
            run = %self.thread_id,
            placeholder = %placeholder.seq,
            real = %incoming.seq,
            "reconciled synthetic placeholder"
        );
        Some(placeholder.seq)
    }
}

/// The store: one `RunState` per observed run, bounded by `max_runs`
pub struct RunStore {
    config: StoreConfig,
    runs: IndexMap<ThreadId, RunState>,
    policy: Box<dyn ReconcilePolicy>,
    tick: u64,
}

impl RunStore {
    /// Create a store with the default reconciliation policy
    #[must_use]
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            runs: IndexMap::new(),
            policy: Box::new(KindNodeMatch),
            tick: 0,
        }
    }

    /// Swap in a custom reconciliation policy
    #[must_use]
    pub fn with_policy(mut self, policy: Box<dyn ReconcilePolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// The store's configuration
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Number of observed runs
    #[must_use]
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    /// True if no runs are observed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Look up a run
    #[must_use]
    pub fn run(&self, thread_id: &ThreadId) -> Option<&RunState> {
        self.runs.get(thread_id)
    }

    pub(crate) fn run_mut(&mut self, thread_id: &ThreadId) -> Option<&mut RunState> {
        self.runs.get_mut(thread_id)
    }

    /// Stop observing a run, dropping all its retained state
    pub fn remove_run(&mut self, thread_id: &ThreadId) -> bool {
        self.runs.shift_remove(thread_id).is_some()
    }

    /// Ingest one event for a run, creating the run on first contact.
    ///
    /// Never fails: malformed or stale input is dropped with a reported
    /// outcome, synthetic placeholders are parked, and everything else is
    /// applied to the live state, buffered, and checkpointed on the
    /// configured cadence.
    pub fn ingest(&mut self, thread_id: &ThreadId, event: Event) -> IngestOutcome {
        if event.seq.is_zero() {
            tracing::warn!(run = %thread_id, "dropping event with unassigned sequence");
            return IngestOutcome::DroppedUnassigned;
        }

        self.tick += 1;
        let tick = self.tick;
        self.ensure_run(thread_id);
        let policy = &*self.policy;
        let config = &self.config;
        let Some(run) = self.runs.get_mut(thread_id) else {
            // ensure_run just inserted it; unreachable in practice
            return IngestOutcome::DroppedUnassigned;
        };

        if event.seq.is_synthetic() {
            run.park(event, config.max_events_per_run);
            run.last_touched = tick;
            return IngestOutcome::Parked;
        }

        if let Some(high_water) = &run.high_water {
            if event.seq.compare(high_water).is_le() {
                tracing::warn!(
                    run = %thread_id,
                    seq = %event.seq,
                    high_water = %high_water,
                    "dropping stale or duplicate event"
                );
                return IngestOutcome::DroppedStale {
                    high_water: high_water.clone(),
                };
            }
        }

        let reconciled = run.reconcile(policy, &event);
        run.schema.observe(&event, config.max_schema_json_size_bytes);
        apply_event(&mut run.live, &event, config);
        run.high_water = Some(event.seq.clone());
        run.events.push(event);
        run.applied_count += 1;
        run.last_touched = tick;

        let checkpointed = if run.applied_count % config.checkpoint_interval as u64 == 0 {
            run.snapshot(config)
        } else {
            false
        };

        IngestOutcome::Applied {
            checkpointed,
            reconciled,
        }
    }

    fn ensure_run(&mut self, thread_id: &ThreadId) {
        if self.runs.contains_key(thread_id) {
            return;
        }
        if self.runs.len() >= self.config.max_runs {
            let oldest = self
                .runs
                .iter()
                .min_by_key(|(_, run)| run.last_touched)
                .map(|(id, _)| id.clone());
            if let Some(id) = oldest {
                tracing::warn!(run = %id, "run cap reached, evicting least-recently-updated run");
                self.runs.shift_remove(&id);
            }
        }
        self.runs.insert(
            thread_id.clone(),
            RunState::new(thread_id.clone(), &self.config, self.tick),
        );
    }
}
