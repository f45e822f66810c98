//! Render-facing view of one run at one cursor position.
//!
//! Recomputed from `RunState` + `Cursor` on every request and never
//! stored; consumers treat it as a read-only snapshot. All node status
//! and timing comes out of the reconstructed state itself, so a view at
//! a historical cursor shows exactly what was true back then.

use crate::engine::ReplayError;
use crate::store::RunStore;
use serde::Serialize;
use tideline_core::{hash_state, SeqNum, ThreadId, Value};
use tideline_log::{Cursor, Position};

/// Lifecycle status of one graph node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    /// Declared in the schema but not started at this position
    Pending,
    /// Started and not yet finished
    Running,
    /// Finished successfully
    Succeeded,
    /// Finished with an error
    Failed,
}

impl NodeStatus {
    fn from_state(status: Option<&Value>) -> Self {
        match status.and_then(Value::as_str) {
            Some("running") => Self::Running,
            Some("done") => Self::Succeeded,
            Some("failed") => Self::Failed,
            _ => Self::Pending,
        }
    }
}

/// Per-node summary derived from the reconstructed state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeView {
    /// Node name
    pub name: String,
    /// Status at the cursor position
    pub status: NodeStatus,
    /// Wall-clock duration between start and finish, when both are known
    pub duration_ms: Option<u64>,
}

/// The render-facing snapshot of one run at one cursor position
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphViewModel {
    /// The observed run
    pub thread_id: ThreadId,
    /// The sequence the view was materialized at
    pub at: SeqNum,
    /// True when the cursor tracks the newest event
    pub live: bool,
    /// The reconstructed state (read-only snapshot)
    pub state: Value,
    /// Per-node status and timing
    pub nodes: Vec<NodeView>,
    /// The most recently started node still running, if any
    pub active_node: Option<String>,
    /// Pointer paths changed since the previous materialization
    pub changed_paths: Vec<String>,
    /// Observed nodes outside the initially declared schema
    pub out_of_schema_nodes: Vec<String>,
    /// True when hash-based integrity cannot vouch for the producer's
    /// original numeric values in this state
    pub has_unsafe_numbers: bool,
}

impl RunStore {
    /// Materialize the view of a run at a cursor position.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`RunStore::reconstruct_at`].
    pub fn view(&mut self, cursor: &Cursor) -> Result<GraphViewModel, ReplayError> {
        let target = {
            let run = self
                .run(&cursor.thread_id)
                .ok_or_else(|| ReplayError::UnknownRun(cursor.thread_id.clone()))?;
            match &cursor.position {
                Position::Live => run.high_water().cloned().unwrap_or_else(SeqNum::zero),
                Position::At(seq) => seq.clone(),
            }
        };

        let recon = self.reconstruct_at(&cursor.thread_id, &target)?;
        let state_hash = hash_state(&recon.state);

        let mut nodes = declared_nodes(self, &cursor.thread_id);
        overlay_observed_nodes(&mut nodes, &recon.state);

        let active_node = active_node(&recon.state);
        let out_of_schema_nodes = match self.run(&cursor.thread_id) {
            Some(run) => run
                .schema
                .out_of_schema(observed_node_names(&recon.state).into_iter()),
            None => Vec::new(),
        };

        Ok(GraphViewModel {
            thread_id: cursor.thread_id.clone(),
            at: recon.at.clone(),
            live: cursor.is_live(),
            state: recon.state,
            nodes,
            active_node,
            changed_paths: recon.changed_paths,
            out_of_schema_nodes,
            has_unsafe_numbers: state_hash.has_unsafe_numbers,
        })
    }
}

fn declared_nodes(store: &RunStore, thread_id: &ThreadId) -> Vec<NodeView> {
    store
        .run(thread_id)
        .and_then(|run| run.schema.declared())
        .map(|declared| {
            declared
                .iter()
                .map(|name| NodeView {
                    name: name.clone(),
                    status: NodeStatus::Pending,
                    duration_ms: None,
                })
                .collect()
        })
        .unwrap_or_default()
}

fn overlay_observed_nodes(nodes: &mut Vec<NodeView>, state: &Value) {
    let Some(observed) = state.get("nodes").and_then(Value::as_object) else {
        return;
    };
    for (name, record) in observed {
        let view = NodeView {
            name: name.clone(),
            status: NodeStatus::from_state(record.get("status")),
            duration_ms: duration_ms(record),
        };
        match nodes.iter_mut().find(|n| &n.name == name) {
            Some(existing) => *existing = view,
            None => nodes.push(view),
        }
    }
}

fn duration_ms(record: &Value) -> Option<u64> {
    let started = record.get("startedAt").and_then(Value::as_f64)?;
    let finished = record.get("finishedAt").and_then(Value::as_f64)?;
    Some((finished - started).max(0.0) as u64)
}

/// The running node with the latest start time.
fn active_node(state: &Value) -> Option<String> {
    let observed = state.get("nodes").and_then(Value::as_object)?;
    let mut best: Option<(&str, f64)> = None;
    for (name, record) in observed {
        if NodeStatus::from_state(record.get("status")) != NodeStatus::Running {
            continue;
        }
        let started = record
            .get("startedAt")
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        if best.map_or(true, |(_, t)| started >= t) {
            best = Some((name, started));
        }
    }
    best.map(|(name, _)| name.to_string())
}

fn observed_node_names(state: &Value) -> Vec<&str> {
    state
        .get("nodes")
        .and_then(Value::as_object)
        .map(|observed| observed.keys().map(String::as_str).collect())
        .unwrap_or_default()
}
