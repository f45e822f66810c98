//! Deterministic event application.
//!
//! Live ingest and historical replay run the exact same function with the
//! exact same config, which is what makes checkpointing a pure
//! optimization: reconstructing at seq k must equal folding events 1..k
//! from the empty state. Nothing here reads the wall clock; every
//! timestamp written into the state comes from the event itself.

use tideline_core::{canonical_size, Value};
use tideline_log::{Event, EventKind, StoreConfig};

/// Marker written in place of a payload that would blow the full-state
/// size ceiling.
pub const TRUNCATED_MARKER: &str = "[payload truncated]";

/// Apply one event to a materialized state.
///
/// The state root is always an object; node lifecycle lands under
/// `"nodes"` and channel values under `"values"`, so checkpoints, replay
/// and diffs all cover them uniformly.
pub fn apply_event(state: &mut Value, event: &Event, config: &StoreConfig) {
    if state.as_object().is_none() {
        *state = Value::object();
    }

    let payload = bounded_payload(&event.payload, config);
    let ts = Value::Number(event.timestamp.as_millis() as f64);

    match event.kind {
        EventKind::RunStarted => {
            set(state, "status", Value::from("running"));
            set(state, "startedAt", ts);
            if let Some(schema) = payload.get("schema") {
                if canonical_size(schema) <= config.max_schema_json_size_bytes {
                    set(state, "schema", schema.clone());
                } else {
                    tracing::warn!("schema payload exceeds size ceiling, not stored");
                }
            }
        }
        EventKind::ValuesChanged => match payload.as_object() {
            Some(entries) => {
                for (key, value) in entries {
                    set_nested(state, "values", key, value.clone());
                }
            }
            None => {
                tracing::warn!(seq = %event.seq, "values_changed payload is not an object");
            }
        },
        EventKind::NodeStarted => {
            if let Some(node) = event.node_name.as_deref() {
                let mut record = Value::object();
                set(&mut record, "status", Value::from("running"));
                set(&mut record, "startedAt", ts);
                set_nested(state, "nodes", node, record);
            } else {
                tracing::warn!(seq = %event.seq, "node_started without a node name");
            }
        }
        EventKind::NodeCompleted | EventKind::NodeFailed => {
            if let Some(node) = event.node_name.as_deref() {
                let failed = event.kind == EventKind::NodeFailed;
                let mut record = existing_node(state, node);
                set(
                    &mut record,
                    "status",
                    Value::from(if failed { "failed" } else { "done" }),
                );
                set(&mut record, "finishedAt", ts);
                if !matches!(payload, Value::Null | Value::Undefined) {
                    let field = if failed { "error" } else { "output" };
                    set(&mut record, field, payload);
                }
                set_nested(state, "nodes", node, record);
            } else {
                tracing::warn!(seq = %event.seq, "node terminal event without a node name");
            }
        }
        EventKind::RunCompleted | EventKind::RunFailed => {
            let failed = event.kind == EventKind::RunFailed;
            set(
                state,
                "status",
                Value::from(if failed { "failed" } else { "done" }),
            );
            set(state, "finishedAt", ts);
        }
    }
}

/// The empty initial state every run's timeline starts from.
#[must_use]
pub fn initial_state() -> Value {
    Value::object()
}

fn bounded_payload(payload: &Value, config: &StoreConfig) -> Value {
    if canonical_size(payload) > config.max_full_state_size_bytes {
        tracing::warn!("payload exceeds full-state size ceiling, trimming");
        Value::from(TRUNCATED_MARKER)
    } else {
        payload.clone()
    }
}

fn set(target: &mut Value, key: &str, value: Value) {
    if let Some(entries) = target.as_object_mut() {
        entries.insert(key.to_string(), value);
    }
}

/// Set `state[section][key] = value`, creating the section object.
fn set_nested(state: &mut Value, section: &str, key: &str, value: Value) {
    let Some(root) = state.as_object_mut() else {
        return;
    };
    let slot = root
        .entry(section.to_string())
        .or_insert_with(Value::object);
    if slot.as_object().is_none() {
        *slot = Value::object();
    }
    if let Some(entries) = slot.as_object_mut() {
        entries.insert(key.to_string(), value);
    }
}

/// Copy of the current node record, or a fresh object if none exists.
fn existing_node(state: &Value, node: &str) -> Value {
    state
        .get("nodes")
        .and_then(|nodes| nodes.get(node))
        .filter(|record| record.as_object().is_some())
        .cloned()
        .unwrap_or_else(Value::object)
}
