//! Execution events for an observed run.
//!
//! Events are produced remotely and immutable once ingested. The seq
//! field carries the producer's decimal-string sequence number; `"0"`
//! means the producer never assigned one, and such events are dropped at
//! the wire boundary rather than ordered.

use serde::{Deserialize, Serialize};
use tideline_core::{CoreError, SeqNum, Timestamp, Value};

/// Event kind - the lifecycle transition an event describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A run began; payload may carry the graph schema
    RunStarted,
    /// Channel values changed; payload is an object merged into state
    ValuesChanged,
    /// A node began executing
    NodeStarted,
    /// A node finished successfully; payload is its output
    NodeCompleted,
    /// A node failed; payload is the error detail
    NodeFailed,
    /// The run finished successfully
    RunCompleted,
    /// The run failed
    RunFailed,
}

impl EventKind {
    /// True for kinds that end a node or run
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::NodeCompleted | Self::NodeFailed | Self::RunCompleted | Self::RunFailed
        )
    }

    /// True for failure kinds
    #[must_use]
    pub const fn is_error(self) -> bool {
        matches!(self, Self::NodeFailed | Self::RunFailed)
    }

    /// Parse the wire-format kind string
    #[must_use]
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "run_started" => Some(Self::RunStarted),
            "values_changed" => Some(Self::ValuesChanged),
            "node_started" => Some(Self::NodeStarted),
            "node_completed" => Some(Self::NodeCompleted),
            "node_failed" => Some(Self::NodeFailed),
            "run_completed" => Some(Self::RunCompleted),
            "run_failed" => Some(Self::RunFailed),
            _ => None,
        }
    }
}

/// Errors turning a wire message into an [`Event`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    /// The message was not a JSON object
    #[error("event is not an object")]
    NotAnObject,
    /// A required field was absent
    #[error("missing field: {0}")]
    MissingField(&'static str),
    /// The seq field did not parse as a decimal integer
    #[error("bad sequence: {0}")]
    BadSeq(#[from] CoreError),
    /// The kind string was not recognized
    #[error("unknown kind: {0}")]
    UnknownKind(String),
}

/// One execution event on a run's timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Producer-assigned ordering position
    pub seq: SeqNum,
    /// Lifecycle transition
    pub kind: EventKind,
    /// Node the event concerns, if any
    #[serde(rename = "nodeName")]
    pub node_name: Option<String>,
    /// Producer wall-clock time
    pub timestamp: Timestamp,
    /// Kind-specific payload
    pub payload: Value,
}

impl Event {
    /// Create an event with no node and no payload
    #[must_use]
    pub fn new(seq: SeqNum, kind: EventKind, timestamp: Timestamp) -> Self {
        Self {
            seq,
            kind,
            node_name: None,
            timestamp,
            payload: Value::Null,
        }
    }

    /// Attach a node name
    #[must_use]
    pub fn with_node(mut self, node: impl Into<String>) -> Self {
        self.node_name = Some(node.into());
        self
    }

    /// Attach a payload
    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// True for kinds that end a node or run
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.kind.is_terminal()
    }

    /// True for failure kinds
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.kind.is_error()
    }

    /// Convert an ingress JSON message into an event.
    ///
    /// Transport-agnostic: polling, push and replay-from-disk all land
    /// here. The seq field may be a decimal string or a plain integer.
    ///
    /// # Errors
    ///
    /// Returns a [`WireError`] for malformed messages; callers drop these
    /// with a warning, never crash (malformed input is local-only noise).
    pub fn from_json(json: &serde_json::Value) -> Result<Self, WireError> {
        let obj = json.as_object().ok_or(WireError::NotAnObject)?;

        let seq_field = obj.get("seq").ok_or(WireError::MissingField("seq"))?;
        let seq = match seq_field {
            serde_json::Value::String(s) => SeqNum::parse(s)?,
            serde_json::Value::Number(n) => SeqNum::parse(&n.to_string())?,
            _ => {
                return Err(WireError::BadSeq(CoreError::InvalidSeq {
                    input: seq_field.to_string(),
                }))
            }
        };

        let kind_str = obj
            .get("kind")
            .and_then(|k| k.as_str())
            .ok_or(WireError::MissingField("kind"))?;
        let kind = EventKind::from_wire(kind_str)
            .ok_or_else(|| WireError::UnknownKind(kind_str.to_string()))?;

        let node_name = obj
            .get("nodeName")
            .and_then(|n| n.as_str())
            .map(String::from);

        let timestamp = obj
            .get("timestamp")
            .and_then(|t| t.as_u64())
            .map(Timestamp::from_millis)
            .ok_or(WireError::MissingField("timestamp"))?;

        let payload = obj
            .get("payload")
            .cloned()
            .map(Value::from_json)
            .unwrap_or(Value::Null);

        Ok(Self {
            seq,
            kind,
            node_name,
            timestamp,
            payload,
        })
    }
}
