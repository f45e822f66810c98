//! Graph schema capture and drift detection.
//!
//! The first `run_started` event may declare the graph's node set. Later
//! events referencing nodes outside that set mean the producer's graph
//! has drifted from what was initially observed; the view model surfaces
//! those names so a consumer can flag them.

use std::collections::BTreeSet;
use tideline_core::{canonical_size, Value};
use tideline_log::{Event, EventKind};

/// Tracks the declared node set for one run
#[derive(Debug, Clone, Default)]
pub struct SchemaTracker {
    declared: Option<BTreeSet<String>>,
}

impl SchemaTracker {
    /// Create an empty tracker
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one ingested event through the tracker.
    ///
    /// Only the first schema declaration wins; an oversized schema
    /// (canonical size past `max_schema_bytes`) is not captured, which
    /// disables drift detection for the run rather than storing an
    /// unbounded value.
    pub fn observe(&mut self, event: &Event, max_schema_bytes: usize) {
        if self.declared.is_some() || event.kind != EventKind::RunStarted {
            return;
        }
        let Some(schema) = event.payload.get("schema") else {
            return;
        };
        if canonical_size(schema) > max_schema_bytes {
            tracing::warn!(seq = %event.seq, "declared schema exceeds size ceiling, ignoring");
            return;
        }
        let Some(nodes) = schema.get("nodes") else {
            return;
        };
        let Value::Array(slots) = nodes else {
            return;
        };
        let declared: BTreeSet<String> = slots
            .iter()
            .filter_map(|slot| match slot {
                tideline_core::Slot::Item(v) => v.as_str().map(String::from),
                tideline_core::Slot::Hole => None,
            })
            .collect();
        self.declared = Some(declared);
    }

    /// The declared node set, if one was captured
    #[must_use]
    pub fn declared(&self) -> Option<&BTreeSet<String>> {
        self.declared.as_ref()
    }

    /// Observed node names that fall outside the declared schema.
    ///
    /// Empty when no schema was declared (nothing to drift from).
    #[must_use]
    pub fn out_of_schema<'a>(&self, observed: impl Iterator<Item = &'a str>) -> Vec<String> {
        match &self.declared {
            None => Vec::new(),
            Some(declared) => observed
                .filter(|name| !declared.contains(*name))
                .map(String::from)
                .collect(),
        }
    }
}
