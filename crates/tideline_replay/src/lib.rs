//! TIDELINE Replay Engine
//!
//! The orchestrator: per-run state materialization, checkpoint-and-replay
//! reconstruction at any timeline position, and structural change sets
//! between materializations.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod apply;
pub mod diff;
pub mod engine;
pub mod schema;
pub mod store;
pub mod view;

pub use diff::diff;
pub use engine::{Reconstruction, ReplayBase, ReplayError};
pub use schema::SchemaTracker;
pub use store::{IngestOutcome, KindNodeMatch, ReconcilePolicy, RunState, RunStore};
pub use view::{GraphViewModel, NodeStatus, NodeView};
