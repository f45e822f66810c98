//! TIDELINE Event Log
//!
//! Bounded in-memory event and checkpoint structures for one observed
//! run: the FIFO event buffer, the hash-verified checkpoint list, the
//! timeline cursor, and the store configuration surface.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod buffer;
pub mod checkpoint;
pub mod config;
pub mod cursor;
pub mod event;

pub use buffer::EventBuffer;
pub use checkpoint::{Checkpoint, CheckpointList};
pub use config::StoreConfig;
pub use cursor::{Cursor, Position};
pub use event::{Event, EventKind, WireError};
