//! Cursor for navigating a run's timeline.

use serde::{Deserialize, Serialize};
use tideline_core::{SeqNum, ThreadId};

/// Where on the timeline a cursor points
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Position {
    /// Track the newest event as it arrives
    Live,
    /// Pinned to a fixed historical sequence
    At(SeqNum),
}

/// A consumer's read position on one run's timeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    /// The observed run
    pub thread_id: ThreadId,
    /// Timeline position
    pub position: Position,
}

impl Cursor {
    /// Cursor tracking the newest event of a run
    #[must_use]
    pub fn live(thread_id: ThreadId) -> Self {
        Self {
            thread_id,
            position: Position::Live,
        }
    }

    /// Cursor pinned to a historical sequence
    #[must_use]
    pub fn at(thread_id: ThreadId, seq: SeqNum) -> Self {
        Self {
            thread_id,
            position: Position::At(seq),
        }
    }

    /// True when the cursor tracks the newest event rather than a fixed seq
    #[must_use]
    pub fn is_live(&self) -> bool {
        matches!(self.position, Position::Live)
    }

    /// Pin the cursor to a sequence
    pub fn seek(&mut self, seq: SeqNum) {
        self.position = Position::At(seq);
    }

    /// Return the cursor to live tailing
    pub fn follow(&mut self) {
        self.position = Position::Live;
    }
}
