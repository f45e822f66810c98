//! Bounded FIFO buffer of applied events.
//!
//! Holds the retained suffix of a run's timeline in ascending seq order.
//! Once the cap is hit the oldest event is evicted and the buffer
//! remembers the highest evicted seq, which is what turns "event not
//! here" into an honest "history unavailable" answer during replay.

use crate::event::Event;
use tideline_core::SeqNum;
use std::collections::VecDeque;

/// FIFO-bounded, ascending event buffer for one run
#[derive(Debug, Clone)]
pub struct EventBuffer {
    events: VecDeque<Event>,
    capacity: usize,
    // Evictions are FIFO, so the evicted events form one contiguous
    // prefix of the timeline: [evicted_first, evicted_through].
    evicted_first: Option<SeqNum>,
    evicted_through: Option<SeqNum>,
}

impl EventBuffer {
    /// Create a buffer holding at most `capacity` events
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
            evicted_first: None,
            evicted_through: None,
        }
    }

    /// Append an event, evicting the oldest if the cap is exceeded.
    ///
    /// Returns the evicted event, if any. Callers must append in
    /// ascending seq order; the store's high-water check guarantees it.
    pub fn push(&mut self, event: Event) -> Option<Event> {
        self.events.push_back(event);
        if self.events.len() > self.capacity {
            let evicted = self.events.pop_front();
            if let Some(ref gone) = evicted {
                tracing::debug!(seq = %gone.seq, "evicting oldest buffered event");
                if self.evicted_first.is_none() {
                    self.evicted_first = Some(gone.seq.clone());
                }
                self.evicted_through = Some(gone.seq.clone());
            }
            evicted
        } else {
            None
        }
    }

    /// Number of buffered events
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True if nothing is buffered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Highest seq ever evicted, if any
    #[must_use]
    pub fn evicted_through(&self) -> Option<&SeqNum> {
        self.evicted_through.as_ref()
    }

    /// Seq of the oldest retained event
    #[must_use]
    pub fn oldest_seq(&self) -> Option<&SeqNum> {
        self.events.front().map(|e| &e.seq)
    }

    /// Seq of the newest retained event
    #[must_use]
    pub fn newest_seq(&self) -> Option<&SeqNum> {
        self.events.back().map(|e| &e.seq)
    }

    /// Iterate all retained events in ascending order
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    /// Iterate events with `after < seq <= upto`, ascending.
    ///
    /// `after = None` means "from the beginning of time".
    pub fn range<'a>(
        &'a self,
        after: Option<&'a SeqNum>,
        upto: &'a SeqNum,
    ) -> impl Iterator<Item = &'a Event> {
        self.events.iter().filter(move |e| {
            let past_base = match after {
                Some(base) => e.seq.compare(base).is_gt(),
                None => true,
            };
            past_base && e.seq.compare(upto).is_le()
        })
    }

    /// True if an event needed for replaying `(after, upto]` has already
    /// been evicted. With `after = None` the span starts at the empty
    /// initial state.
    #[must_use]
    pub fn has_gap(&self, after: Option<&SeqNum>, upto: &SeqNum) -> bool {
        let (Some(first), Some(through)) = (&self.evicted_first, &self.evicted_through) else {
            return false;
        };
        // Needed span intersects the evicted prefix iff it reaches past
        // the span's base and starts at or before the span's end.
        let past_base = match after {
            Some(base) => through.compare(base).is_gt(),
            None => true,
        };
        past_base && first.compare(upto).is_le()
    }
}
