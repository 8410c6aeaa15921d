//! # Event Log
//!
//! Bounded, timestamp-ordered store of published events.
//!
//! ## Invariants
//!
//! - Entries are kept sorted by publish timestamp. Publishers racing each
//!   other may append out of order, so `append` inserts at the sorted
//!   position; equal timestamps keep insertion order.
//! - Event ids are unique among retained entries.
//! - At most `capacity` entries are retained. On overflow the oldest entry
//!   is evicted, so replay windows are best-effort.

use crate::domain::errors::ValidationError;
use crate::domain::event::{Event, EventId};
use crate::domain::filter::HistoryFilter;
use std::collections::{HashSet, VecDeque};

/// Bounded in-memory event history.
#[derive(Debug)]
pub struct EventLog {
    entries: VecDeque<Event>,
    ids: HashSet<EventId>,
    capacity: usize,
}

impl EventLog {
    /// Create a log retaining at most `capacity` events (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            ids: HashSet::new(),
            capacity,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: &EventId) -> bool {
        self.ids.contains(id)
    }

    /// Insert a published event at its timestamp position. An event without
    /// an id is stored under a freshly generated one.
    ///
    /// Returns the evicted event when the log was full.
    ///
    /// # Errors
    ///
    /// - `ValidationError::DuplicateEventId` - id already retained
    pub fn append(&mut self, mut event: Event) -> Result<Option<Event>, ValidationError> {
        let id = event.id.get_or_insert_with(EventId::generate).clone();
        if self.ids.contains(&id) {
            return Err(ValidationError::DuplicateEventId(id));
        }

        let ts = event.timestamp();
        let position = self.entries.partition_point(|e| e.timestamp() <= ts);
        self.entries.insert(position, event);
        self.ids.insert(id);

        if self.entries.len() > self.capacity {
            if let Some(evicted) = self.entries.pop_front() {
                if let Some(evicted_id) = &evicted.id {
                    self.ids.remove(evicted_id);
                }
                return Ok(Some(evicted));
            }
        }
        Ok(None)
    }

    /// Events matching `filter`, in ascending timestamp order.
    ///
    /// When more events match than `filter.limit`, the most recent ones are
    /// kept.
    #[must_use]
    pub fn query(&self, filter: &HistoryFilter) -> Vec<Event> {
        let mut matched: Vec<Event> = self
            .entries
            .iter()
            .filter(|event| filter.matches(event))
            .cloned()
            .collect();

        if let Some(limit) = filter.limit {
            if matched.len() > limit {
                matched.drain(..matched.len() - limit);
            }
        }
        matched
    }
}
