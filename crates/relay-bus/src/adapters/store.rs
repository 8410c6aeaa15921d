//! In-memory `EventStore`, mainly for tests and local runs.

use crate::domain::errors::PersistenceError;
use crate::domain::event::Event;
use crate::ports::outbound::EventStore;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

/// Keeps every persisted event in memory.
///
/// `set_failing(true)` makes every subsequent call fail, which is how tests
/// exercise the swallow-and-log path of the bus.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    events: RwLock<Vec<Event>>,
    failing: AtomicBool,
}

impl InMemoryEventStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.events.read().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn persist_event(&self, event: &Event) -> Result<(), PersistenceError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PersistenceError::new("store unavailable"));
        }
        self.events.write().push(event.clone());
        Ok(())
    }
}
