//! # Subscription Registry
//!
//! Holds active subscriptions and resolves the subscriptions matching an
//! event.
//!
//! Subscriptions are indexed by event type (the dispatch table), so matching
//! only evaluates filters of subscriptions registered for the event's type.
//! Results are always returned in registration order.

use crate::domain::errors::ValidationError;
use crate::domain::event::{Event, EventType, Timestamp};
use crate::domain::filter::SubscriptionFilter;
use crate::domain::subscription::{
    Subscription, SubscriptionId, SubscriptionInfo, SubscriptionOptions,
};
use crate::ports::outbound::EventHandler;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Registration request.
pub struct NewSubscription {
    pub event_types: Vec<EventType>,
    pub handler: Arc<dyn EventHandler>,
    pub filter: Option<SubscriptionFilter>,
    pub options: SubscriptionOptions,
}

/// Active subscriptions, keyed by registration sequence.
#[derive(Default)]
pub struct SubscriptionRegistry {
    next_seq: u64,
    subscriptions: BTreeMap<u64, Arc<Subscription>>,
    by_id: HashMap<SubscriptionId, u64>,
    dispatch_table: HashMap<EventType, Vec<u64>>,
}

impl SubscriptionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscription and return its id.
    ///
    /// # Errors
    ///
    /// - `ValidationError::EmptyEventTypes` - no types, or a blank type
    /// - `ValidationError::InvalidOption` - options out of range
    pub fn register(
        &mut self,
        request: NewSubscription,
        now: Timestamp,
    ) -> Result<SubscriptionId, ValidationError> {
        let mut event_types: Vec<EventType> = Vec::with_capacity(request.event_types.len());
        for event_type in request.event_types {
            if event_type.is_blank() {
                return Err(ValidationError::EmptyEventTypes);
            }
            if !event_types.contains(&event_type) {
                event_types.push(event_type);
            }
        }
        if event_types.is_empty() {
            return Err(ValidationError::EmptyEventTypes);
        }
        request.options.validate()?;

        let seq = self.next_seq;
        self.next_seq += 1;
        let id = SubscriptionId::generate();

        for event_type in &event_types {
            self.dispatch_table
                .entry(event_type.clone())
                .or_default()
                .push(seq);
        }

        let subscription = Subscription {
            id,
            seq,
            event_types,
            filter: request.filter,
            options: request.options,
            handler: request.handler,
            created_at: now,
        };
        self.subscriptions.insert(seq, Arc::new(subscription));
        self.by_id.insert(id, seq);
        Ok(id)
    }

    /// Remove a subscription. Returns it when it was registered.
    pub fn unregister(&mut self, id: &SubscriptionId) -> Option<Arc<Subscription>> {
        let seq = self.by_id.remove(id)?;
        let subscription = self.subscriptions.remove(&seq)?;

        for event_type in &subscription.event_types {
            if let Some(seqs) = self.dispatch_table.get_mut(event_type) {
                seqs.retain(|s| *s != seq);
                if seqs.is_empty() {
                    self.dispatch_table.remove(event_type);
                }
            }
        }
        Some(subscription)
    }

    #[must_use]
    pub fn get(&self, id: &SubscriptionId) -> Option<Arc<Subscription>> {
        self.by_id
            .get(id)
            .and_then(|seq| self.subscriptions.get(seq))
            .cloned()
    }

    /// Subscriptions accepting `event`, in registration order.
    #[must_use]
    pub fn matching(&self, event: &Event) -> Vec<Arc<Subscription>> {
        let Some(seqs) = self.dispatch_table.get(&event.event_type) else {
            return Vec::new();
        };
        seqs.iter()
            .filter_map(|seq| self.subscriptions.get(seq))
            .filter(|subscription| subscription.matches(event))
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Views of every subscription, in registration order.
    #[must_use]
    pub fn infos(&self) -> Vec<SubscriptionInfo> {
        self.subscriptions.values().map(|s| s.info()).collect()
    }
}
