//! Error types for the event bus.
//!
//! Only validation failures and, when dead lettering is disabled, exhausted
//! handler failures reach the publisher. `PersistenceError` is returned by
//! event stores; the bus logs and swallows it.

use crate::domain::event::{EventId, EventType};
use crate::domain::subscription::SubscriptionId;
use thiserror::Error;

/// Malformed event or subscription. Never retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Event has an empty type.
    #[error("Event type is required")]
    MissingType,

    /// Event has an empty source.
    #[error("Event source is required")]
    MissingSource,

    /// Subscription lists no event types, or a blank one.
    #[error("Subscription must list at least one non-empty event type")]
    EmptyEventTypes,

    /// Producer-supplied id already present in the event log.
    #[error("Event id {0} is already present in the event log")]
    DuplicateEventId(EventId),

    /// Payload does not satisfy the declared schema.
    #[error("Payload of {event_type} violates its schema: {reason}")]
    SchemaViolation { event_type: EventType, reason: String },

    /// Subscription option out of range.
    #[error("Invalid subscription option {option}: {reason}")]
    InvalidOption {
        option: &'static str,
        reason: String,
    },

    /// Typed payload could not be encoded as JSON.
    #[error("Payload could not be encoded: {0}")]
    Encoding(String),
}

/// Failure of the injected durable-store hook.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Event store failure: {reason}")]
pub struct PersistenceError {
    pub reason: String,
}

impl PersistenceError {
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Event bus errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// A handler exhausted its retries and dead lettering is disabled.
    #[error(
        "Handler of {subscription_id} failed on event {event_id} after {attempts} attempt(s): {reason}"
    )]
    Handler {
        subscription_id: SubscriptionId,
        event_id: EventId,
        attempts: u32,
        reason: String,
    },

    #[error("Subscription not found: {0}")]
    NotFound(SubscriptionId),
}

/// Result type for bus operations
pub type BusResult<T> = Result<T, BusError>;
