//! # Event Model
//!
//! The immutable unit of data flowing through the bus.
//!
//! An `Event` is built by the producer, completed at publish time (id and
//! timestamp are assigned when absent) and never mutated afterwards. The only
//! exception is the failure annotation, which is written to a *copy* of the
//! event held by the dead letter queue.

use crate::domain::subscription::SubscriptionId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Milliseconds since the Unix epoch.
pub type Timestamp = u64;

/// Unique identifier of a published event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    /// Generate a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EventId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for EventId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Routing tag of an event (e.g. `widget.loaded`).
///
/// Subscriptions are indexed by this identifier, so it doubles as the key of
/// the registry's dispatch table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventType(String);

impl EventType {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the tag is empty or whitespace only.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EventType {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for EventType {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Delivery priority carried in the metadata.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

/// Failure details attached to the dead-lettered copy of an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureAnnotation {
    /// Subscription whose handler exhausted its retries.
    pub failed_subscription_id: SubscriptionId,
    /// Error message of the last failed attempt.
    pub failure_reason: String,
    /// When the event was moved to the dead letter queue.
    pub failure_time: Timestamp,
}

/// Event metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Publish time; assigned by the bus when absent.
    pub timestamp: Option<Timestamp>,
    /// Payload version.
    pub version: u32,
    pub correlation_id: Option<String>,
    pub causation_id: Option<String>,
    pub tenant_id: Option<String>,
    pub user_id: Option<String>,
    pub priority: Priority,
    /// Validity window in seconds, counted from `timestamp`.
    pub ttl_secs: Option<u64>,
    pub trace_id: Option<String>,
    /// Only ever present on dead letter queue copies.
    pub failure: Option<FailureAnnotation>,
}

impl Default for EventMetadata {
    fn default() -> Self {
        Self {
            timestamp: None,
            version: 1,
            correlation_id: None,
            causation_id: None,
            tenant_id: None,
            user_id: None,
            priority: Priority::Normal,
            ttl_secs: None,
            trace_id: None,
            failure: None,
        }
    }
}

/// A fact flowing through the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Assigned at publish time when absent.
    pub id: Option<EventId>,
    pub event_type: EventType,
    /// Originating entity.
    pub source: String,
    /// Optional destination entity.
    pub target: Option<String>,
    /// Payload, validated against the declared schema of `event_type`.
    pub data: Value,
    pub metadata: EventMetadata,
}

impl Event {
    /// Create an event with an empty payload.
    #[must_use]
    pub fn new(event_type: impl Into<EventType>, source: impl Into<String>) -> Self {
        Self {
            id: None,
            event_type: event_type.into(),
            source: source.into(),
            target: None,
            data: Value::Null,
            metadata: EventMetadata::default(),
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<EventId>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.metadata.timestamp = Some(timestamp);
        self
    }

    #[must_use]
    pub fn with_version(mut self, version: u32) -> Self {
        self.metadata.version = version;
        self
    }

    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.metadata.priority = priority;
        self
    }

    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.metadata.correlation_id = Some(correlation_id.into());
        self
    }

    #[must_use]
    pub fn with_causation_id(mut self, causation_id: impl Into<String>) -> Self {
        self.metadata.causation_id = Some(causation_id.into());
        self
    }

    #[must_use]
    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.metadata.tenant_id = Some(tenant_id.into());
        self
    }

    #[must_use]
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.metadata.user_id = Some(user_id.into());
        self
    }

    #[must_use]
    pub fn with_ttl_secs(mut self, ttl_secs: u64) -> Self {
        self.metadata.ttl_secs = Some(ttl_secs);
        self
    }

    #[must_use]
    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.metadata.trace_id = Some(trace_id.into());
        self
    }

    /// Link this event into the causal chain of `parent`.
    ///
    /// The correlation id is inherited (or started from the parent's id) and
    /// the causation id points at the parent.
    #[must_use]
    pub fn caused_by(mut self, parent: &Event) -> Self {
        let parent_id = parent.id.as_ref().map(|id| id.as_str().to_string());
        self.metadata.correlation_id = parent
            .metadata
            .correlation_id
            .clone()
            .or_else(|| parent_id.clone());
        self.metadata.causation_id = parent_id;
        if self.metadata.trace_id.is_none() {
            self.metadata.trace_id = parent.metadata.trace_id.clone();
        }
        self
    }

    /// Publish timestamp, or 0 for an event that has not been published.
    #[must_use]
    pub fn timestamp(&self) -> Timestamp {
        self.metadata.timestamp.unwrap_or_default()
    }

    /// Event id as a string, empty for an unpublished event.
    #[must_use]
    pub fn id_str(&self) -> &str {
        self.id.as_ref().map(EventId::as_str).unwrap_or_default()
    }

    /// Look up a top-level payload field.
    #[must_use]
    pub fn data_field(&self, key: &str) -> Option<&Value> {
        self.data.as_object().and_then(|map| map.get(key))
    }

    /// Whether the event's TTL has elapsed at `now`.
    ///
    /// Events without a TTL or without a timestamp never expire.
    #[must_use]
    pub fn is_expired(&self, now: Timestamp) -> bool {
        match (self.metadata.timestamp, self.metadata.ttl_secs) {
            (Some(ts), Some(ttl)) => now > ts.saturating_add(ttl.saturating_mul(1000)),
            _ => false,
        }
    }

    /// Copy of this event carrying a failure annotation.
    #[must_use]
    pub fn dead_lettered(&self, failure: FailureAnnotation) -> Self {
        let mut copy = self.clone();
        copy.metadata.failure = Some(failure);
        copy
    }
}
