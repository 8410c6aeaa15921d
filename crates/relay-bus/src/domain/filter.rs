//! # Event Filters
//!
//! Two filters live here:
//!
//! - `SubscriptionFilter` narrows a subscription beyond its event types.
//! - `HistoryFilter` drives range queries over the event log.
//!
//! ## Subscription Matching Order
//!
//! | Step | Check |
//! |------|-------|
//! | 1 | Event type is one of the subscription's types (registry) |
//! | 2 | `source` equals the filter value or is in the filter set |
//! | 3 | `target` matches when the event has one; a missing target fails only with `require_target` |
//! | 4 | `tenant_id` / `user_id` equal the metadata values |
//! | 5 | Every data condition equals the payload field |

use crate::domain::event::{Event, EventType, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A single accepted value or a set of accepted values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    #[must_use]
    pub fn contains(&self, candidate: &str) -> bool {
        match self {
            Self::One(value) => value == candidate,
            Self::Many(values) => values.iter().any(|value| value == candidate),
        }
    }
}

impl From<&str> for OneOrMany {
    fn from(value: &str) -> Self {
        Self::One(value.to_string())
    }
}

impl From<String> for OneOrMany {
    fn from(value: String) -> Self {
        Self::One(value)
    }
}

impl From<Vec<&str>> for OneOrMany {
    fn from(values: Vec<&str>) -> Self {
        Self::Many(values.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for OneOrMany {
    fn from(values: Vec<String>) -> Self {
        Self::Many(values)
    }
}

/// Optional narrowing predicate of a subscription.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionFilter {
    pub source: Option<OneOrMany>,
    pub target: Option<OneOrMany>,
    /// Reject events without a target instead of letting them through.
    #[serde(default)]
    pub require_target: bool,
    pub tenant_id: Option<String>,
    pub user_id: Option<String>,
    /// Exact-match conditions on top-level payload fields.
    pub data_conditions: BTreeMap<String, Value>,
}

impl SubscriptionFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn source(mut self, source: impl Into<OneOrMany>) -> Self {
        self.source = Some(source.into());
        self
    }

    #[must_use]
    pub fn target(mut self, target: impl Into<OneOrMany>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Make the target check fail for events that carry no target.
    #[must_use]
    pub fn require_target(mut self) -> Self {
        self.require_target = true;
        self
    }

    #[must_use]
    pub fn tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    #[must_use]
    pub fn user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    #[must_use]
    pub fn data_equals(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data_conditions.insert(key.into(), value);
        self
    }

    /// Steps 2 to 5 of the matching order. The event type check belongs to
    /// the subscription itself.
    #[must_use]
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(source) = &self.source {
            if !source.contains(&event.source) {
                return false;
            }
        }

        match (&self.target, &event.target) {
            (Some(target), Some(event_target)) if !target.contains(event_target) => return false,
            (_, None) if self.require_target => return false,
            _ => {}
        }

        if let Some(tenant) = &self.tenant_id {
            if event.metadata.tenant_id.as_ref() != Some(tenant) {
                return false;
            }
        }

        if let Some(user) = &self.user_id {
            if event.metadata.user_id.as_ref() != Some(user) {
                return false;
            }
        }

        self.data_conditions
            .iter()
            .all(|(key, expected)| event.data_field(key) == Some(expected))
    }
}

/// Range query over the event log.
///
/// Every dimension is optional; an empty filter returns the whole retained
/// history. `limit` keeps the most recent entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryFilter {
    pub event_types: Vec<EventType>,
    pub source: Option<String>,
    pub target: Option<String>,
    /// Inclusive lower bound.
    pub start_time: Option<Timestamp>,
    /// Inclusive upper bound.
    pub end_time: Option<Timestamp>,
    pub limit: Option<usize>,
}

impl HistoryFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn event_types<I, T>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<EventType>,
    {
        self.event_types = types.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    #[must_use]
    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    #[must_use]
    pub fn since(mut self, start: Timestamp) -> Self {
        self.start_time = Some(start);
        self
    }

    #[must_use]
    pub fn until(mut self, end: Timestamp) -> Self {
        self.end_time = Some(end);
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn matches(&self, event: &Event) -> bool {
        if !self.event_types.is_empty() && !self.event_types.contains(&event.event_type) {
            return false;
        }
        if let Some(source) = &self.source {
            if &event.source != source {
                return false;
            }
        }
        if let Some(target) = &self.target {
            if event.target.as_ref() != Some(target) {
                return false;
            }
        }
        let ts = event.timestamp();
        if self.start_time.is_some_and(|start| ts < start) {
            return false;
        }
        if self.end_time.is_some_and(|end| ts > end) {
            return false;
        }
        true
    }
}
