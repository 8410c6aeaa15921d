//! # Subscriptions
//!
//! A standing interest in a class of events: the event types, an optional
//! filter, the handler and the delivery options (retry policy, dead
//! lettering, concurrency).

use crate::domain::errors::ValidationError;
use crate::domain::event::{Event, EventType, Timestamp};
use crate::domain::filter::SubscriptionFilter;
use crate::ports::outbound::EventHandler;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Identifier assigned to a subscription at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

impl FromStr for SubscriptionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix("sub-").unwrap_or(s);
        Uuid::parse_str(raw).map(Self)
    }
}

/// Retry behaviour on handler failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt; 0 disables retrying.
    pub max_retries: u32,
    /// Base delay between attempts.
    pub backoff_ms: u64,
    /// Double the delay on every retry.
    pub exponential_backoff: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_ms: 1000,
            exponential_backoff: true,
        }
    }
}

impl RetryPolicy {
    /// Fixed delay policy.
    #[must_use]
    pub fn fixed(max_retries: u32, backoff_ms: u64) -> Self {
        Self {
            max_retries,
            backoff_ms,
            exponential_backoff: false,
        }
    }

    /// Exponential delay policy (`backoff_ms * 2^(retry-1)`).
    #[must_use]
    pub fn exponential(max_retries: u32, backoff_ms: u64) -> Self {
        Self {
            max_retries,
            backoff_ms,
            exponential_backoff: true,
        }
    }

    /// Policy that never retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self::fixed(0, 0)
    }

    /// Delay before the given retry (1-based).
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        if !self.exponential_backoff {
            return Duration::from_millis(self.backoff_ms);
        }
        let factor = 1u64
            .checked_shl(retry.saturating_sub(1))
            .unwrap_or(u64::MAX);
        Duration::from_millis(self.backoff_ms.saturating_mul(factor))
    }
}

/// Delivery options of a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionOptions {
    /// Survive a restart. Only recorded; the bus itself is in-memory.
    pub persistent: bool,
    pub retry_policy: RetryPolicy,
    /// Route exhausted events to the dead letter queue instead of failing
    /// the publisher.
    pub dead_letter_queue: bool,
    /// Replay chunk size.
    pub batch_size: usize,
    pub parallel_processing: bool,
    /// Upper bound on a single handler invocation.
    pub handler_timeout: Option<Duration>,
}

impl Default for SubscriptionOptions {
    fn default() -> Self {
        Self {
            persistent: false,
            retry_policy: RetryPolicy::default(),
            dead_letter_queue: true,
            batch_size: 10,
            parallel_processing: false,
            handler_timeout: None,
        }
    }
}

impl SubscriptionOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    #[must_use]
    pub fn with_dead_letter_queue(mut self, enabled: bool) -> Self {
        self.dead_letter_queue = enabled;
        self
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    #[must_use]
    pub fn with_parallel_processing(mut self, parallel: bool) -> Self {
        self.parallel_processing = parallel;
        self
    }

    #[must_use]
    pub fn with_persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    #[must_use]
    pub fn with_handler_timeout(mut self, timeout: Duration) -> Self {
        self.handler_timeout = Some(timeout);
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.batch_size == 0 {
            return Err(ValidationError::InvalidOption {
                option: "batch_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.handler_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ValidationError::InvalidOption {
                option: "handler_timeout",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// A registered subscription.
pub struct Subscription {
    pub id: SubscriptionId,
    /// Registration order, used for deterministic sequential dispatch.
    pub seq: u64,
    pub event_types: Vec<EventType>,
    pub filter: Option<SubscriptionFilter>,
    pub options: SubscriptionOptions,
    pub handler: Arc<dyn EventHandler>,
    pub created_at: Timestamp,
}

impl Subscription {
    /// Full match predicate: event type membership, then the filter.
    #[must_use]
    pub fn matches(&self, event: &Event) -> bool {
        self.event_types.contains(&event.event_type)
            && self.filter.as_ref().map_or(true, |f| f.matches(event))
    }

    #[must_use]
    pub fn info(&self) -> SubscriptionInfo {
        SubscriptionInfo {
            id: self.id,
            event_types: self.event_types.clone(),
            filter: self.filter.clone(),
            options: self.options.clone(),
            handler: self.handler.name().to_string(),
            created_at: self.created_at,
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("seq", &self.seq)
            .field("event_types", &self.event_types)
            .field("filter", &self.filter)
            .field("options", &self.options)
            .field("handler", &self.handler.name())
            .finish()
    }
}

/// Read-only view of a subscription, without its handler.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionInfo {
    pub id: SubscriptionId,
    pub event_types: Vec<EventType>,
    pub filter: Option<SubscriptionFilter>,
    pub options: SubscriptionOptions,
    pub handler: String,
    pub created_at: Timestamp,
}
