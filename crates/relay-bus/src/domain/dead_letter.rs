//! # Dead Letter Queue
//!
//! Holds events whose processing permanently failed for a subscription.
//! Entries are annotated copies; the event log entry is never touched.
//! A periodic sweep removes entries older than the retention window.

use crate::domain::event::{Event, FailureAnnotation, Timestamp};
use crate::domain::subscription::SubscriptionId;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// Default retention window: 24 hours.
pub const DEFAULT_DLQ_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

/// A dead-lettered (event, subscription) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    /// Copy of the event carrying the failure annotation.
    pub event: Event,
    pub failure: FailureAnnotation,
    /// Handler invocations made before giving up.
    pub attempts: u32,
}

impl DeadLetterEntry {
    #[must_use]
    pub fn new(
        original: &Event,
        subscription_id: SubscriptionId,
        reason: impl Into<String>,
        failure_time: Timestamp,
        attempts: u32,
    ) -> Self {
        let failure = FailureAnnotation {
            failed_subscription_id: subscription_id,
            failure_reason: reason.into(),
            failure_time,
        };
        Self {
            event: original.dead_lettered(failure.clone()),
            failure,
            attempts,
        }
    }

    #[must_use]
    pub fn subscription_id(&self) -> SubscriptionId {
        self.failure.failed_subscription_id
    }

    #[must_use]
    pub fn failure_reason(&self) -> &str {
        &self.failure.failure_reason
    }

    #[must_use]
    pub fn failure_time(&self) -> Timestamp {
        self.failure.failure_time
    }
}

/// Failed deliveries awaiting inspection.
#[derive(Debug)]
pub struct DeadLetterQueue {
    entries: VecDeque<DeadLetterEntry>,
    retention: Duration,
}

impl DeadLetterQueue {
    #[must_use]
    pub fn new(retention: Duration) -> Self {
        Self {
            entries: VecDeque::new(),
            retention,
        }
    }

    pub fn push(&mut self, entry: DeadLetterEntry) {
        self.entries.push_back(entry);
    }

    /// Snapshot of all entries, oldest first.
    #[must_use]
    pub fn list(&self) -> Vec<DeadLetterEntry> {
        self.entries.iter().cloned().collect()
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
    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Drop every entry, returning how many were removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.entries.len();
        self.entries.clear();
        removed
    }

    /// Remove entries whose failure time is older than the retention window.
    ///
    /// Returns the number of entries removed.
    pub fn sweep(&mut self, now: Timestamp) -> usize {
        let retention_ms = u64::try_from(self.retention.as_millis()).unwrap_or(u64::MAX);
        let before = self.entries.len();
        self.entries
            .retain(|entry| now.saturating_sub(entry.failure_time()) <= retention_ms);
        before - self.entries.len()
    }
}

impl Default for DeadLetterQueue {
    fn default() -> Self {
        Self::new(DEFAULT_DLQ_RETENTION)
    }
}
