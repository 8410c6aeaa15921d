//! # Delivery State Machine
//!
//! Tracks one (event, subscription) delivery through its attempts.
//!
//! ```text
//! Pending ──► Processing(1) ──ok──► Success
//!                  │
//!                fail, retries left
//!                  ▼
//!             Retrying(n) ──backoff──► Processing(n+1) ──ok──► Success
//!                  │
//!                fail, no retries left
//!                  ▼
//!              Exhausted ──► dead letter queue, or error to the publisher
//! ```
//!
//! Transitions are driven by the dispatcher; the tracker only decides whether
//! another attempt is allowed and how long to wait before it.

use crate::domain::subscription::RetryPolicy;
use std::time::Duration;

/// Position of a delivery in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryState {
    Pending,
    /// Handler invocation in flight (1-based attempt number).
    Processing { attempt: u32 },
    /// Waiting out the backoff before the given retry (1-based).
    Retrying { retry: u32 },
    Success { attempts: u32 },
    Exhausted { attempts: u32, reason: String },
}

impl DeliveryState {
    /// Success or exhaustion.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success { .. } | Self::Exhausted { .. })
    }
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    Retry { retry: u32, delay: Duration },
    Exhausted { attempts: u32, reason: String },
}

/// Per-delivery attempt bookkeeping.
#[derive(Debug, Clone)]
pub struct DeliveryTracker {
    policy: RetryPolicy,
    state: DeliveryState,
    attempts: u32,
}

impl DeliveryTracker {
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            state: DeliveryState::Pending,
            attempts: 0,
        }
    }

    /// Enter `Processing` and return the attempt number.
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempts += 1;
        self.state = DeliveryState::Processing {
            attempt: self.attempts,
        };
        self.attempts
    }

    pub fn record_success(&mut self) {
        self.state = DeliveryState::Success {
            attempts: self.attempts,
        };
    }

    /// Decide between another attempt and giving up.
    ///
    /// At most `max_retries` retries follow the first attempt, so a delivery
    /// makes at most `max_retries + 1` handler invocations.
    pub fn record_failure(&mut self, reason: impl Into<String>) -> RetryDecision {
        let retries_done = self.retries();
        if retries_done < self.policy.max_retries {
            let retry = retries_done + 1;
            self.state = DeliveryState::Retrying { retry };
            RetryDecision::Retry {
                retry,
                delay: self.policy.delay_for(retry),
            }
        } else {
            let reason = reason.into();
            self.state = DeliveryState::Exhausted {
                attempts: self.attempts,
                reason: reason.clone(),
            };
            RetryDecision::Exhausted {
                attempts: self.attempts,
                reason,
            }
        }
    }

    #[must_use]
    pub fn state(&self) -> &DeliveryState {
        &self.state
    }

    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Retries made so far (attempts after the first).
    #[must_use]
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}

/// Final result of delivering one event to one subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered { attempts: u32 },
    /// Exhausted and moved to the dead letter queue.
    DeadLettered { attempts: u32, reason: String },
    /// Exhausted with dead lettering disabled.
    Failed { attempts: u32, reason: String },
}
