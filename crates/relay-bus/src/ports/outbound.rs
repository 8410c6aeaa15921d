//! Outbound (driven) ports.
//!
//! Dependencies the bus calls out to: subscriber handlers, the optional
//! durable store and the clock.

use crate::domain::errors::PersistenceError;
use crate::domain::event::{Event, Timestamp};
use async_trait::async_trait;

/// Subscriber callback.
///
/// Any error returned counts as a failed attempt and feeds the retry policy
/// of the subscription. Handlers must be safe to invoke concurrently.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &Event) -> anyhow::Result<()>;

    /// Label used in logs and subscription views.
    fn name(&self) -> &str {
        "anonymous"
    }
}

/// Durable persistence hook invoked for every published event.
///
/// Failures are logged by the bus and never reach the publisher.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn persist_event(&self, event: &Event) -> Result<(), PersistenceError>;
}

/// Time source for consistent timestamp handling.
///
/// Abstracted to allow testing with deterministic time.
pub trait TimeSource: Send + Sync {
    /// Returns the current timestamp in milliseconds.
    fn now(&self) -> Timestamp;
}
