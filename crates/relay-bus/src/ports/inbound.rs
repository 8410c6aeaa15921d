//! Inbound (driving) port: the operations the bus offers its callers.

use crate::domain::actor::ActorContext;
use crate::domain::dead_letter::DeadLetterEntry;
use crate::domain::errors::BusResult;
use crate::domain::event::{Event, EventId, EventType, Timestamp};
use crate::domain::filter::{HistoryFilter, SubscriptionFilter};
use crate::domain::metrics::MetricsSnapshot;
use crate::domain::subscription::{SubscriptionId, SubscriptionInfo, SubscriptionOptions};
use crate::ports::outbound::EventHandler;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Result of a replay run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaySummary {
    /// Historical events matching the subscription.
    pub matched: usize,
    pub succeeded: usize,
    /// Events that exhausted their retries (dead lettered or failed).
    pub failed: usize,
}

/// Public API of the event bus.
///
/// ## Operations
///
/// | Operation | Effect |
/// |-----------|--------|
/// | `publish` | validate, log, persist, dispatch |
/// | `subscribe` / `unsubscribe` | manage the registry |
/// | `event_history` | query the log |
/// | `replay` | re-drive history through one subscription |
/// | `metrics` | counters and gauges |
/// | `dead_letter_queue` / `clear_dead_letter_queue` | inspect and purge the DLQ |
#[async_trait]
pub trait EventBusApi: Send + Sync {
    /// Publish an event and return its id.
    async fn publish(&self, event: Event) -> BusResult<EventId>;

    /// Publish on behalf of an authenticated actor.
    async fn publish_as(&self, actor: &ActorContext, event: Event) -> BusResult<EventId>;

    fn subscribe(
        &self,
        event_types: Vec<EventType>,
        handler: Arc<dyn EventHandler>,
        filter: Option<SubscriptionFilter>,
        options: SubscriptionOptions,
    ) -> BusResult<SubscriptionId>;

    fn unsubscribe(&self, id: &SubscriptionId) -> BusResult<()>;

    fn event_history(&self, filter: &HistoryFilter) -> Vec<Event>;

    async fn replay(
        &self,
        id: &SubscriptionId,
        from_time: Option<Timestamp>,
        event_types: Option<Vec<EventType>>,
    ) -> BusResult<ReplaySummary>;

    fn metrics(&self) -> MetricsSnapshot;

    fn dead_letter_queue(&self) -> Vec<DeadLetterEntry>;

    /// Purge the DLQ and return the number of removed entries.
    fn clear_dead_letter_queue(&self, actor: &ActorContext) -> usize;

    fn subscription(&self, id: &SubscriptionId) -> Option<SubscriptionInfo>;
}
