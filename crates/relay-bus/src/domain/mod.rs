//! Domain layer: event model, subscriptions, the event log and the delivery
//! bookkeeping. No I/O and no async here.

pub mod actor;
pub mod dead_letter;
pub mod errors;
pub mod event;
pub mod event_log;
pub mod filter;
pub mod metrics;
pub mod registry;
pub mod retry;
pub mod schema;
pub mod subscription;
pub mod typed;

pub use actor::ActorContext;
pub use dead_letter::{DeadLetterEntry, DeadLetterQueue, DEFAULT_DLQ_RETENTION};
pub use errors::{BusError, BusResult, PersistenceError, ValidationError};
pub use event::{Event, EventId, EventMetadata, EventType, FailureAnnotation, Priority, Timestamp};
pub use event_log::EventLog;
pub use filter::{HistoryFilter, OneOrMany, SubscriptionFilter};
pub use metrics::{BusMetrics, MetricsSnapshot, DEFAULT_LATENCY_WINDOW};
pub use registry::{NewSubscription, SubscriptionRegistry};
pub use retry::{DeliveryOutcome, DeliveryState, DeliveryTracker, RetryDecision};
pub use schema::{PayloadSchema, ValueKind};
pub use subscription::{
    RetryPolicy, Subscription, SubscriptionId, SubscriptionInfo, SubscriptionOptions,
};
pub use typed::{TypedEnvelope, TypedEvent};
