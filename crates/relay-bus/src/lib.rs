//! # Relay Bus - In-Process Event Bus
//!
//! Publish/subscribe messaging core: producers publish events, the bus
//! matches them against registered subscriptions and drives each matched
//! handler through a retry and dead letter path. A bounded event log keeps
//! recent history for queries and replay.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐ publish() ┌──────────────────────────────────────────┐
//! │ Producer │ ─────────►│ EventBus                                 │
//! └──────────┘           │  ├─ EventLog (bounded, timestamp-ordered)│
//!                        │  ├─ SubscriptionRegistry ──match──┐      │
//!                        │  ├─ Dispatcher ◄──────────────────┘      │
//!                        │  │    └─ retry/backoff ─► DeadLetterQueue│
//!                        │  └─ BusMetrics                           │
//!                        └──────────────┬───────────────────────────┘
//!                                       ▼ handle()
//!                                ┌─────────────┐
//!                                │ Subscribers │
//!                                └─────────────┘
//! ```
//!
//! ## Guarantees
//!
//! - Event ids are unique within the retained log.
//! - History queries return events in ascending timestamp order.
//! - Every matching subscription is invoked (fan-out), never first-match.
//! - A handler failing all its retries produces exactly one dead letter
//!   entry per (event, subscription), or an error to the publisher when
//!   dead lettering is disabled.
//! - Replay never re-publishes and never reaches other subscriptions.
//!
//! ## Usage
//!
//! ```no_run
//! use relay_bus::{handler_fn, Event, EventBus, SubscriptionOptions};
//!
//! # async fn run() -> relay_bus::BusResult<()> {
//! let bus = EventBus::default();
//! bus.subscribe(
//!     ["widget.loaded"],
//!     handler_fn(|event| async move {
//!         tracing::info!(source = %event.source, "widget loaded");
//!         Ok(())
//!     }),
//!     None,
//!     SubscriptionOptions::default(),
//! )?;
//! bus.publish(Event::new("widget.loaded", "w1")).await?;
//! # Ok(())
//! # }
//! ```

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod service;

// Re-export main types
pub use adapters::{
    handler_fn, FnHandler, InMemoryEventStore, ManualTimeSource, SystemTimeSource, TypedHandler,
};
pub use config::{BusConfig, DeliveryMode, DispatchMode, DEFAULT_MAX_LOG_SIZE};
pub use domain::{
    ActorContext, BusError, BusResult, DeadLetterEntry, DeliveryOutcome, DeliveryState, Event,
    EventId, EventMetadata, EventType, FailureAnnotation, HistoryFilter, MetricsSnapshot,
    OneOrMany, PayloadSchema, PersistenceError, Priority, RetryPolicy, SubscriptionFilter,
    SubscriptionId, SubscriptionInfo, SubscriptionOptions, Timestamp, TypedEnvelope, TypedEvent,
    ValidationError, ValueKind,
};
pub use ports::{EventBusApi, EventHandler, EventStore, ReplaySummary, TimeSource};
pub use service::{EventBus, EventBusBuilder, MaintenanceHandle};
