//! # Event Bus Service
//!
//! Wires the event log, the subscription registry, the dead letter queue and
//! the metrics collector into the publish/dispatch pipeline.
//!
//! ## Publish Flow
//!
//! ```text
//! publish(event)
//!   ├─ validate (type, source, declared schema)
//!   ├─ assign id / timestamp
//!   ├─ append to event log
//!   ├─ eventsPublished += 1
//!   ├─ match subscriptions (registration order)
//!   └─ dispatch ──┬─► deliver(sub 1) ─► retry loop ─► Success | DLQ | Failed
//!                 ├─► deliver(sub 2) ─► ...
//!                 └─► persist (best effort, concurrent with dispatch)
//! ```
//!
//! ## Concurrency
//!
//! | Component | Guard |
//! |-----------|-------|
//! | Event log | `RwLock` |
//! | Registry | `RwLock` |
//! | Dead letter queue | `Mutex` |
//! | Counters | atomics |
//!
//! No lock is held across a handler invocation, a backoff sleep or the
//! persistence hook.

use crate::adapters::handler::TypedHandler;
use crate::adapters::time::SystemTimeSource;
use crate::config::{BusConfig, DeliveryMode, DispatchMode};
use crate::domain::actor::ActorContext;
use crate::domain::dead_letter::{DeadLetterEntry, DeadLetterQueue};
use crate::domain::errors::{BusError, BusResult, ValidationError};
use crate::domain::event::{Event, EventId, EventType, Timestamp};
use crate::domain::event_log::EventLog;
use crate::domain::filter::{HistoryFilter, SubscriptionFilter};
use crate::domain::metrics::{BusMetrics, MetricsSnapshot};
use crate::domain::registry::{NewSubscription, SubscriptionRegistry};
use crate::domain::retry::{DeliveryOutcome, DeliveryTracker, RetryDecision};
use crate::domain::schema::PayloadSchema;
use crate::domain::subscription::{
    Subscription, SubscriptionId, SubscriptionInfo, SubscriptionOptions,
};
use crate::domain::typed::{TypedEnvelope, TypedEvent};
use crate::ports::inbound::{EventBusApi, ReplaySummary};
use crate::ports::outbound::{EventHandler, EventStore, TimeSource};
use async_trait::async_trait;
use futures::future::join_all;
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, info_span, warn, Instrument, Span};

type Outcomes = Vec<(Arc<Subscription>, DeliveryOutcome)>;

// =============================================================================
// BUILDER
// =============================================================================

/// Builder for `EventBus`.
#[derive(Default)]
pub struct EventBusBuilder {
    config: BusConfig,
    event_store: Option<Arc<dyn EventStore>>,
    time_source: Option<Arc<dyn TimeSource>>,
}

impl EventBusBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn config(mut self, config: BusConfig) -> Self {
        self.config = config;
        self
    }

    /// Durable hook called for every published event.
    #[must_use]
    pub fn event_store(mut self, store: Arc<dyn EventStore>) -> Self {
        self.event_store = Some(store);
        self
    }

    #[must_use]
    pub fn time_source(mut self, time_source: Arc<dyn TimeSource>) -> Self {
        self.time_source = Some(time_source);
        self
    }

    #[must_use]
    pub fn build(self) -> EventBus {
        let config = self.config;
        let inner = BusInner {
            log: RwLock::new(EventLog::new(config.max_log_size)),
            registry: RwLock::new(SubscriptionRegistry::new()),
            dead_letters: Mutex::new(DeadLetterQueue::new(config.dlq_retention)),
            schemas: RwLock::new(HashMap::new()),
            metrics: BusMetrics::new(config.latency_window),
            event_store: self.event_store,
            time: self
                .time_source
                .unwrap_or_else(|| Arc::new(SystemTimeSource)),
            config,
        };
        EventBus {
            inner: Arc::new(inner),
        }
    }
}

// =============================================================================
// EVENT BUS
// =============================================================================

/// In-process publish/subscribe bus.
///
/// Cheap to clone; clones share the same state. Separate instances are fully
/// isolated from each other.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(BusConfig::default())
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("config", &self.inner.config)
            .field("events_logged", &self.inner.log.read().len())
            .field("subscriptions", &self.inner.registry.read().len())
            .field("dead_letters", &self.inner.dead_letters.lock().len())
            .finish()
    }
}

impl EventBus {
    #[must_use]
    pub fn new(config: BusConfig) -> Self {
        EventBusBuilder::new().config(config).build()
    }

    #[must_use]
    pub fn builder() -> EventBusBuilder {
        EventBusBuilder::new()
    }

    #[must_use]
    pub fn config(&self) -> &BusConfig {
        &self.inner.config
    }

    /// Declare the payload schema of an event type. Replaces any previous
    /// declaration; events already in the log are not re-checked.
    pub fn declare_schema(&self, event_type: impl Into<EventType>, schema: PayloadSchema) {
        let event_type = event_type.into();
        debug!(event_type = %event_type, "Payload schema declared");
        self.inner.schemas.write().insert(event_type, schema);
    }

    /// Publish an event and return its id.
    ///
    /// # Errors
    ///
    /// - `BusError::Validation` - missing type or source, schema violation,
    ///   or an id already present in the log
    /// - `BusError::Handler` - in awaited delivery mode, a matched
    ///   subscription without dead lettering exhausted its retries. Every
    ///   other matched subscription has still been processed.
    pub async fn publish(&self, event: Event) -> BusResult<EventId> {
        let event = self.inner.prepare(event)?;
        let id = EventId::from(event.id_str());

        if let Some(evicted) = self.inner.log.write().append(event.clone())? {
            debug!(evicted_id = %evicted.id_str(), "Event log full, evicted oldest event");
        }
        self.inner.metrics.record_publish();

        let matches = self.inner.registry.read().matching(&event);
        debug!(
            event_id = %id,
            event_type = %event.event_type,
            source = %event.source,
            matched = matches.len(),
            "Event published"
        );

        let span = dispatch_span(&event);
        match self.inner.config.delivery_mode {
            DeliveryMode::Awaited => {
                let dispatch = self.inner.dispatch(&event, matches).instrument(span);
                let ((), outcomes) = futures::join!(self.inner.persist(&event), dispatch);
                match first_failure(&event, outcomes) {
                    Some(err) => Err(err),
                    None => Ok(id),
                }
            }
            DeliveryMode::Detached => {
                let inner = Arc::clone(&self.inner);
                tokio::spawn(async move {
                    let dispatch = inner.dispatch(&event, matches).instrument(span);
                    let ((), _outcomes) = futures::join!(inner.persist(&event), dispatch);
                });
                Ok(id)
            }
        }
    }

    /// Publish on behalf of `actor`, filling tenant and user metadata the
    /// producer left empty.
    pub async fn publish_as(&self, actor: &ActorContext, event: Event) -> BusResult<EventId> {
        self.publish(actor.stamp(event)).await
    }

    /// Publish a typed payload under `T::EVENT_TYPE`.
    pub async fn publish_typed<T: TypedEvent>(
        &self,
        source: impl Into<String>,
        payload: &T,
    ) -> BusResult<EventId> {
        self.publish(Event::typed(source, payload)?).await
    }

    /// Register a handler for the given event types.
    ///
    /// # Errors
    ///
    /// - `ValidationError::EmptyEventTypes` - no types, or a blank one
    /// - `ValidationError::InvalidOption` - e.g. a zero batch size
    pub fn subscribe<I, T>(
        &self,
        event_types: I,
        handler: Arc<dyn EventHandler>,
        filter: Option<SubscriptionFilter>,
        options: SubscriptionOptions,
    ) -> BusResult<SubscriptionId>
    where
        I: IntoIterator<Item = T>,
        T: Into<EventType>,
    {
        let request = NewSubscription {
            event_types: event_types.into_iter().map(Into::into).collect(),
            handler,
            filter,
            options,
        };
        let now = self.inner.time.now();
        let id = self.inner.registry.write().register(request, now)?;
        debug!(subscription_id = %id, "Subscription registered");
        Ok(id)
    }

    /// Register a handler receiving decoded `T` payloads.
    pub fn subscribe_typed<T, F, Fut>(
        &self,
        handler: F,
        filter: Option<SubscriptionFilter>,
        options: SubscriptionOptions,
    ) -> BusResult<SubscriptionId>
    where
        T: TypedEvent,
        F: Fn(TypedEnvelope<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.subscribe(
            [T::event_type()],
            Arc::new(TypedHandler::new(handler)),
            filter,
            options,
        )
    }

    /// Remove a subscription. Deliveries already in flight run to completion.
    pub fn unsubscribe(&self, id: &SubscriptionId) -> BusResult<()> {
        match self.inner.registry.write().unregister(id) {
            Some(_) => {
                debug!(subscription_id = %id, "Subscription removed");
                Ok(())
            }
            None => Err(BusError::NotFound(*id)),
        }
    }

    /// Retained events matching `filter`, in ascending timestamp order.
    #[must_use]
    pub fn event_history(&self, filter: &HistoryFilter) -> Vec<Event> {
        self.inner.log.read().query(filter)
    }

    /// Re-drive retained history into one subscription.
    ///
    /// Events at or after `from_time` (all retained history when `None`) of
    /// `event_types` (the subscription's own types when `None`) that pass the
    /// subscription's match predicate go through the normal retry and dead
    /// letter path. Nothing is re-published and no other subscription is
    /// invoked.
    ///
    /// # Errors
    ///
    /// - `BusError::NotFound` - unknown subscription
    /// - `BusError::Handler` - an event exhausted its retries with dead
    ///   lettering disabled; the remaining events are still replayed
    pub async fn replay(
        &self,
        id: &SubscriptionId,
        from_time: Option<Timestamp>,
        event_types: Option<Vec<EventType>>,
    ) -> BusResult<ReplaySummary> {
        let subscription = self
            .inner
            .registry
            .read()
            .get(id)
            .ok_or(BusError::NotFound(*id))?;

        let mut filter = HistoryFilter::new()
            .event_types(event_types.unwrap_or_else(|| subscription.event_types.clone()));
        if let Some(from_time) = from_time {
            filter = filter.since(from_time);
        }
        let history: Vec<Event> = self
            .inner
            .log
            .read()
            .query(&filter)
            .into_iter()
            .filter(|event| subscription.matches(event))
            .collect();

        let span = info_span!("replay", subscription_id = %id, matched = history.len());
        self.inner
            .replay_into(&subscription, history)
            .instrument(span)
            .await
    }

    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        let subscriptions = self.inner.registry.read().len();
        let dead_letters = self.inner.dead_letters.lock().len();
        self.inner.metrics.snapshot(subscriptions, dead_letters)
    }

    #[must_use]
    pub fn dead_letter_queue(&self) -> Vec<DeadLetterEntry> {
        self.inner.dead_letters.lock().list()
    }

    /// Purge the dead letter queue. Authorising `actor` is the caller's
    /// responsibility; the bus only records who did it.
    pub fn clear_dead_letter_queue(&self, actor: &ActorContext) -> usize {
        let removed = self.inner.dead_letters.lock().clear();
        info!(actor_id = %actor.actor_id, removed, "Dead letter queue cleared");
        removed
    }

    /// Remove dead letter entries older than the retention window.
    pub fn sweep_dead_letters(&self) -> usize {
        let now = self.inner.time.now();
        let removed = self.inner.dead_letters.lock().sweep(now);
        if removed > 0 {
            info!(removed, "Expired dead letter entries swept");
        }
        removed
    }

    #[must_use]
    pub fn subscription(&self, id: &SubscriptionId) -> Option<SubscriptionInfo> {
        self.inner.registry.read().get(id).map(|s| s.info())
    }

    #[must_use]
    pub fn subscriptions(&self) -> Vec<SubscriptionInfo> {
        self.inner.registry.read().infos()
    }

    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.inner.registry.read().len()
    }

    /// Spawn the periodic dead letter sweep and metrics reporter.
    ///
    /// Both stop when the returned handle is shut down or dropped.
    pub fn start_maintenance(&self) -> MaintenanceHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let sweeper = self.clone();
        let sweep = spawn_periodic(
            self.inner.config.dlq_sweep_interval,
            shutdown_rx.clone(),
            move || {
                sweeper.sweep_dead_letters();
            },
        );

        let reporter = self.clone();
        let report = spawn_periodic(
            self.inner.config.metrics_report_interval,
            shutdown_rx,
            move || {
                let m = reporter.metrics();
                info!(
                    events_published = m.events_published,
                    events_processed = m.events_processed,
                    events_failed_processing = m.events_failed_processing,
                    average_processing_time_ms = m.average_processing_time_ms,
                    subscriptions_active = m.subscriptions_active,
                    dead_letter_queue_size = m.dead_letter_queue_size,
                    "Event bus metrics"
                );
            },
        );

        info!("Event bus maintenance started");
        MaintenanceHandle {
            shutdown_tx,
            tasks: vec![sweep, report],
        }
    }
}

#[async_trait]
impl EventBusApi for EventBus {
    async fn publish(&self, event: Event) -> BusResult<EventId> {
        EventBus::publish(self, event).await
    }

    async fn publish_as(&self, actor: &ActorContext, event: Event) -> BusResult<EventId> {
        EventBus::publish_as(self, actor, event).await
    }

    fn subscribe(
        &self,
        event_types: Vec<EventType>,
        handler: Arc<dyn EventHandler>,
        filter: Option<SubscriptionFilter>,
        options: SubscriptionOptions,
    ) -> BusResult<SubscriptionId> {
        EventBus::subscribe(self, event_types, handler, filter, options)
    }

    fn unsubscribe(&self, id: &SubscriptionId) -> BusResult<()> {
        EventBus::unsubscribe(self, id)
    }

    fn event_history(&self, filter: &HistoryFilter) -> Vec<Event> {
        EventBus::event_history(self, filter)
    }

    async fn replay(
        &self,
        id: &SubscriptionId,
        from_time: Option<Timestamp>,
        event_types: Option<Vec<EventType>>,
    ) -> BusResult<ReplaySummary> {
        EventBus::replay(self, id, from_time, event_types).await
    }

    fn metrics(&self) -> MetricsSnapshot {
        EventBus::metrics(self)
    }

    fn dead_letter_queue(&self) -> Vec<DeadLetterEntry> {
        EventBus::dead_letter_queue(self)
    }

    fn clear_dead_letter_queue(&self, actor: &ActorContext) -> usize {
        EventBus::clear_dead_letter_queue(self, actor)
    }

    fn subscription(&self, id: &SubscriptionId) -> Option<SubscriptionInfo> {
        EventBus::subscription(self, id)
    }
}

// =============================================================================
// DISPATCH
// =============================================================================

struct BusInner {
    config: BusConfig,
    log: RwLock<EventLog>,
    registry: RwLock<SubscriptionRegistry>,
    dead_letters: Mutex<DeadLetterQueue>,
    schemas: RwLock<HashMap<EventType, PayloadSchema>>,
    metrics: BusMetrics,
    event_store: Option<Arc<dyn EventStore>>,
    time: Arc<dyn TimeSource>,
}

impl BusInner {
    fn prepare(&self, mut event: Event) -> Result<Event, ValidationError> {
        if event.event_type.is_blank() {
            return Err(ValidationError::MissingType);
        }
        if event.source.trim().is_empty() {
            return Err(ValidationError::MissingSource);
        }
        if let Some(schema) = self.schemas.read().get(&event.event_type) {
            schema
                .validate(&event.data)
                .map_err(|reason| ValidationError::SchemaViolation {
                    event_type: event.event_type.clone(),
                    reason,
                })?;
        }

        // Failure annotations only ever live on dead letter copies.
        if event.metadata.failure.take().is_some() {
            debug!(event_type = %event.event_type, "Dropped failure annotation from published event");
        }
        if event.id.is_none() {
            event.id = Some(EventId::generate());
        }
        if event.metadata.timestamp.is_none() {
            event.metadata.timestamp = Some(self.time.now());
        }
        Ok(event)
    }

    async fn persist(&self, event: &Event) {
        let Some(store) = &self.event_store else {
            return;
        };
        if let Err(e) = store.persist_event(event).await {
            warn!(
                event_id = %event.id_str(),
                error = %e,
                "Event persistence failed, continuing with in-memory delivery"
            );
        }
    }

    async fn dispatch(&self, event: &Event, matches: Vec<Arc<Subscription>>) -> Outcomes {
        if matches.is_empty() {
            return Vec::new();
        }
        match self.config.dispatch_mode {
            DispatchMode::PerEvent => self.dispatch_per_event(event, matches).await,
            DispatchMode::PerSubscription => self.dispatch_per_subscription(event, matches).await,
        }
    }

    /// One parallel subscription makes the whole fan-out concurrent.
    async fn dispatch_per_event(&self, event: &Event, matches: Vec<Arc<Subscription>>) -> Outcomes {
        if matches.iter().any(|s| s.options.parallel_processing) {
            return join_all(matches.into_iter().map(|subscription| async move {
                let outcome = self.deliver(&subscription, event, None).await;
                (subscription, outcome)
            }))
            .await;
        }

        let mut outcomes = Vec::with_capacity(matches.len());
        for subscription in matches {
            let outcome = self.deliver(&subscription, event, None).await;
            outcomes.push((subscription, outcome));
        }
        outcomes
    }

    /// Parallel subscriptions start immediately. Sequential ones form a chain
    /// in registration order: each waits until its predecessor finished its
    /// first attempt, so a predecessor's backoff never delays it.
    async fn dispatch_per_subscription(
        &self,
        event: &Event,
        matches: Vec<Arc<Subscription>>,
    ) -> Outcomes {
        let mut previous_turn: Option<oneshot::Receiver<()>> = None;
        let deliveries: Vec<_> = matches
            .into_iter()
            .map(|subscription| {
                let (wait_for, turn_done) = if subscription.options.parallel_processing {
                    (None, None)
                } else {
                    let (tx, rx) = oneshot::channel();
                    (previous_turn.replace(rx), Some(tx))
                };
                async move {
                    if let Some(turn) = wait_for {
                        // A dropped sender still releases the chain.
                        let _ = turn.await;
                    }
                    let outcome = self.deliver(&subscription, event, turn_done).await;
                    (subscription, outcome)
                }
            })
            .collect();
        join_all(deliveries).await
    }

    /// Run one (event, subscription) delivery through its retry path.
    ///
    /// `first_attempt_done` fires once the first handler invocation returns.
    async fn deliver(
        &self,
        subscription: &Subscription,
        event: &Event,
        mut first_attempt_done: Option<oneshot::Sender<()>>,
    ) -> DeliveryOutcome {
        let mut tracker = DeliveryTracker::new(subscription.options.retry_policy.clone());
        let started = Instant::now();

        loop {
            let attempt = tracker.begin_attempt();
            let result = self.invoke(subscription, event).await;
            if let Some(done) = first_attempt_done.take() {
                let _ = done.send(());
            }

            let reason = match result {
                Ok(()) => {
                    tracker.record_success();
                    self.metrics.record_processed(started.elapsed());
                    debug!(
                        event_id = %event.id_str(),
                        subscription_id = %subscription.id,
                        attempt,
                        "Event processed"
                    );
                    return DeliveryOutcome::Delivered { attempts: attempt };
                }
                Err(reason) => reason,
            };

            match tracker.record_failure(reason.as_str()) {
                RetryDecision::Retry { retry, delay } => {
                    self.metrics.record_retry();
                    warn!(
                        event_id = %event.id_str(),
                        subscription_id = %subscription.id,
                        attempt,
                        retry,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %reason,
                        "Handler failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::Exhausted { attempts, reason } => {
                    return self.exhaust(subscription, event, attempts, reason);
                }
            }
        }
    }

    /// A single handler invocation. Errors, timeouts and panics all count as
    /// a failed attempt.
    async fn invoke(&self, subscription: &Subscription, event: &Event) -> Result<(), String> {
        let call = AssertUnwindSafe(subscription.handler.handle(event)).catch_unwind();
        let result = match subscription.options.handler_timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => {
                    return Err(format!("handler timed out after {}ms", limit.as_millis()));
                }
            },
            None => call.await,
        };

        match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(format!("{e:#}")),
            Err(_) => Err("handler panicked".to_string()),
        }
    }

    fn exhaust(
        &self,
        subscription: &Subscription,
        event: &Event,
        attempts: u32,
        reason: String,
    ) -> DeliveryOutcome {
        self.metrics.record_failure();

        if subscription.options.dead_letter_queue {
            let entry =
                DeadLetterEntry::new(event, subscription.id, reason.as_str(), self.time.now(), attempts);
            self.dead_letters.lock().push(entry);
            error!(
                event_id = %event.id_str(),
                subscription_id = %subscription.id,
                attempts,
                error = %reason,
                "Handler exhausted retries, event moved to dead letter queue"
            );
            DeliveryOutcome::DeadLettered { attempts, reason }
        } else {
            error!(
                event_id = %event.id_str(),
                subscription_id = %subscription.id,
                attempts,
                error = %reason,
                "Handler exhausted retries, dead letter queue disabled"
            );
            DeliveryOutcome::Failed { attempts, reason }
        }
    }

    /// Feed `history` through one subscription in chunks of its batch size.
    async fn replay_into(
        &self,
        subscription: &Subscription,
        history: Vec<Event>,
    ) -> BusResult<ReplaySummary> {
        let mut summary = ReplaySummary {
            matched: history.len(),
            ..ReplaySummary::default()
        };
        let mut failure = None;

        for chunk in history.chunks(subscription.options.batch_size.max(1)) {
            let outcomes: Vec<(&Event, DeliveryOutcome)> =
                if subscription.options.parallel_processing {
                    join_all(chunk.iter().map(|event| async move {
                        (event, self.deliver(subscription, event, None).await)
                    }))
                    .await
                } else {
                    let mut outcomes = Vec::with_capacity(chunk.len());
                    for event in chunk {
                        outcomes.push((event, self.deliver(subscription, event, None).await));
                    }
                    outcomes
                };

            for (event, outcome) in outcomes {
                match outcome {
                    DeliveryOutcome::Delivered { .. } => summary.succeeded += 1,
                    DeliveryOutcome::DeadLettered { .. } => summary.failed += 1,
                    DeliveryOutcome::Failed { attempts, reason } => {
                        summary.failed += 1;
                        failure.get_or_insert(BusError::Handler {
                            subscription_id: subscription.id,
                            event_id: EventId::from(event.id_str()),
                            attempts,
                            reason,
                        });
                    }
                }
            }
        }

        info!(
            matched = summary.matched,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Replay finished"
        );
        match failure {
            Some(err) => Err(err),
            None => Ok(summary),
        }
    }
}

fn dispatch_span(event: &Event) -> Span {
    info_span!(
        "dispatch",
        event_id = %event.id_str(),
        event_type = %event.event_type,
        trace_id = event.metadata.trace_id.as_deref().unwrap_or(""),
        correlation_id = event.metadata.correlation_id.as_deref().unwrap_or(""),
    )
}

fn first_failure(event: &Event, outcomes: Outcomes) -> Option<BusError> {
    outcomes
        .into_iter()
        .find_map(|(subscription, outcome)| match outcome {
            DeliveryOutcome::Failed { attempts, reason } => Some(BusError::Handler {
                subscription_id: subscription.id,
                event_id: EventId::from(event.id_str()),
                attempts,
                reason,
            }),
            _ => None,
        })
}

// =============================================================================
// MAINTENANCE
// =============================================================================

/// Handle to the background maintenance tasks.
pub struct MaintenanceHandle {
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl MaintenanceHandle {
    /// Signal the tasks to stop.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Signal the tasks to stop and wait for them.
    pub async fn join(mut self) {
        self.shutdown();
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
    }
}

impl Drop for MaintenanceHandle {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}

fn spawn_periodic<F>(period: Duration, mut shutdown: watch::Receiver<bool>, mut tick: F) -> JoinHandle<()>
where
    F: FnMut() + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period.max(Duration::from_millis(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => tick(),
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    })
}

// =============================================================================
// TESTS
// =============================================================================
