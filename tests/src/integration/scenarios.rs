//! # End-to-End Scenarios
//!
//! Publish/subscribe flows through the public `relay-bus` API:
//!
//! 1. **Routing**: type routing, source filtering, fan-out
//! 2. **Retry**: a flaky handler converging after backoff
//! 3. **Dead lettering**: an always-failing handler
//! 4. **History & replay**: log queries and re-driving one subscription
//! 5. **Typed events**: struct payloads and the `EventBusApi` port

#[cfg(test)]
mod tests {
    use crate::fixtures::Recorder;
    use relay_bus::{
        ActorContext, BusError, Event, EventBus, EventBusApi, EventType, HistoryFilter,
        InMemoryEventStore, PayloadSchema, ReplaySummary, RetryPolicy, SubscriptionFilter,
        SubscriptionOptions, TypedEnvelope, TypedEvent, ValidationError, ValueKind,
    };
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn options() -> SubscriptionOptions {
        SubscriptionOptions::default()
    }

    // =============================================================================
    // ROUTING
    // =============================================================================

    #[tokio::test]
    async fn test_type_routing() {
        let bus = EventBus::default();
        let loaded = Recorder::new("loaded");
        let errors = Recorder::new("errors");
        bus.subscribe(["widget.loaded"], loaded.clone(), None, options())
            .unwrap();
        bus.subscribe(["widget.error"], errors.clone(), None, options())
            .unwrap();

        bus.publish(Event::new("widget.loaded", "w1")).await.unwrap();

        assert_eq!(loaded.calls(), 1);
        assert_eq!(errors.calls(), 0);
    }

    #[tokio::test]
    async fn test_source_filter() {
        let bus = EventBus::default();
        let recorder = Recorder::new("w1-only");
        bus.subscribe(
            ["widget.loaded"],
            recorder.clone(),
            Some(SubscriptionFilter::new().source("w1")),
            options(),
        )
        .unwrap();

        bus.publish(Event::new("widget.loaded", "w1").with_id("from-w1"))
            .await
            .unwrap();
        bus.publish(Event::new("widget.loaded", "w2").with_id("from-w2"))
            .await
            .unwrap();

        assert_eq!(recorder.calls(), 1);
        assert_eq!(recorder.seen()[0].id_str(), "from-w1");
    }

    #[tokio::test]
    async fn test_target_and_data_filters() {
        let bus = EventBus::default();
        let recorder = Recorder::new("lobby");
        bus.subscribe(
            ["chat.message"],
            recorder.clone(),
            Some(
                SubscriptionFilter::new()
                    .target(vec!["room-1".to_string(), "room-2".to_string()])
                    .data_equals("lang", json!("en")),
            ),
            options(),
        )
        .unwrap();

        let message = |target: Option<&str>, lang: &str| {
            let event = Event::new("chat.message", "user-7").with_data(json!({"lang": lang}));
            match target {
                Some(target) => event.with_target(target),
                None => event,
            }
        };

        bus.publish(message(Some("room-2"), "en")).await.unwrap();
        bus.publish(message(Some("room-3"), "en")).await.unwrap();
        bus.publish(message(Some("room-1"), "fr")).await.unwrap();
        bus.publish(message(None, "en")).await.unwrap();

        // Broadcasts without a target pass a plain target filter.
        assert_eq!(recorder.calls(), 2);
        let targets: Vec<Option<String>> = recorder.seen().into_iter().map(|e| e.target).collect();
        assert_eq!(targets, vec![Some("room-2".to_string()), None]);
    }

    #[tokio::test]
    async fn test_required_target_skips_broadcasts() {
        let bus = EventBus::default();
        let lenient = Recorder::new("lenient");
        let strict = Recorder::new("strict");
        bus.subscribe(
            ["chat.message"],
            lenient.clone(),
            Some(SubscriptionFilter::new().target("room-1")),
            options(),
        )
        .unwrap();
        bus.subscribe(
            ["chat.message"],
            strict.clone(),
            Some(SubscriptionFilter::new().target("room-1").require_target()),
            options(),
        )
        .unwrap();

        bus.publish(Event::new("chat.message", "u")).await.unwrap();
        bus.publish(Event::new("chat.message", "u").with_target("room-1"))
            .await
            .unwrap();

        assert_eq!(lenient.calls(), 2);
        assert_eq!(strict.calls(), 1);
        assert_eq!(strict.seen()[0].target.as_deref(), Some("room-1"));
    }

    #[tokio::test]
    async fn test_tenant_filter_with_actor() {
        let bus = EventBus::default();
        let recorder = Recorder::new("acme");
        bus.subscribe(
            ["invoice.paid"],
            recorder.clone(),
            Some(SubscriptionFilter::new().tenant("acme")),
            options(),
        )
        .unwrap();

        let acme = ActorContext::new("alice").with_tenant("acme");
        let globex = ActorContext::new("bob").with_tenant("globex");
        bus.publish_as(&acme, Event::new("invoice.paid", "billing"))
            .await
            .unwrap();
        bus.publish_as(&globex, Event::new("invoice.paid", "billing"))
            .await
            .unwrap();

        assert_eq!(recorder.calls(), 1);
        assert_eq!(recorder.seen()[0].metadata.user_id.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn test_subscription_to_several_types() {
        let bus = EventBus::default();
        let recorder = Recorder::new("widgets");
        bus.subscribe(["widget.loaded", "widget.error"], recorder.clone(), None, options())
            .unwrap();

        bus.publish(Event::new("widget.loaded", "w1")).await.unwrap();
        bus.publish(Event::new("widget.error", "w1")).await.unwrap();
        bus.publish(Event::new("widget.closed", "w1")).await.unwrap();

        assert_eq!(recorder.calls(), 2);
    }

    #[tokio::test]
    async fn test_subscribe_validation() {
        let bus = EventBus::default();
        let empty: [&str; 0] = [];
        assert_eq!(
            bus.subscribe(empty, Recorder::new("x"), None, options()),
            Err(BusError::Validation(ValidationError::EmptyEventTypes))
        );
        assert_eq!(bus.subscription_count(), 0);
    }

    // =============================================================================
    // RETRY
    // =============================================================================

    #[tokio::test]
    async fn test_flaky_handler_converges_after_backoff() {
        let bus = EventBus::default();
        let flaky = Recorder::failing("flaky", 2);
        bus.subscribe(
            ["job.run"],
            flaky.clone(),
            None,
            options().with_retry_policy(RetryPolicy::fixed(3, 10)),
        )
        .unwrap();

        let started = Instant::now();
        bus.publish(Event::new("job.run", "scheduler")).await.unwrap();

        assert!(started.elapsed() >= Duration::from_millis(20));
        assert_eq!(flaky.calls(), 3);
        let metrics = bus.metrics();
        assert_eq!(metrics.events_processed, 1);
        assert_eq!(metrics.events_failed_processing, 0);
        assert_eq!(metrics.retries_scheduled, 2);
        assert!(bus.dead_letter_queue().is_empty());
    }

    #[tokio::test]
    async fn test_exponential_backoff_timing() {
        let bus = EventBus::default();
        let flaky = Recorder::failing("flaky", 3);
        bus.subscribe(
            ["job.run"],
            flaky.clone(),
            None,
            options().with_retry_policy(RetryPolicy::exponential(3, 5)),
        )
        .unwrap();

        let started = Instant::now();
        bus.publish(Event::new("job.run", "scheduler")).await.unwrap();

        // 5 + 10 + 20
        assert!(started.elapsed() >= Duration::from_millis(35));
        assert_eq!(flaky.calls(), 4);
        assert_eq!(bus.metrics().events_processed, 1);
    }

    // =============================================================================
    // DEAD LETTERING
    // =============================================================================

    #[tokio::test]
    async fn test_always_failing_handler_is_dead_lettered() {
        let bus = EventBus::default();
        let broken = Recorder::always_failing("broken");
        let sub = bus
            .subscribe(
                ["widget.loaded"],
                broken.clone(),
                None,
                options().with_retry_policy(RetryPolicy::fixed(1, 1)),
            )
            .unwrap();

        bus.publish(Event::new("widget.loaded", "w1")).await.unwrap();

        let dlq = bus.dead_letter_queue();
        assert_eq!(dlq.len(), 1);
        assert_eq!(dlq[0].subscription_id(), sub);
        assert!(!dlq[0].failure_reason().is_empty());
        let annotation = dlq[0].event.metadata.failure.as_ref().unwrap();
        assert_eq!(annotation.failed_subscription_id, sub);
        assert_eq!(broken.calls(), 2);
        assert_eq!(bus.metrics().events_failed_processing, 1);
    }

    #[tokio::test]
    async fn test_dead_letter_queue_disabled_surfaces_error() {
        let bus = EventBus::default();
        let broken = Recorder::always_failing("broken");
        let healthy = Recorder::new("healthy");
        bus.subscribe(
            ["order.placed"],
            broken.clone(),
            None,
            options()
                .with_retry_policy(RetryPolicy::no_retry())
                .with_dead_letter_queue(false),
        )
        .unwrap();
        bus.subscribe(["order.placed"], healthy.clone(), None, options())
            .unwrap();

        let err = bus
            .publish(Event::new("order.placed", "shop"))
            .await
            .unwrap_err();

        assert!(matches!(err, BusError::Handler { attempts: 1, .. }));
        assert!(err.to_string().contains("broken attempt 1 failed"));
        assert_eq!(healthy.calls(), 1);
        assert_eq!(bus.event_history(&HistoryFilter::new()).len(), 1);
    }

    #[tokio::test]
    async fn test_persistence_failure_never_blocks_delivery() {
        let store = Arc::new(InMemoryEventStore::new());
        store.set_failing(true);
        let bus = EventBus::builder().event_store(store.clone()).build();
        let recorder = Recorder::new("r");
        bus.subscribe(["a"], recorder.clone(), None, options()).unwrap();

        bus.publish(Event::new("a", "s")).await.unwrap();

        assert_eq!(recorder.calls(), 1);
        assert!(store.is_empty());
        assert_eq!(bus.metrics().events_published, 1);
    }

    // =============================================================================
    // HISTORY & REPLAY
    // =============================================================================

    #[tokio::test]
    async fn test_history_query_filters() {
        let bus = EventBus::default();
        for (i, (event_type, source)) in [("a", "s1"), ("b", "s1"), ("a", "s2"), ("a", "s1")]
            .into_iter()
            .enumerate()
        {
            bus.publish(Event::new(event_type, source).with_timestamp(100 + i as u64))
                .await
                .unwrap();
        }

        let by_type = bus.event_history(&HistoryFilter::new().event_types(["a"]));
        assert_eq!(by_type.len(), 3);

        let by_source = bus.event_history(&HistoryFilter::new().event_types(["a"]).source("s1"));
        assert_eq!(by_source.len(), 2);

        let latest = bus.event_history(&HistoryFilter::new().limit(1));
        assert_eq!(latest[0].timestamp(), 103);

        let window = bus.event_history(&HistoryFilter::new().since(101).until(102));
        assert_eq!(window.len(), 2);
    }

    #[tokio::test]
    async fn test_replay_after_late_subscription() {
        let bus = EventBus::default();
        for i in 0..5 {
            bus.publish(Event::new("audit.entry", "svc").with_timestamp(1_000 + i))
                .await
                .unwrap();
        }

        let late = Recorder::new("late");
        let other = Recorder::new("other");
        let late_id = bus
            .subscribe(["audit.entry"], late.clone(), None, options().with_batch_size(2))
            .unwrap();
        bus.subscribe(["audit.entry"], other.clone(), None, options())
            .unwrap();
        assert_eq!(late.calls(), 0);

        let summary = bus.replay(&late_id, None, None).await.unwrap();

        assert_eq!(
            summary,
            ReplaySummary {
                matched: 5,
                succeeded: 5,
                failed: 0
            }
        );
        let timestamps: Vec<u64> = late.seen().iter().map(Event::timestamp).collect();
        assert_eq!(timestamps, vec![1_000, 1_001, 1_002, 1_003, 1_004]);
        assert_eq!(other.calls(), 0);
        assert_eq!(bus.metrics().events_published, 5);
    }

    #[tokio::test]
    async fn test_replay_restricted_by_types_and_filter() {
        let bus = EventBus::default();
        bus.publish(Event::new("a", "s1").with_timestamp(1)).await.unwrap();
        bus.publish(Event::new("b", "s1").with_timestamp(2)).await.unwrap();
        bus.publish(Event::new("a", "s2").with_timestamp(3)).await.unwrap();

        let recorder = Recorder::new("r");
        let id = bus
            .subscribe(
                ["a", "b"],
                recorder.clone(),
                Some(SubscriptionFilter::new().source("s1")),
                options(),
            )
            .unwrap();

        let summary = bus
            .replay(&id, None, Some(vec![EventType::new("a")]))
            .await
            .unwrap();
        assert_eq!(summary.matched, 1);
        assert_eq!(recorder.seen()[0].timestamp(), 1);
    }

    #[tokio::test]
    async fn test_replay_failures_dead_letter() {
        let bus = EventBus::default();
        bus.publish(Event::new("a", "s")).await.unwrap();
        bus.publish(Event::new("a", "s")).await.unwrap();

        let broken = Recorder::always_failing("broken");
        let id = bus
            .subscribe(
                ["a"],
                broken.clone(),
                None,
                options().with_retry_policy(RetryPolicy::no_retry()),
            )
            .unwrap();

        let summary = bus.replay(&id, None, None).await.unwrap();
        assert_eq!(summary.failed, 2);
        assert_eq!(bus.dead_letter_queue().len(), 2);
        assert_eq!(bus.metrics().events_failed_processing, 2);
    }

    #[tokio::test]
    async fn test_schema_rejects_before_log() {
        let bus = EventBus::default();
        bus.declare_schema(
            "widget.message",
            PayloadSchema::new()
                .require("text", ValueKind::String)
                .deny_unknown_fields(),
        );
        let recorder = Recorder::new("r");
        bus.subscribe(["widget.message"], recorder.clone(), None, options())
            .unwrap();

        let result = bus
            .publish(Event::new("widget.message", "w1").with_data(json!({"text": "hi", "x": 1})))
            .await;

        assert!(matches!(
            result,
            Err(BusError::Validation(ValidationError::SchemaViolation { .. }))
        ));
        assert!(bus.event_history(&HistoryFilter::new()).is_empty());
        assert_eq!(recorder.calls(), 0);
    }

    // =============================================================================
    // TYPED EVENTS
    // =============================================================================

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct OrderPlaced {
        order_id: u64,
        total_cents: u64,
    }

    impl TypedEvent for OrderPlaced {
        const EVENT_TYPE: &'static str = "order.placed";
    }

    #[tokio::test]
    async fn test_typed_publish_and_subscribe() {
        let bus = EventBus::default();
        let revenue = Arc::new(AtomicU64::new(0));
        let sink = revenue.clone();
        bus.subscribe_typed(
            move |envelope: TypedEnvelope<OrderPlaced>| {
                let sink = sink.clone();
                async move {
                    sink.fetch_add(envelope.payload.total_cents, Ordering::SeqCst);
                    Ok(())
                }
            },
            None,
            options(),
        )
        .unwrap();

        bus.publish_typed(
            "shop",
            &OrderPlaced {
                order_id: 1,
                total_cents: 1_250,
            },
        )
        .await
        .unwrap();
        bus.publish_typed(
            "shop",
            &OrderPlaced {
                order_id: 2,
                total_cents: 750,
            },
        )
        .await
        .unwrap();

        assert_eq!(revenue.load(Ordering::SeqCst), 2_000);
        let info = &bus.subscriptions()[0];
        assert_eq!(info.handler, "order.placed");
    }

    #[tokio::test]
    async fn test_bus_behind_api_port() {
        let api: Arc<dyn EventBusApi> = Arc::new(EventBus::default());
        let recorder = Recorder::new("port");
        let id = api
            .subscribe(vec![EventType::new("a")], recorder.clone(), None, options())
            .unwrap();

        api.publish(Event::new("a", "s")).await.unwrap();
        assert_eq!(recorder.calls(), 1);
        assert_eq!(api.subscription(&id).unwrap().handler, "port");

        api.unsubscribe(&id).unwrap();
        assert!(matches!(api.unsubscribe(&id), Err(BusError::NotFound(_))));
        assert_eq!(api.metrics().subscriptions_active, 0);
        assert_eq!(api.clear_dead_letter_queue(&ActorContext::system()), 0);
    }
}
