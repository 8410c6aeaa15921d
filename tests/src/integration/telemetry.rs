//! # Telemetry Integration
//!
//! `relay-telemetry` wired to a live bus: Prometheus export of the bus
//! metrics, and the logging helpers used around publish and subscribe.

#[cfg(test)]
mod tests {
    use crate::fixtures::Recorder;
    use relay_bus::{Event, EventBus, RetryPolicy, SubscriptionOptions};
    use relay_telemetry::{
        bus_span, init_telemetry, log_bus_event, log_subscription_event, BusMetricsExporter,
        TelemetryConfig,
    };

    async fn busy_bus() -> EventBus {
        let bus = EventBus::default();
        bus.subscribe(
            ["order.placed"],
            Recorder::new("ok"),
            None,
            SubscriptionOptions::default(),
        )
        .unwrap();
        bus.subscribe(
            ["order.placed"],
            Recorder::always_failing("broken"),
            None,
            SubscriptionOptions::default().with_retry_policy(RetryPolicy::fixed(1, 1)),
        )
        .unwrap();
        for _ in 0..3 {
            bus.publish(Event::new("order.placed", "shop")).await.unwrap();
        }
        bus
    }

    // =============================================================================
    // METRICS EXPORT
    // =============================================================================

    #[tokio::test]
    async fn test_exporter_mirrors_live_bus() {
        let bus = busy_bus().await;
        let exporter = BusMetricsExporter::new("shop").unwrap();

        exporter.observe(&bus);
        let text = exporter.encode().unwrap();

        assert!(text.contains("shop_bus_events_published 3"));
        assert!(text.contains("shop_bus_events_processed 3"));
        assert!(text.contains("shop_bus_events_failed_processing 3"));
        assert!(text.contains("shop_bus_retries_scheduled 3"));
        assert!(text.contains("shop_bus_subscriptions_active 2"));
        assert!(text.contains("shop_bus_dead_letter_queue_size 3"));
    }

    #[tokio::test]
    async fn test_exporter_tracks_changes_between_scrapes() {
        let bus = busy_bus().await;
        let exporter = BusMetricsExporter::new("shop").unwrap();
        exporter.observe(&bus);

        bus.clear_dead_letter_queue(&relay_bus::ActorContext::system());
        exporter.observe(&bus);

        let text = exporter.encode().unwrap();
        assert!(text.contains("shop_bus_dead_letter_queue_size 0"));
        assert!(text.contains("shop_bus_events_failed_processing 3"));
    }

    #[test]
    fn test_namespace_from_service_name() {
        let config = TelemetryConfig {
            service_name: "order-router".to_string(),
            ..TelemetryConfig::default()
        };
        let namespace = config.metrics_namespace();
        assert_eq!(namespace, "order_router");
        assert!(BusMetricsExporter::new(&namespace).is_ok());
    }

    // =============================================================================
    // LOGGING
    // =============================================================================

    #[tokio::test]
    async fn test_telemetry_guard_exports_bus() {
        let config = TelemetryConfig {
            service_name: "relay-it".to_string(),
            console_output: false,
            ..TelemetryConfig::default()
        };
        let telemetry = init_telemetry(config).unwrap();

        let bus = busy_bus().await;
        telemetry.exporter().observe(&bus);

        let text = telemetry.exporter().encode().unwrap();
        assert!(text.contains("relay_it_bus_events_published 3"));
    }

    #[tokio::test]
    async fn test_logging_macros_accept_bus_types() {
        let bus = EventBus::default();
        let recorder = Recorder::new("logged");
        let id = bus
            .subscribe(["audit"], recorder.clone(), None, SubscriptionOptions::default())
            .unwrap();
        bus.publish(Event::new("audit", "svc").with_id("evt-1"))
            .await
            .unwrap();

        let span = bus_span!("audit_check", subscription_id = %id);
        let _entered = span.enter();
        let event = &recorder.seen()[0];
        log_bus_event!(info, "Audit event handled", event);
        log_bus_event!(debug, "Audit event handled", event, attempts = 1);
        log_subscription_event!(warn, "Subscription lagging", id, backlog = 0);
        log_subscription_event!(info, "Subscription healthy", id);
    }
}
