//! # Dispatch Scheduling
//!
//! How matched subscriptions interleave for a single event.
//!
//! Every test uses two subscriptions `a` and `b` registered in that order,
//! with `a` failing its first attempt and retrying after a fixed backoff.
//! The shared journal records attempts as `a1`, `a2`, `b1`.
//!
//! | Mode | Subscriptions | Expected order |
//! |------|---------------|----------------|
//! | per-subscription | both sequential | `a1 b1 a2` |
//! | per-event | both sequential | `a1 a2 b1` |
//! | per-event | `b` parallel | `a1 b1 a2` |
//!
//! Runs on a paused clock, so backoff sleeps complete instantly.

#[cfg(test)]
mod tests {
    use crate::fixtures::{journal, Journal, Recorder};
    use relay_bus::{
        BusConfig, DeliveryMode, DispatchMode, Event, EventBus, HistoryFilter, RetryPolicy,
        SubscriptionOptions,
    };
    use std::time::Duration;

    fn bus(mode: DispatchMode) -> EventBus {
        EventBus::new(BusConfig::default().with_dispatch_mode(mode))
    }

    fn retrying() -> SubscriptionOptions {
        SubscriptionOptions::default().with_retry_policy(RetryPolicy::fixed(2, 10))
    }

    fn entries(journal: &Journal) -> Vec<String> {
        journal.lock().clone()
    }

    // =============================================================================
    // PER SUBSCRIPTION
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_per_subscription_backoff_does_not_block_next() {
        let bus = bus(DispatchMode::PerSubscription);
        let log = journal();
        bus.subscribe(["job"], Recorder::journaled("a", 1, &log), None, retrying())
            .unwrap();
        bus.subscribe(["job"], Recorder::journaled("b", 0, &log), None, retrying())
            .unwrap();

        bus.publish(Event::new("job", "s")).await.unwrap();

        assert_eq!(entries(&log), vec!["a1", "b1", "a2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_subscription_first_attempts_follow_registration() {
        let bus = bus(DispatchMode::PerSubscription);
        let log = journal();
        for label in ["c", "a", "b"] {
            bus.subscribe(["job"], Recorder::journaled(label, 0, &log), None, retrying())
                .unwrap();
        }

        bus.publish(Event::new("job", "s")).await.unwrap();

        assert_eq!(entries(&log), vec!["c1", "a1", "b1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_subscription_parallel_joins_immediately() {
        let bus = bus(DispatchMode::PerSubscription);
        let log = journal();
        bus.subscribe(["job"], Recorder::journaled("a", 2, &log), None, retrying())
            .unwrap();
        bus.subscribe(
            ["job"],
            Recorder::journaled("p", 0, &log),
            None,
            retrying().with_parallel_processing(true),
        )
        .unwrap();

        bus.publish(Event::new("job", "s")).await.unwrap();

        assert_eq!(entries(&log), vec!["a1", "p1", "a2", "a3"]);
        assert_eq!(bus.metrics().events_processed, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_subscription_failure_does_not_stop_chain() {
        let bus = bus(DispatchMode::PerSubscription);
        let log = journal();
        bus.subscribe(
            ["job"],
            Recorder::journaled("a", u32::MAX, &log),
            None,
            SubscriptionOptions::default()
                .with_retry_policy(RetryPolicy::fixed(1, 10))
                .with_dead_letter_queue(false),
        )
        .unwrap();
        bus.subscribe(["job"], Recorder::journaled("b", 0, &log), None, retrying())
            .unwrap();

        let result = bus.publish(Event::new("job", "s")).await;

        assert!(result.is_err());
        assert_eq!(entries(&log), vec!["a1", "b1", "a2"]);
    }

    // =============================================================================
    // PER EVENT
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_per_event_sequential_waits_for_retries() {
        let bus = bus(DispatchMode::PerEvent);
        let log = journal();
        bus.subscribe(["job"], Recorder::journaled("a", 1, &log), None, retrying())
            .unwrap();
        bus.subscribe(["job"], Recorder::journaled("b", 0, &log), None, retrying())
            .unwrap();

        bus.publish(Event::new("job", "s")).await.unwrap();

        assert_eq!(entries(&log), vec!["a1", "a2", "b1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_event_any_parallel_runs_all_concurrently() {
        let bus = bus(DispatchMode::PerEvent);
        let log = journal();
        bus.subscribe(["job"], Recorder::journaled("a", 1, &log), None, retrying())
            .unwrap();
        bus.subscribe(
            ["job"],
            Recorder::journaled("b", 0, &log),
            None,
            retrying().with_parallel_processing(true),
        )
        .unwrap();

        bus.publish(Event::new("job", "s")).await.unwrap();

        assert_eq!(entries(&log), vec!["a1", "b1", "a2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_event_sequential_events_in_publish_order() {
        let bus = bus(DispatchMode::PerEvent);
        let a = Recorder::failing("a", 1);
        bus.subscribe(["job"], a.clone(), None, retrying()).unwrap();

        for id in ["e1", "e2", "e3"] {
            bus.publish(Event::new("job", "s").with_id(id)).await.unwrap();
        }

        let ids: Vec<String> = a.seen().iter().map(|e| e.id_str().to_string()).collect();
        assert_eq!(ids, vec!["e1", "e1", "e2", "e3"]);
    }

    // =============================================================================
    // DETACHED DELIVERY
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_detached_publish_returns_before_retries() {
        let bus = EventBus::new(BusConfig::default().with_delivery_mode(DeliveryMode::Detached));
        let a = Recorder::failing("a", 1);
        bus.subscribe(["job"], a.clone(), None, retrying()).unwrap();

        bus.publish(Event::new("job", "s")).await.unwrap();
        assert_eq!(bus.event_history(&HistoryFilter::new()).len(), 1);
        assert!(a.calls() <= 1);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(a.calls(), 2);
        assert_eq!(bus.metrics().events_processed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_detached_failure_is_not_reported_to_publisher() {
        let bus = EventBus::new(BusConfig::default().with_delivery_mode(DeliveryMode::Detached));
        bus.subscribe(
            ["job"],
            Recorder::always_failing("broken"),
            None,
            SubscriptionOptions::default()
                .with_retry_policy(RetryPolicy::no_retry())
                .with_dead_letter_queue(false),
        )
        .unwrap();

        assert!(bus.publish(Event::new("job", "s")).await.is_ok());

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(bus.metrics().events_failed_processing, 1);
        assert!(bus.dead_letter_queue().is_empty());
    }
}
