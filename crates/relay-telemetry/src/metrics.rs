//! Prometheus export of the bus metrics.
//!
//! All metrics follow the naming convention: `<namespace>_bus_<metric>`
//!
//! The bus keeps its own counters; the exporter mirrors a `MetricsSnapshot`
//! into gauges on every `observe`, so scraping never touches bus locks for
//! longer than taking the snapshot.
//!
//! ## Exported Metrics
//!
//! | Metric | Type | Source |
//! |--------|------|--------|
//! | `bus_events_published` | gauge | `events_published` |
//! | `bus_events_processed` | gauge | `events_processed` |
//! | `bus_events_failed_processing` | gauge | `events_failed_processing` |
//! | `bus_retries_scheduled` | gauge | `retries_scheduled` |
//! | `bus_average_processing_time_ms` | gauge | `average_processing_time_ms` |
//! | `bus_subscriptions_active` | gauge | `subscriptions_active` |
//! | `bus_dead_letter_queue_size` | gauge | `dead_letter_queue_size` |

use prometheus::{Encoder, Gauge, IntGauge, Opts, Registry, TextEncoder};
use relay_bus::{EventBus, MetricsSnapshot};

use crate::TelemetryError;

/// Per-instance registry of bus gauges.
pub struct BusMetricsExporter {
    registry: Registry,
    events_published: IntGauge,
    events_processed: IntGauge,
    events_failed_processing: IntGauge,
    retries_scheduled: IntGauge,
    average_processing_time_ms: Gauge,
    subscriptions_active: IntGauge,
    dead_letter_queue_size: IntGauge,
}

impl BusMetricsExporter {
    /// Create an exporter whose metric names start with `namespace`.
    ///
    /// # Errors
    ///
    /// Fails when `namespace` is not a valid Prometheus name prefix.
    pub fn new(namespace: &str) -> Result<Self, TelemetryError> {
        let registry = Registry::new();
        let int_gauge = |name: &str, help: &str| -> Result<IntGauge, TelemetryError> {
            let gauge = IntGauge::with_opts(Opts::new(name, help).namespace(namespace))
                .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
            registry
                .register(Box::new(gauge.clone()))
                .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
            Ok(gauge)
        };

        let events_published = int_gauge("bus_events_published", "Events accepted by publish")?;
        let events_processed =
            int_gauge("bus_events_processed", "Successful handler deliveries")?;
        let events_failed_processing = int_gauge(
            "bus_events_failed_processing",
            "Deliveries that exhausted their retries",
        )?;
        let retries_scheduled = int_gauge("bus_retries_scheduled", "Handler retries scheduled")?;
        let subscriptions_active = int_gauge("bus_subscriptions_active", "Active subscriptions")?;
        let dead_letter_queue_size =
            int_gauge("bus_dead_letter_queue_size", "Entries in the dead letter queue")?;

        let average_processing_time_ms = Gauge::with_opts(
            Opts::new(
                "bus_average_processing_time_ms",
                "Average delivery time over the recent sample window",
            )
            .namespace(namespace),
        )
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
        registry
            .register(Box::new(average_processing_time_ms.clone()))
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

        Ok(Self {
            registry,
            events_published,
            events_processed,
            events_failed_processing,
            retries_scheduled,
            average_processing_time_ms,
            subscriptions_active,
            dead_letter_queue_size,
        })
    }

    /// Mirror a snapshot into the gauges.
    pub fn update(&self, snapshot: &MetricsSnapshot) {
        self.events_published.set(to_i64(snapshot.events_published));
        self.events_processed.set(to_i64(snapshot.events_processed));
        self.events_failed_processing
            .set(to_i64(snapshot.events_failed_processing));
        self.retries_scheduled.set(to_i64(snapshot.retries_scheduled));
        self.average_processing_time_ms
            .set(snapshot.average_processing_time_ms);
        self.subscriptions_active
            .set(to_i64(snapshot.subscriptions_active as u64));
        self.dead_letter_queue_size
            .set(to_i64(snapshot.dead_letter_queue_size as u64));
    }

    /// Take a fresh snapshot of `bus` and mirror it.
    pub fn observe(&self, bus: &EventBus) {
        self.update(&bus.metrics());
    }

    /// Encode all metrics as Prometheus text format.
    pub fn encode(&self) -> Result<String, TelemetryError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
    }

    /// Underlying registry, for callers merging it into a wider scrape.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
