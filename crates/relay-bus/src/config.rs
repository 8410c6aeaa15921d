//! Bus configuration.

use crate::domain::dead_letter::DEFAULT_DLQ_RETENTION;
use crate::domain::metrics::DEFAULT_LATENCY_WINDOW;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Default event log capacity.
pub const DEFAULT_MAX_LOG_SIZE: usize = 10_000;

/// How the matched subscriptions of one event are scheduled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DispatchMode {
    /// One parallel subscription makes the whole event's fan-out concurrent;
    /// otherwise subscriptions run one after another, each through its full
    /// retry path.
    PerEvent,
    /// Parallel subscriptions run concurrently with everything else.
    /// Sequential ones are started in registration order, and a retrying
    /// subscription never holds up the next one.
    #[default]
    PerSubscription,
}

impl FromStr for DispatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "per-event" | "per_event" => Ok(Self::PerEvent),
            "per-subscription" | "per_subscription" => Ok(Self::PerSubscription),
            other => Err(format!("unknown dispatch mode: {other}")),
        }
    }
}

/// Whether `publish` waits for dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeliveryMode {
    /// `publish` returns after every matched subscription finished;
    /// exhausted failures without a DLQ surface as errors.
    #[default]
    Awaited,
    /// Dispatch runs on a spawned task; failures are only logged and counted.
    Detached,
}

impl FromStr for DeliveryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "awaited" | "sync" => Ok(Self::Awaited),
            "detached" | "async" => Ok(Self::Detached),
            other => Err(format!("unknown delivery mode: {other}")),
        }
    }
}

/// Configuration of an `EventBus`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusConfig {
    /// Event log capacity; the oldest event is evicted beyond it.
    pub max_log_size: usize,
    /// Age after which dead letter entries are swept.
    pub dlq_retention: Duration,
    pub dlq_sweep_interval: Duration,
    /// Latency samples kept for the processing time average.
    pub latency_window: usize,
    pub metrics_report_interval: Duration,
    pub dispatch_mode: DispatchMode,
    pub delivery_mode: DeliveryMode,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            max_log_size: DEFAULT_MAX_LOG_SIZE,
            dlq_retention: DEFAULT_DLQ_RETENTION,
            dlq_sweep_interval: Duration::from_secs(60),
            latency_window: DEFAULT_LATENCY_WINDOW,
            metrics_report_interval: Duration::from_secs(30),
            dispatch_mode: DispatchMode::default(),
            delivery_mode: DeliveryMode::default(),
        }
    }
}

impl BusConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `RELAY_MAX_LOG_SIZE`: Event log capacity (default: 10000)
    /// - `RELAY_DLQ_RETENTION_SECS`: DLQ retention (default: 86400)
    /// - `RELAY_DLQ_SWEEP_SECS`: DLQ sweep interval (default: 60)
    /// - `RELAY_LATENCY_WINDOW`: Latency samples kept (default: 1000)
    /// - `RELAY_METRICS_REPORT_SECS`: Metrics report interval (default: 30)
    /// - `RELAY_DISPATCH_MODE`: `per-event` or `per-subscription` (default)
    /// - `RELAY_DELIVERY_MODE`: `awaited` (default) or `detached`
    ///
    /// Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_log_size: parse_var("RELAY_MAX_LOG_SIZE").unwrap_or(defaults.max_log_size),
            dlq_retention: parse_var("RELAY_DLQ_RETENTION_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.dlq_retention),
            dlq_sweep_interval: parse_var("RELAY_DLQ_SWEEP_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.dlq_sweep_interval),
            latency_window: parse_var("RELAY_LATENCY_WINDOW").unwrap_or(defaults.latency_window),
            metrics_report_interval: parse_var("RELAY_METRICS_REPORT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.metrics_report_interval),
            dispatch_mode: parse_var("RELAY_DISPATCH_MODE").unwrap_or(defaults.dispatch_mode),
            delivery_mode: parse_var("RELAY_DELIVERY_MODE").unwrap_or(defaults.delivery_mode),
        }
    }

    #[must_use]
    pub fn with_max_log_size(mut self, max_log_size: usize) -> Self {
        self.max_log_size = max_log_size;
        self
    }

    #[must_use]
    pub fn with_dlq_retention(mut self, retention: Duration) -> Self {
        self.dlq_retention = retention;
        self
    }

    #[must_use]
    pub fn with_dlq_sweep_interval(mut self, interval: Duration) -> Self {
        self.dlq_sweep_interval = interval;
        self
    }

    #[must_use]
    pub fn with_latency_window(mut self, samples: usize) -> Self {
        self.latency_window = samples;
        self
    }

    #[must_use]
    pub fn with_metrics_report_interval(mut self, interval: Duration) -> Self {
        self.metrics_report_interval = interval;
        self
    }

    #[must_use]
    pub fn with_dispatch_mode(mut self, mode: DispatchMode) -> Self {
        self.dispatch_mode = mode;
        self
    }

    #[must_use]
    pub fn with_delivery_mode(mut self, mode: DeliveryMode) -> Self {
        self.delivery_mode = mode;
        self
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
