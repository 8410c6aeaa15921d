//! # Relay Telemetry
//!
//! Observability for the relay event bus.
//!
//! ## Components
//!
//! - **Logging**: global `tracing` subscriber, pretty or JSON, filtered by
//!   `EnvFilter`
//! - **Metrics**: Prometheus text export of the bus `MetricsSnapshot`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use relay_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let config = TelemetryConfig::from_env();
//! let telemetry = init_telemetry(config)?;
//!
//! telemetry.exporter().observe(&bus);
//! let body = telemetry.exporter().encode()?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `RELAY_SERVICE_NAME` | `relay` | Service name and metrics namespace |
//! | `RELAY_LOG_LEVEL` | `info` | Log level filter (`RUST_LOG` also honoured) |
//! | `RELAY_CONSOLE_OUTPUT` | `true` | Emit log lines to stdout |
//! | `RELAY_JSON_LOGS` | `false` | JSON log lines (default `true` in containers) |

mod config;
mod logging;
mod metrics;

pub use config::TelemetryConfig;
pub use logging::{init_logging, StructuredLogger};
pub use metrics::BusMetricsExporter;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Install logging and create the metrics exporter.
///
/// The returned guard owns the exporter; keep it for the lifetime of the
/// application.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    // Metrics first: an invalid namespace should fail before the global
    // subscriber is installed.
    let exporter = BusMetricsExporter::new(&config.metrics_namespace())?;
    let logger = init_logging(&config)?;

    tracing::info!(
        service = %config.service_name,
        json_logs = logger.is_json(),
        "Telemetry initialized"
    );

    Ok(TelemetryGuard {
        _logger: logger,
        exporter,
        service_name: config.service_name,
    })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    _logger: StructuredLogger,
    exporter: BusMetricsExporter,
    service_name: String,
}

impl TelemetryGuard {
    pub fn exporter(&self) -> &BusMetricsExporter {
        &self.exporter
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Shutting down telemetry...");
    }
}

/// Convenience macro for creating a span with bus context.
///
/// # Example
///
/// ```rust,ignore
/// use relay_telemetry::bus_span;
///
/// let span = bus_span!("checkout", order_id = 17);
/// let _entered = span.enter();
/// ```
#[macro_export]
macro_rules! bus_span {
    ($name:expr, $($field:tt)*) => {
        tracing::info_span!($name, component = "relay-bus", $($field)*)
    };
}
