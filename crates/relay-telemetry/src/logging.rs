//! Structured logging.
//!
//! Installs the global `tracing` subscriber. JSON output carries consistent
//! fields that log shippers can parse:
//! - `timestamp`: ISO 8601 timestamp
//! - `level`: Log level (trace, debug, info, warn, error)
//! - `target`: Emitting module (`relay_bus::service`, ...)
//! - `fields`: Event fields (`event_id`, `subscription_id`, `attempt`, ...)
//! - `spans`: Enclosing spans, e.g. `dispatch` with `trace_id` and
//!   `correlation_id`

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{TelemetryConfig, TelemetryError};

/// Handle returned once the global subscriber is installed.
#[derive(Debug)]
pub struct StructuredLogger {
    json: bool,
}

impl StructuredLogger {
    /// Whether log lines are emitted as JSON.
    pub fn is_json(&self) -> bool {
        self.json
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over `config.log_level`.
///
/// # Errors
///
/// Fails on an invalid filter directive or when a global subscriber is
/// already installed.
pub fn init_logging(config: &TelemetryConfig) -> Result<StructuredLogger, TelemetryError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| TelemetryError::Config(e.to_string()))?;

    if !config.console_output {
        tracing_subscriber::registry()
            .with(env_filter)
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    } else if config.json_logs {
        // JSON output for containers/production
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_current_span(true)
            .with_span_list(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(json_layer)
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    } else {
        // Pretty output for development
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .with_ansi(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    }

    tracing::debug!(
        service = %config.service_name,
        json_logs = config.json_logs,
        "Structured logging initialized"
    );

    Ok(StructuredLogger {
        json: config.json_logs,
    })
}

/// Log a bus event with the standard `event_id`/`event_type` fields.
///
/// ```rust,ignore
/// log_bus_event!(info, "Order accepted", event, order_total = 42);
/// ```
#[macro_export]
macro_rules! log_bus_event {
    ($level:ident, $msg:expr, $event:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            event_id = %$event.id_str(),
            event_type = %$event.event_type,
            source = %$event.source,
            $($($field)*,)?
            $msg
        )
    };
}

/// Log a subscription-related event with the standard `subscription_id` field.
#[macro_export]
macro_rules! log_subscription_event {
    ($level:ident, $msg:expr, $subscription_id:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            subscription_id = %$subscription_id,
            $($($field)*,)?
            $msg
        )
    };
}
