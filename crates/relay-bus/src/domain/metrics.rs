//! # Bus Metrics
//!
//! Counters for published, processed and failed events plus an average
//! processing latency.
//!
//! The average is computed over a bounded window of the most recent samples
//! (1000 by default), so it is an approximation of recent behaviour rather
//! than an exact all-time mean.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Default number of latency samples retained.
pub const DEFAULT_LATENCY_WINDOW: usize = 1000;

// =============================================================================
// LATENCY WINDOW
// =============================================================================

/// Ring buffer of recent latency samples in milliseconds.
#[derive(Debug)]
struct LatencyWindow {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl LatencyWindow {
    fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, sample_ms: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample_ms);
    }

    fn average(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }
}

// =============================================================================
// COLLECTOR
// =============================================================================

/// Metrics collector shared by the dispatcher, retry loop and replay.
#[derive(Debug)]
pub struct BusMetrics {
    events_published: AtomicU64,
    events_processed: AtomicU64,
    events_failed_processing: AtomicU64,
    retries_scheduled: AtomicU64,
    latencies: Mutex<LatencyWindow>,
}

impl BusMetrics {
    #[must_use]
    pub fn new(latency_window: usize) -> Self {
        Self {
            events_published: AtomicU64::new(0),
            events_processed: AtomicU64::new(0),
            events_failed_processing: AtomicU64::new(0),
            retries_scheduled: AtomicU64::new(0),
            latencies: Mutex::new(LatencyWindow::new(latency_window)),
        }
    }

    pub fn record_publish(&self) {
        self.events_published.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful delivery and its processing time.
    pub fn record_processed(&self, latency: Duration) {
        self.events_processed.fetch_add(1, Ordering::Relaxed);
        self.latencies.lock().push(latency.as_secs_f64() * 1000.0);
    }

    pub fn record_failure(&self) {
        self.events_failed_processing.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retries_scheduled.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn events_processed(&self) -> u64 {
        self.events_processed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn events_failed_processing(&self) -> u64 {
        self.events_failed_processing.load(Ordering::Relaxed)
    }

    /// Point-in-time view. Gauges owned by other components are passed in.
    #[must_use]
    pub fn snapshot(&self, subscriptions_active: usize, dead_letter_queue_size: usize) -> MetricsSnapshot {
        MetricsSnapshot {
            events_published: self.events_published(),
            events_processed: self.events_processed(),
            events_failed_processing: self.events_failed_processing(),
            retries_scheduled: self.retries_scheduled.load(Ordering::Relaxed),
            average_processing_time_ms: self.latencies.lock().average(),
            subscriptions_active,
            dead_letter_queue_size,
        }
    }
}

impl Default for BusMetrics {
    fn default() -> Self {
        Self::new(DEFAULT_LATENCY_WINDOW)
    }
}

/// Derived metrics view returned by `EventBus::metrics`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub events_published: u64,
    pub events_processed: u64,
    pub events_failed_processing: u64,
    pub retries_scheduled: u64,
    pub average_processing_time_ms: f64,
    pub subscriptions_active: usize,
    pub dead_letter_queue_size: usize,
}

// =============================================================================
// TESTS
// =============================================================================
