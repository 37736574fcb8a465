//! Detection metrics using OpenTelemetry.

use crate::notify::EventKind;
use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter};
use std::time::Instant;

/// Metrics collector for a watcher.
///
/// # Examples
///
/// ```rust,no_run
/// use attr_watch::metrics::WatchMetrics;
/// use opentelemetry::global;
///
/// let meter = global::meter("attr-watch");
/// let metrics = WatchMetrics::new(meter);
///
/// let started = std::time::Instant::now();
/// // ... run a poll pass ...
/// metrics.record_poll_pass(started);
/// ```
#[derive(Clone)]
pub struct WatchMetrics {
    poll_passes: Counter<u64>,
    poll_duration: Histogram<f64>,
    intercepted_writes: Counter<u64>,
    notifications: Counter<u64>,
    reclaimed_entries: Counter<u64>,
    active_entries: Gauge<i64>,
}

impl WatchMetrics {
    /// Create a new metrics collector with the provided meter.
    pub fn new(meter: Meter) -> Self {
        let poll_passes = meter
            .u64_counter("attr_watch.poll.passes")
            .with_description("Number of poll passes run")
            .build();

        let poll_duration = meter
            .f64_histogram("attr_watch.poll.duration")
            .with_description("Duration of poll passes in seconds")
            .with_unit("s")
            .build();

        let intercepted_writes = meter
            .u64_counter("attr_watch.intercept.writes")
            .with_description("Number of intercepted writes that changed a value")
            .build();

        let notifications = meter
            .u64_counter("attr_watch.notifications")
            .with_description("Number of notifications published")
            .build();

        let reclaimed_entries = meter
            .u64_counter("attr_watch.entries.reclaimed")
            .with_description("Entries dropped because their object was reclaimed")
            .build();

        let active_entries = meter
            .i64_gauge("attr_watch.entries.active")
            .with_description("Number of watched entries")
            .build();

        Self {
            poll_passes,
            poll_duration,
            intercepted_writes,
            notifications,
            reclaimed_entries,
            active_entries,
        }
    }

    /// Record a completed poll pass that began at `started`.
    pub fn record_poll_pass(&self, started: Instant) {
        self.poll_passes.add(1, &[]);
        self.poll_duration
            .record(started.elapsed().as_secs_f64(), &[]);
    }

    /// Record an intercepted write.
    pub fn record_intercepted_write(&self) {
        self.intercepted_writes.add(1, &[]);
    }

    /// Record one published notification.
    pub fn record_notification(&self, kind: EventKind) {
        self.notifications
            .add(1, &[KeyValue::new("channel", kind.name())]);
    }

    /// Record entries dropped after their objects were reclaimed.
    pub fn record_reclaimed(&self, count: usize) {
        if count > 0 {
            self.reclaimed_entries.add(count as u64, &[]);
        }
    }

    /// Update the number of watched entries.
    pub fn update_entry_count(&self, count: usize) {
        self.active_entries.record(count as i64, &[]);
    }
}
