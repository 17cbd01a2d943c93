//! Push timing metrics.
//!
//! Every store submit call is timed and recorded under a key
//! ([`BATCH_PUSH`] for the writer). Samples go to a prometheus registry so
//! they can be rendered in exposition format, and [`PushMetrics::totals`]
//! reads them back as per-key counts and summed durations.
//!
//! **Histograms:**
//! - `tsw_capture_seconds{key}`: duration of each captured call
//!
//! **Counters:**
//! - `tsw_captures_total{key}`: captured calls

use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Key under which the writer records each batch push.
pub const BATCH_PUSH: &str = "batch_push";

/// Accumulated samples of one key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MetricTotal {
    pub count: u64,
    /// Sum of all samples, in seconds.
    pub total_seconds: f64,
}

impl MetricTotal {
    pub fn total(&self) -> Duration {
        Duration::from_secs_f64(self.total_seconds.max(0.0))
    }
}

/// Prometheus-backed timing registry shared by clones.
#[derive(Clone)]
pub struct PushMetrics {
    registry: Registry,
    capture_seconds: HistogramVec,
    captures_total: IntCounterVec,
}

impl PushMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let capture_seconds = HistogramVec::new(
            HistogramOpts::new("tsw_capture_seconds", "Duration of captured calls in seconds")
                .buckets(vec![0.0001, 0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["key"],
        )?;
        registry.register(Box::new(capture_seconds.clone()))?;

        let captures_total = IntCounterVec::new(
            Opts::new("tsw_captures_total", "Total captured calls"),
            &["key"],
        )?;
        registry.register(Box::new(captures_total.clone()))?;

        Ok(Self {
            registry,
            capture_seconds,
            captures_total,
        })
    }

    /// Record one sample under `key`.
    pub fn record(&self, key: &str, elapsed: Duration) {
        self.capture_seconds
            .with_label_values(&[key])
            .observe(elapsed.as_secs_f64());
        self.captures_total.with_label_values(&[key]).inc();
    }

    /// Time `f` and record it under `key`.
    pub fn capture<T>(&self, key: &str, f: impl FnOnce() -> T) -> (T, Duration) {
        let started = Instant::now();
        let value = f();
        let elapsed = started.elapsed();
        self.record(key, elapsed);
        (value, elapsed)
    }

    /// Count and summed duration per key.
    pub fn totals(&self) -> BTreeMap<String, MetricTotal> {
        let mut totals = BTreeMap::new();
        for family in self.registry.gather() {
            if family.get_name() != "tsw_capture_seconds" {
                continue;
            }
            for metric in family.get_metric() {
                let Some(key) = metric
                    .get_label()
                    .iter()
                    .find(|label| label.get_name() == "key")
                else {
                    continue;
                };
                let histogram = metric.get_histogram();
                totals.insert(
                    key.get_value().to_string(),
                    MetricTotal {
                        count: histogram.get_sample_count(),
                        total_seconds: histogram.get_sample_sum(),
                    },
                );
            }
        }
        totals
    }

    /// Totals of one key; zero when nothing was recorded.
    pub fn total(&self, key: &str) -> MetricTotal {
        self.totals().remove(key).unwrap_or_default()
    }

    /// Drop all samples.
    pub fn clear(&self) {
        self.capture_seconds.reset();
        self.captures_total.reset();
    }

    /// Render all metrics in prometheus text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

impl std::fmt::Debug for PushMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushMetrics")
            .field("totals", &self.totals())
            .finish()
    }
}
