//! Metrics collection with Prometheus
//!
//! This module provides Prometheus metrics for VeilGate:
//! - Invocation counts (total, success, failure by scan mode)
//! - Latency histograms for end-to-end invocations
//! - Byte volume counters (read from the store, emitted to sinks)
//! - Confirmed redaction counts by detector
//! - Chunk counts per invocation
//! - Fetch retry counts

use prometheus::{Counter, CounterVec, Histogram, HistogramOpts, HistogramVec, Opts, Registry};
use std::sync::Arc;

use veilgate_core::RedactionReport;

/// Metrics collector for VeilGate
#[derive(Clone)]
pub struct Metrics {
    /// Prometheus registry
    registry: Arc<Registry>,

    // Invocation counters
    /// Total invocations handled
    pub requests_total: CounterVec,
    /// Successful invocations
    pub requests_success: CounterVec,
    /// Failed invocations
    pub requests_failure: CounterVec,

    // Latency histograms
    /// Total invocation duration (end-to-end)
    pub request_duration_seconds: HistogramVec,

    // Volume counters
    /// Bytes read from the object store
    pub bytes_read_total: Counter,
    /// Bytes emitted to response sinks
    pub bytes_emitted_total: Counter,

    // Redaction metrics
    /// Confirmed redactions by detector
    pub redactions_total: CounterVec,
    /// Chunks emitted per invocation
    pub chunks_per_request: Histogram,

    // Retry metrics
    /// Transient fetch failures retried before any bytes were emitted
    pub fetch_retries_total: Counter,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        // Invocation counters
        let requests_total = CounterVec::new(
            Opts::new("veilgate_requests_total", "Total number of invocations"),
            &["mode"],
        )?;

        let requests_success = CounterVec::new(
            Opts::new(
                "veilgate_requests_success_total",
                "Total number of successful invocations",
            ),
            &["mode"],
        )?;

        let requests_failure = CounterVec::new(
            Opts::new(
                "veilgate_requests_failure_total",
                "Total number of failed invocations",
            ),
            &["mode", "code"],
        )?;

        // Latency histograms
        let request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "veilgate_request_duration_seconds",
                "Invocation duration in seconds",
            )
            .buckets(vec![
                0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ]),
            &["mode"],
        )?;

        // Volume counters
        let bytes_read_total = Counter::with_opts(Opts::new(
            "veilgate_bytes_read_total",
            "Total bytes read from the object store",
        ))?;

        let bytes_emitted_total = Counter::with_opts(Opts::new(
            "veilgate_bytes_emitted_total",
            "Total bytes emitted to response sinks",
        ))?;

        // Redaction metrics
        let redactions_total = CounterVec::new(
            Opts::new(
                "veilgate_redactions_total",
                "Total confirmed redactions by detector",
            ),
            &["detector"],
        )?;

        let chunks_per_request = Histogram::with_opts(
            HistogramOpts::new(
                "veilgate_chunks_per_request",
                "Chunks emitted per invocation",
            )
            .buckets(vec![1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 1000.0]),
        )?;

        // Retry metrics
        let fetch_retries_total = Counter::with_opts(Opts::new(
            "veilgate_fetch_retries_total",
            "Total transient fetch failures retried",
        ))?;

        // Register all metrics
        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(requests_success.clone()))?;
        registry.register(Box::new(requests_failure.clone()))?;
        registry.register(Box::new(request_duration_seconds.clone()))?;
        registry.register(Box::new(bytes_read_total.clone()))?;
        registry.register(Box::new(bytes_emitted_total.clone()))?;
        registry.register(Box::new(redactions_total.clone()))?;
        registry.register(Box::new(chunks_per_request.clone()))?;
        registry.register(Box::new(fetch_retries_total.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            requests_total,
            requests_success,
            requests_failure,
            request_duration_seconds,
            bytes_read_total,
            bytes_emitted_total,
            redactions_total,
            chunks_per_request,
            fetch_retries_total,
        })
    }

    /// Get the Prometheus registry for exporting metrics
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record a successful invocation
    ///
    /// `mode` is `"scanned"` or `"passthrough"` depending on whether the
    /// object was run through the detector registry.
    pub fn record_request_success(&self, mode: &str, report: &RedactionReport, duration_secs: f64) {
        self.requests_total.with_label_values(&[mode]).inc();
        self.requests_success.with_label_values(&[mode]).inc();
        self.request_duration_seconds
            .with_label_values(&[mode])
            .observe(duration_secs);
        self.bytes_read_total.inc_by(report.bytes_in as f64);
        self.bytes_emitted_total.inc_by(report.bytes_out as f64);
        self.chunks_per_request.observe(report.chunks_emitted as f64);

        for (detector, count) in &report.redactions {
            if *count > 0 {
                self.redactions_total
                    .with_label_values(&[detector])
                    .inc_by(*count as f64);
            }
        }
    }

    /// Record a failed invocation with its stable error code
    pub fn record_request_failure(&self, mode: &str, code: &str, duration_secs: f64) {
        self.requests_total.with_label_values(&[mode]).inc();
        self.requests_failure
            .with_label_values(&[mode, code])
            .inc();
        self.request_duration_seconds
            .with_label_values(&[mode])
            .observe(duration_secs);
    }

    /// Record a transient fetch failure that was retried
    pub fn record_fetch_retry(&self) {
        self.fetch_retries_total.inc();
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> RedactionReport {
        RedactionReport {
            bytes_in: 52,
            bytes_out: 47,
            chunks_emitted: 3,
            redactions: vec![("email".to_string(), 2), ("phone".to_string(), 0)],
        }
    }

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert!(!metrics.registry().gather().is_empty());
    }

    #[test]
    fn test_record_request_success() {
        let metrics = Metrics::new().unwrap();
        metrics.record_request_success("scanned", &report(), 0.1);

        let gathered = metrics.registry().gather();
        let total_metric = gathered
            .iter()
            .find(|m| m.name() == "veilgate_requests_total")
            .expect("requests_total metric not found");

        assert_eq!(
            total_metric.metric[0]
                .counter
                .as_ref()
                .unwrap()
                .value
                .unwrap(),
            1.0
        );
    }

    #[test]
    fn test_record_request_failure() {
        let metrics = Metrics::new().unwrap();
        metrics.record_request_failure("scanned", "FETCH_NOT_FOUND", 0.05);

        let gathered = metrics.registry().gather();
        let failure_metric = gathered
            .iter()
            .find(|m| m.name() == "veilgate_requests_failure_total")
            .expect("requests_failure_total metric not found");

        assert_eq!(
            failure_metric.metric[0]
                .counter
                .as_ref()
                .unwrap()
                .value
                .unwrap(),
            1.0
        );
    }

    #[test]
    fn test_record_byte_volumes() {
        let metrics = Metrics::new().unwrap();
        metrics.record_request_success("scanned", &report(), 0.1);

        let gathered = metrics.registry().gather();
        let read_metric = gathered
            .iter()
            .find(|m| m.name() == "veilgate_bytes_read_total")
            .expect("bytes_read_total metric not found");

        assert_eq!(
            read_metric.metric[0]
                .counter
                .as_ref()
                .unwrap()
                .value
                .unwrap(),
            52.0
        );
    }

    #[test]
    fn test_record_redactions_skips_idle_detectors() {
        let metrics = Metrics::new().unwrap();
        metrics.record_request_success("scanned", &report(), 0.1);

        let gathered = metrics.registry().gather();
        let redactions_metric = gathered
            .iter()
            .find(|m| m.name() == "veilgate_redactions_total")
            .expect("redactions_total metric not found");

        // Only "email" fired; "phone" had zero hits and gets no series.
        assert_eq!(redactions_metric.metric.len(), 1);
        assert_eq!(
            redactions_metric.metric[0]
                .counter
                .as_ref()
                .unwrap()
                .value
                .unwrap(),
            2.0
        );
    }

    #[test]
    fn test_record_fetch_retry() {
        let metrics = Metrics::new().unwrap();
        metrics.record_fetch_retry();
        metrics.record_fetch_retry();

        let gathered = metrics.registry().gather();
        let retry_metric = gathered
            .iter()
            .find(|m| m.name() == "veilgate_fetch_retries_total")
            .expect("fetch_retries_total metric not found");

        assert_eq!(
            retry_metric.metric[0]
                .counter
                .as_ref()
                .unwrap()
                .value
                .unwrap(),
            2.0
        );
    }
}
