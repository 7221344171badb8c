//! Metrics and observability utilities
//!
//! Prometheus metrics for HTTP traffic, workflow transitions, blob storage
//! and outgoing notifications.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all PaperDesk metrics
pub const METRICS_PREFIX: &str = "paperdesk";

/// Histogram buckets for request latency (in seconds).
/// Uploads dominate the tail, so the range reaches 10s.
pub const LATENCY_BUCKETS: &[f64] = &[
    0.005,  // 5ms
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
];

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    describe_counter!(
        format!("{}_transitions_total", METRICS_PREFIX),
        Unit::Count,
        "Workflow operations by outcome"
    );

    describe_histogram!(
        format!("{}_transition_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Workflow operation latency in seconds, including uploads"
    );

    describe_counter!(
        format!("{}_blob_operations_total", METRICS_PREFIX),
        Unit::Count,
        "Blob store puts and deletes"
    );

    describe_counter!(
        format!("{}_notifications_total", METRICS_PREFIX),
        Unit::Count,
        "Notifications dispatched after a committed transition"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Times one workflow operation and records its outcome label
pub struct TransitionTimer {
    start: Instant,
    operation: &'static str,
}

impl TransitionTimer {
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }

    /// `outcome` is `"ok"` or an error code name
    pub fn finish(self, outcome: &str) {
        counter!(
            format!("{}_transitions_total", METRICS_PREFIX),
            "operation" => self.operation,
            "outcome" => outcome.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_transition_duration_seconds", METRICS_PREFIX),
            "operation" => self.operation
        )
        .record(self.start.elapsed().as_secs_f64());
    }
}

/// Helper to record blob store metrics
pub fn record_blob(operation: &'static str, success: bool) {
    counter!(
        format!("{}_blob_operations_total", METRICS_PREFIX),
        "operation" => operation,
        "status" => if success { "success" } else { "error" }
    )
    .increment(1);
}

/// Helper to record notification metrics
pub fn record_notification(kind: &'static str, success: bool) {
    counter!(
        format!("{}_notifications_total", METRICS_PREFIX),
        "kind" => kind,
        "status" => if success { "sent" } else { "failed" }
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_buckets() {
        let mut prev = 0.0;
        for &bucket in LATENCY_BUCKETS {
            assert!(bucket > prev);
            prev = bucket;
        }
    }

    #[test]
    fn test_recorders_without_exporter() {
        // No recorder installed: every call is a no-op
        RequestMetrics::start("POST", "/v1/papers").finish(201);
        TransitionTimer::start("assign").finish("ok");
        record_blob("put", true);
        record_notification("paper_submitted", false);
    }
}
