//! Metrics and observability utilities
//!
//! Prometheus metrics for requests, logins, uploads and moderation.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all PaperVault metrics
pub const METRICS_PREFIX: &str = "papervault";

/// Histogram buckets for request latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001,  // 1ms
    0.005,  // 5ms
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s - password hashing, large uploads
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
        format!("{}_logins_total", METRICS_PREFIX),
        Unit::Count,
        "Login attempts by outcome"
    );

    describe_counter!(
        format!("{}_registrations_total", METRICS_PREFIX),
        Unit::Count,
        "Accounts created"
    );

    describe_counter!(
        format!("{}_uploads_total", METRICS_PREFIX),
        Unit::Count,
        "Paper uploads by outcome"
    );

    describe_counter!(
        format!("{}_upload_bytes_total", METRICS_PREFIX),
        Unit::Bytes,
        "Bytes written to the file store"
    );

    describe_counter!(
        format!("{}_moderation_actions_total", METRICS_PREFIX),
        Unit::Count,
        "Administrative actions applied"
    );

    describe_counter!(
        format!("{}_cascade_failures_total", METRICS_PREFIX),
        Unit::Count,
        "Stored files that could not be removed during a cascade"
    );

    describe_counter!(
        format!("{}_password_resets_total", METRICS_PREFIX),
        Unit::Count,
        "Password reset requests and completions"
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

/// Login attempt; outcome is "success", "invalid" or "banned"
pub fn record_login(outcome: &'static str) {
    counter!(
        format!("{}_logins_total", METRICS_PREFIX),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_registration() {
    counter!(format!("{}_registrations_total", METRICS_PREFIX)).increment(1);
}

/// Upload attempt and, when stored, its size
pub fn record_upload(outcome: &'static str, bytes: u64) {
    counter!(
        format!("{}_uploads_total", METRICS_PREFIX),
        "outcome" => outcome
    )
    .increment(1);

    if bytes > 0 {
        counter!(format!("{}_upload_bytes_total", METRICS_PREFIX)).increment(bytes);
    }
}

pub fn record_moderation(action: &'static str) {
    counter!(
        format!("{}_moderation_actions_total", METRICS_PREFIX),
        "action" => action
    )
    .increment(1);
}

pub fn record_cascade_failures(count: usize) {
    if count > 0 {
        counter!(format!("{}_cascade_failures_total", METRICS_PREFIX)).increment(count as u64);
    }
}

/// Reset stage is "requested" or "completed"
pub fn record_password_reset(stage: &'static str) {
    counter!(
        format!("{}_password_resets_total", METRICS_PREFIX),
        "stage" => stage
    )
    .increment(1);
}
