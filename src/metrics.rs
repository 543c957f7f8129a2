/// Prometheus metrics
///
/// Covers HTTP traffic, authentication failures, the OTP flow, report
/// creation, and artifact cleanup outcomes.

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge, Encoder, HistogramVec,
    IntCounterVec, IntGauge, TextEncoder,
};

lazy_static! {
    // ========== HTTP Metrics ==========

    /// Total HTTP requests by method, path, and status
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    /// HTTP request duration in seconds
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request latencies in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    /// Active HTTP requests
    pub static ref HTTP_REQUESTS_ACTIVE: IntGauge = register_int_gauge!(
        "http_requests_active",
        "Number of HTTP requests currently being processed"
    )
    .unwrap();

    // ========== Auth Metrics ==========

    /// Rejected requests by reason
    pub static ref AUTH_FAILURES: IntCounterVec = register_int_counter_vec!(
        "auth_failures_total",
        "Total number of rejected authentication or authorization attempts",
        &["reason"]
    )
    .unwrap();

    /// OTP challenge events by outcome
    pub static ref OTP_CHALLENGES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "otp_challenges_total",
        "OTP challenges issued and verified, by outcome",
        &["outcome"]
    )
    .unwrap();

    // ========== Report Metrics ==========

    /// Reports created by type
    pub static ref REPORTS_CREATED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "reports_created_total",
        "Total number of reports created",
        &["report_type"]
    )
    .unwrap();

    /// Artifact deletions during cleanup and report removal
    pub static ref ARTIFACT_CLEANUPS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "artifact_cleanups_total",
        "File artifact cleanup attempts by result",
        &["result"]
    )
    .unwrap();
}

/// Render metrics in Prometheus text format
pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration);
}

/// Record an OTP flow event
pub fn record_otp(outcome: &str) {
    OTP_CHALLENGES_TOTAL.with_label_values(&[outcome]).inc();
}

/// Record a report
pub fn record_report_created(report_type: &str) {
    REPORTS_CREATED_TOTAL
        .with_label_values(&[report_type])
        .inc();
}

/// Record an artifact cleanup
pub fn record_artifact_cleanup(success: bool) {
    ARTIFACT_CLEANUPS_TOTAL
        .with_label_values(&[if success { "deleted" } else { "failed" }])
        .inc();
}
