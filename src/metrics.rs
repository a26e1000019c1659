/// Metrics and telemetry for Qinjian
///
/// Provides Prometheus-compatible metrics for monitoring:
/// - AI gateway calls and latencies
/// - Report generation outcomes
/// - Check-ins, uploads and registrations
/// - Background job execution

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, Encoder,
    HistogramVec, IntCounter, IntCounterVec, TextEncoder,
};

lazy_static! {
    // ========== AI Metrics ==========

    /// Chat-completion calls by kind and outcome
    pub static ref AI_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "ai_requests_total",
        "Total number of chat-completion requests",
        &["kind", "status"]
    )
    .unwrap();

    /// Chat-completion latency in seconds
    pub static ref AI_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "ai_request_duration_seconds",
        "Chat-completion latencies in seconds",
        &["kind"],
        vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0, 120.0]
    )
    .unwrap();

    // ========== Report Metrics ==========

    /// Report lifecycle transitions by type and resulting status
    pub static ref REPORTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "reports_total",
        "Total number of report status transitions",
        &["report_type", "status"]
    )
    .unwrap();

    // ========== Activity Metrics ==========

    /// Check-ins accepted
    pub static ref CHECKINS_TOTAL: IntCounter = register_int_counter!(
        "checkins_total",
        "Total number of check-ins"
    )
    .unwrap();

    /// Uploads by media kind
    pub static ref UPLOADS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "uploads_total",
        "Total number of accepted uploads",
        &["kind"]
    )
    .unwrap();

    /// Registrations
    pub static ref REGISTRATIONS_TOTAL: IntCounter = register_int_counter!(
        "registrations_total",
        "Total number of registered users"
    )
    .unwrap();

    /// Requests rejected by the rate limiter
    pub static ref RATE_LIMITED_TOTAL: IntCounter = register_int_counter!(
        "rate_limited_requests_total",
        "Total number of requests rejected by the rate limiter"
    )
    .unwrap();

    // ========== Background Job Metrics ==========

    /// Background job executions by job type and status
    pub static ref BACKGROUND_JOBS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "background_jobs_total",
        "Total number of background job executions",
        &["job_type", "status"]
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
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Record a chat-completion call
pub fn record_ai_request(kind: &str, success: bool, duration: f64) {
    AI_REQUESTS_TOTAL
        .with_label_values(&[kind, if success { "success" } else { "failure" }])
        .inc();
    AI_REQUEST_DURATION_SECONDS
        .with_label_values(&[kind])
        .observe(duration);
}

/// Record a report status transition
pub fn record_report(report_type: &str, status: &str) {
    REPORTS_TOTAL
        .with_label_values(&[report_type, status])
        .inc();
}

/// Record an accepted check-in
pub fn record_checkin() {
    CHECKINS_TOTAL.inc();
}

/// Record an accepted upload
pub fn record_upload(kind: &str) {
    UPLOADS_TOTAL.with_label_values(&[kind]).inc();
}

/// Record a registration
pub fn record_registration() {
    REGISTRATIONS_TOTAL.inc();
}

/// Record a rate-limited request
pub fn record_rate_limited() {
    RATE_LIMITED_TOTAL.inc();
}

/// Record a background job execution
pub fn record_background_job(job_type: &str, status: &str) {
    BACKGROUND_JOBS_TOTAL
        .with_label_values(&[job_type, status])
        .inc();
}
