/// Metrics and telemetry
///
/// Prometheus-compatible counters exposed at /metrics:
/// - HTTP request counts
/// - Documents rendered by kind
/// - Rate limit rejections by bucket
/// - Failed credential checks

use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_counter_vec, Encoder, IntCounter, IntCounterVec,
    TextEncoder,
};

lazy_static! {
    /// Total HTTP requests by method, path and status
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    /// Documents rendered by the layout engine
    pub static ref DOCUMENTS_RENDERED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "documents_rendered_total",
        "Total number of PDF documents rendered",
        &["kind"]
    )
    .unwrap();

    /// Requests refused by the fixed-window limiter
    pub static ref RATE_LIMIT_REJECTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "rate_limit_rejections_total",
        "Requests rejected by the rate limiter",
        &["bucket"]
    )
    .unwrap();

    /// Failed password verifications
    pub static ref AUTH_FAILURES_TOTAL: IntCounter = register_int_counter!(
        "auth_failures_total",
        "Failed credential verifications"
    )
    .unwrap();
}

/// Render all registered metrics in the Prometheus text format
pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&families, &mut buffer) {
        tracing::warn!("failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
