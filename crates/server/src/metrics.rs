//! Application metrics for Prometheus monitoring.
//!
//! This module provides:
//! - Prometheus metrics recorder initialization
//! - Share-lifecycle counters (starts, admissions, cancels)
//! - Per-endpoint request counters and latency histograms

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;

use axum::http::StatusCode;

use crate::error::ApiResult;

/// Global Prometheus handle for rendering metrics.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// This should be called once at application startup, before any metrics are recorded.
/// Returns `true` if initialization succeeded, `false` if already initialized.
pub fn init_metrics() -> bool {
    if PROMETHEUS_HANDLE.get().is_some() {
        return false;
    }

    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();

    if metrics::set_global_recorder(recorder).is_err() {
        tracing::warn!("Failed to set global metrics recorder (already set)");
        return false;
    }

    if PROMETHEUS_HANDLE.set(handle).is_err() {
        tracing::warn!("Failed to store Prometheus handle (already set)");
    }

    describe_metrics();

    tracing::info!("Prometheus metrics initialized");
    true
}

fn describe_metrics() {
    describe_counter!(
        "share_requests_total",
        "Total number of API requests by endpoint and status"
    );
    describe_histogram!(
        "share_request_duration_seconds",
        "Duration of API requests in seconds"
    );
    describe_counter!("sessions_started_total", "Share sessions started");
    describe_counter!(
        "segments_admitted_total",
        "Segments admitted, labelled by acknowledgement"
    );
    describe_counter!(
        "sessions_cancelled_total",
        "Cancel requests that succeeded, labelled by acknowledgement"
    );
}

/// Render current metrics in Prometheus text format.
///
/// Returns `None` if metrics are not initialized.
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|h| h.render())
}

/// Record a completed API request.
pub fn record_request(endpoint: &str, status: &str, duration: std::time::Duration) {
    counter!("share_requests_total", "endpoint" => endpoint.to_string(), "status" => status.to_string())
        .increment(1);
    histogram!("share_request_duration_seconds", "endpoint" => endpoint.to_string())
        .record(duration.as_secs_f64());
}

pub fn record_session_started() {
    counter!("sessions_started_total").increment(1);
}

pub fn record_segment_admitted(ack: &'static str) {
    counter!("segments_admitted_total", "ack" => ack).increment(1);
}

pub fn record_session_cancelled(ack: &'static str) {
    counter!("sessions_cancelled_total", "ack" => ack).increment(1);
}

/// Helper for timing request handlers.
///
/// Usage:
/// ```ignore
/// let timer = RequestTimer::new("list_active_sessions");
/// let result = do_work().await;
/// timer.observe(StatusCode::OK, result)
/// ```
pub struct RequestTimer {
    endpoint: &'static str,
    start: Instant,
}

impl RequestTimer {
    pub fn new(endpoint: &'static str) -> Self {
        Self {
            endpoint,
            start: Instant::now(),
        }
    }

    /// Finish timing with an explicit status.
    pub fn finish(self, status: StatusCode) {
        record_request(self.endpoint, status.as_str(), self.start.elapsed());
    }

    /// Finish timing with the status `result` will produce, then hand it back.
    pub fn observe<T>(self, success: StatusCode, result: ApiResult<T>) -> ApiResult<T> {
        let status = match &result {
            Ok(_) => success,
            Err(e) => e.status_code(),
        };
        self.finish(status);
        result
    }
}
