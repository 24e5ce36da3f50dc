//! Prometheus metrics for the API server.

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

pub fn init_metrics() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

/// HTTP-layer metric names. Task/scheduler metrics (admitted/completed/
/// failed counts, active-slot and queue-depth gauges) are owned by
/// `txo_scheduler::metrics` instead, emitted where those transitions
/// actually happen; they still surface on this same `/metrics` endpoint
/// since the Prometheus recorder is process-global.
pub mod names {
    pub const HTTP_REQUESTS_TOTAL: &str = "txo_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "txo_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "txo_http_requests_in_flight";
}

pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Collapses `/transcribe/{task_id}`-shaped paths to a stable label so the
/// cardinality of the `path` metric tag stays bounded.
fn sanitize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').collect();
    match segments.as_slice() {
        ["", "transcribe", id] if !matches!(*id, "batch-audio" | "extract-audio" | "batch-video") => {
            "/transcribe/:task_id".to_string()
        }
        ["", "transcribe", id, rest] if !matches!(*id, "batch-audio" | "extract-audio" | "batch-video") => {
            format!("/transcribe/:task_id/{rest}")
        }
        _ => path.to_string(),
    }
}

pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);
    let response = next.run(request).await;
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    record_http_request(&method, &path, response.status().as_u16(), start.elapsed().as_secs_f64());
    response
}
