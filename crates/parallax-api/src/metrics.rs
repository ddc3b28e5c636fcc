//! Prometheus metrics for the API server.

use std::sync::OnceLock;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use regex_lite::Regex;

/// Install the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "parallax_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "parallax_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "parallax_http_requests_in_flight";

    // Job metrics
    pub const JOBS_ENQUEUED_TOTAL: &str = "parallax_jobs_enqueued_total";
    pub const SUBMISSIONS_REJECTED_TOTAL: &str = "parallax_submissions_rejected_total";
    pub const UPLOAD_BYTES: &str = "parallax_upload_bytes";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record job enqueued.
pub fn record_job_enqueued(effects: usize) {
    let labels = [("effects", effects.to_string())];
    counter!(names::JOBS_ENQUEUED_TOTAL, &labels).increment(1);
}

/// Record a submission rejected before dispatch.
pub fn record_submission_rejected(reason: &str) {
    let labels = [("reason", reason.to_string())];
    counter!(names::SUBMISSIONS_REJECTED_TOTAL, &labels).increment(1);
}

/// Record an accepted upload's size.
pub fn record_upload_bytes(bytes: usize) {
    histogram!(names::UPLOAD_BYTES).record(bytes as f64);
}

/// Sanitize path for metrics labels (collapse task IDs).
fn sanitize_path(path: &str) -> String {
    static TASK_ID: OnceLock<Regex> = OnceLock::new();
    let task_id =
        TASK_ID.get_or_init(|| Regex::new(r"/task_status/[^/]+").expect("valid task id pattern"));
    task_id.replace_all(path, "/task_status/:task_id").into_owned()
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}
