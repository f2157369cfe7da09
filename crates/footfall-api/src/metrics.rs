//! Prometheus metrics for the API server.

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

/// Install the Prometheus recorder.
///
/// Worker metrics recorded through the `metrics` facade are exported too.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric name constants for consistency.
pub mod names {
    pub const HTTP_REQUESTS_TOTAL: &str = "footfall_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "footfall_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "footfall_http_requests_in_flight";
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

/// Replace camera and zone ids with placeholders to bound label cardinality.
fn sanitize_path(path: &str) -> String {
    let mut placeholder = None;
    path.split('/')
        .map(|segment| {
            let out = match placeholder.take() {
                Some(p) if !segment.is_empty() => p,
                _ => segment,
            };
            placeholder = match segment {
                "cameras" => Some(":camera_id"),
                "zones" => Some(":zone_id"),
                _ => None,
            };
            out
        })
        .collect::<Vec<_>>()
        .join("/")
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
    record_http_request(&method, &path, status, start.elapsed().as_secs_f64());

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path() {
        assert_eq!(sanitize_path("/api/cameras"), "/api/cameras");
        assert_eq!(sanitize_path("/api/cameras/lobby-2"), "/api/cameras/:camera_id");
        assert_eq!(
            sanitize_path("/api/cameras/lobby/calibration/draft/zones/z1/points"),
            "/api/cameras/:camera_id/calibration/draft/zones/:zone_id/points"
        );
        assert_eq!(sanitize_path("/health"), "/health");
    }
}
