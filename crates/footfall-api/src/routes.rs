//! API routes.

use axum::middleware;
use axum::routing::{get, post, put};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::{
    begin_draft, commit_draft, delete_camera, discard_draft, draft_add_point, draft_delete_zone,
    draft_put_zone, draft_set_line, get_calibration, get_camera, get_camera_analytics, get_draft,
    health, list_cameras, put_line, put_zones, ready, refresh_camera, register_camera,
};
use crate::metrics::metrics_middleware;
use crate::middleware::{cors_layer, request_id, request_logging, security_headers};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let camera_routes = Router::new()
        .route("/cameras", get(list_cameras).post(register_camera))
        .route("/cameras/:camera_id", get(get_camera).delete(delete_camera))
        .route("/cameras/:camera_id/refresh", post(refresh_camera))
        .route("/cameras/:camera_id/analytics", get(get_camera_analytics));

    let calibration_routes = Router::new()
        // Committed snapshot and direct updates
        .route("/cameras/:camera_id/calibration", get(get_calibration))
        .route("/cameras/:camera_id/calibration/line", put(put_line))
        .route("/cameras/:camera_id/calibration/zones", put(put_zones))
        // Draft editing
        .route(
            "/cameras/:camera_id/calibration/draft",
            post(begin_draft).get(get_draft).delete(discard_draft),
        )
        .route("/cameras/:camera_id/calibration/draft/line", put(draft_set_line))
        .route(
            "/cameras/:camera_id/calibration/draft/zones/:zone_id",
            put(draft_put_zone).delete(draft_delete_zone),
        )
        .route(
            "/cameras/:camera_id/calibration/draft/zones/:zone_id/points",
            post(draft_add_point),
        )
        .route("/cameras/:camera_id/calibration/draft/commit", post(commit_draft));

    let api_routes = Router::new().merge(camera_routes).merge(calibration_routes);

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/ready", get(ready));

    // Metrics endpoint (if enabled)
    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
