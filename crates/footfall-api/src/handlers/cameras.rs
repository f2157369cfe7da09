//! Camera management handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracing::info;

use footfall_models::{AnalyticsReport, CameraId};
use footfall_worker::{CameraSpec, CameraStatusView};

use crate::error::ApiResult;
use crate::state::AppState;

/// List every camera with its stream status.
pub async fn list_cameras(State(state): State<AppState>) -> Json<Vec<CameraStatusView>> {
    Json(state.fleet.statuses().await)
}

pub async fn get_camera(
    State(state): State<AppState>,
    Path(camera_id): Path<String>,
) -> ApiResult<Json<CameraStatusView>> {
    let status = state.fleet.status(&CameraId::from(camera_id)).await?;
    Ok(Json(status))
}

/// Register a camera and start supervising it.
///
/// The body uses the cameras file shape, so an already committed
/// calibration can be supplied along with the camera.
pub async fn register_camera(
    State(state): State<AppState>,
    Json(spec): Json<CameraSpec>,
) -> ApiResult<(StatusCode, Json<CameraStatusView>)> {
    let status = state.fleet.register_spec(spec).await?;
    Ok((StatusCode::CREATED, Json(status)))
}

pub async fn delete_camera(
    State(state): State<AppState>,
    Path(camera_id): Path<String>,
) -> ApiResult<StatusCode> {
    let camera_id = CameraId::from(camera_id);
    state.fleet.remove(&camera_id).await?;
    info!(camera_id = %camera_id, "Camera deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Manual reconnect; the only way out of `failed`.
pub async fn refresh_camera(
    State(state): State<AppState>,
    Path(camera_id): Path<String>,
) -> ApiResult<Json<CameraStatusView>> {
    let camera_id = CameraId::from(camera_id);
    let status = state.fleet.refresh(&camera_id).await?;
    info!(camera_id = %camera_id, "Manual refresh requested");
    Ok(Json(status))
}

#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    #[serde(default)]
    pub grid: bool,
}

/// Current analytics of one camera, for overlays and dashboards.
pub async fn get_camera_analytics(
    State(state): State<AppState>,
    Path(camera_id): Path<String>,
    Query(query): Query<AnalyticsQuery>,
) -> ApiResult<Json<AnalyticsReport>> {
    let report = state
        .fleet
        .report(&CameraId::from(camera_id), query.grid)
        .await?;
    Ok(Json(report))
}
