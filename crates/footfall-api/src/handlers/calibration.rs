//! Calibration handlers.
//!
//! Two ways to change a camera's calibration:
//! - direct updates (`PUT .../calibration/line`, `PUT .../calibration/zones`)
//!   that validate and commit in one step
//! - a draft that collects edits (zone points may be incomplete) until an
//!   explicit commit
//!
//! Running analysis only ever sees committed snapshots.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracing::info;

use footfall_models::{CalibrationLine, CalibrationSnapshot, CameraId, Point, Zone, ZoneId};
use footfall_store::CalibrationDraft;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LineRequest {
    /// `null` clears the line and disables counting
    pub line: Option<CalibrationLine>,
}

#[derive(Debug, Deserialize)]
pub struct ZonesRequest {
    pub zones: Vec<Zone>,
}

async fn known_camera(state: &AppState, camera_id: String) -> ApiResult<CameraId> {
    let camera_id = CameraId::from(camera_id);
    if !state.fleet.contains(&camera_id).await {
        return Err(ApiError::not_found(format!("Camera not found: {}", camera_id)));
    }
    Ok(camera_id)
}

fn snapshot_json(snapshot: Arc<CalibrationSnapshot>) -> Json<CalibrationSnapshot> {
    Json(Arc::unwrap_or_clone(snapshot))
}

/// Committed calibration.
pub async fn get_calibration(
    State(state): State<AppState>,
    Path(camera_id): Path<String>,
) -> ApiResult<Json<CalibrationSnapshot>> {
    let camera_id = known_camera(&state, camera_id).await?;
    Ok(snapshot_json(state.calibration().get(&camera_id).await))
}

pub async fn put_line(
    State(state): State<AppState>,
    Path(camera_id): Path<String>,
    Json(request): Json<LineRequest>,
) -> ApiResult<Json<CalibrationSnapshot>> {
    let camera_id = known_camera(&state, camera_id).await?;
    let snapshot = state.calibration().set_line(&camera_id, request.line).await?;
    info!(camera_id = %camera_id, version = snapshot.version, "Crossing line updated");
    Ok(snapshot_json(snapshot))
}

/// Replace all zones; rejected as a whole if any polygon is invalid.
pub async fn put_zones(
    State(state): State<AppState>,
    Path(camera_id): Path<String>,
    Json(request): Json<ZonesRequest>,
) -> ApiResult<Json<CalibrationSnapshot>> {
    let camera_id = known_camera(&state, camera_id).await?;
    let snapshot = state.calibration().set_zones(&camera_id, request.zones).await?;
    info!(
        camera_id = %camera_id,
        version = snapshot.version,
        zones = snapshot.zones.len(),
        "Zones updated"
    );
    Ok(snapshot_json(snapshot))
}

/// Start a draft from the committed snapshot, replacing any open draft.
pub async fn begin_draft(
    State(state): State<AppState>,
    Path(camera_id): Path<String>,
) -> ApiResult<(StatusCode, Json<CalibrationDraft>)> {
    let camera_id = known_camera(&state, camera_id).await?;
    let draft = state.calibration().begin_draft(&camera_id).await?;
    Ok((StatusCode::CREATED, Json(draft)))
}

pub async fn get_draft(
    State(state): State<AppState>,
    Path(camera_id): Path<String>,
) -> ApiResult<Json<CalibrationDraft>> {
    let camera_id = known_camera(&state, camera_id).await?;
    state
        .calibration()
        .draft(&camera_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("No draft open for camera {}", camera_id)))
}

pub async fn discard_draft(
    State(state): State<AppState>,
    Path(camera_id): Path<String>,
) -> ApiResult<StatusCode> {
    let camera_id = known_camera(&state, camera_id).await?;
    if state.calibration().discard_draft(&camera_id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!("No draft open for camera {}", camera_id)))
    }
}

pub async fn draft_set_line(
    State(state): State<AppState>,
    Path(camera_id): Path<String>,
    Json(request): Json<LineRequest>,
) -> ApiResult<Json<CalibrationDraft>> {
    let camera_id = known_camera(&state, camera_id).await?;
    Ok(Json(state.calibration().draft_set_line(&camera_id, request.line).await?))
}

/// Add or replace a draft zone; the path id wins over the body.
pub async fn draft_put_zone(
    State(state): State<AppState>,
    Path((camera_id, zone_id)): Path<(String, String)>,
    Json(mut zone): Json<Zone>,
) -> ApiResult<Json<CalibrationDraft>> {
    let camera_id = known_camera(&state, camera_id).await?;
    zone.id = ZoneId(zone_id);
    Ok(Json(state.calibration().draft_upsert_zone(&camera_id, zone).await?))
}

/// Append one vertex, as when an operator clicks on the overlay.
pub async fn draft_add_point(
    State(state): State<AppState>,
    Path((camera_id, zone_id)): Path<(String, String)>,
    Json(point): Json<Point>,
) -> ApiResult<Json<CalibrationDraft>> {
    let camera_id = known_camera(&state, camera_id).await?;
    let draft = state
        .calibration()
        .draft_add_point(&camera_id, &ZoneId(zone_id), point)
        .await?;
    Ok(Json(draft))
}

pub async fn draft_delete_zone(
    State(state): State<AppState>,
    Path((camera_id, zone_id)): Path<(String, String)>,
) -> ApiResult<Json<CalibrationDraft>> {
    let camera_id = known_camera(&state, camera_id).await?;
    let draft = state
        .calibration()
        .draft_remove_zone(&camera_id, &ZoneId(zone_id))
        .await?;
    Ok(Json(draft))
}

/// Validate the draft and swap it in as the committed snapshot.
pub async fn commit_draft(
    State(state): State<AppState>,
    Path(camera_id): Path<String>,
) -> ApiResult<Json<CalibrationSnapshot>> {
    let camera_id = known_camera(&state, camera_id).await?;
    let snapshot = state.calibration().commit(&camera_id).await?;
    Ok(snapshot_json(snapshot))
}
