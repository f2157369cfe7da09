//! Health check handlers.

use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use footfall_models::StreamState;

use crate::state::AppState;

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

/// Health check endpoint (liveness probe).
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Readiness check response.
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub checks: ReadinessChecks,
    pub cameras: CameraCounts,
}

#[derive(Serialize)]
pub struct ReadinessChecks {
    pub detection: CheckStatus,
}

#[derive(Serialize)]
pub struct CheckStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

impl CheckStatus {
    fn ok(latency_ms: u64) -> Self {
        Self {
            status: "ok".to_string(),
            error: None,
            latency_ms: Some(latency_ms),
        }
    }

    fn error(msg: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            error: Some(msg.into()),
            latency_ms: None,
        }
    }
}

/// Cameras per coarse state. Informational; does not affect readiness.
#[derive(Serialize, Default)]
pub struct CameraCounts {
    pub total: usize,
    pub active: usize,
    pub reconnecting: usize,
    pub failed: usize,
}

/// Readiness check endpoint (readiness probe).
/// Checks that the detection service answers its health probe.
pub async fn ready(
    State(state): State<AppState>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    let detection = {
        let start = Instant::now();
        if state.detector.health_check().await {
            CheckStatus::ok(start.elapsed().as_millis() as u64)
        } else {
            CheckStatus::error("detection service unreachable")
        }
    };

    let mut cameras = CameraCounts::default();
    for (camera_state, count) in state.fleet.state_counts().await {
        cameras.total += count;
        match camera_state {
            StreamState::Active => cameras.active += count,
            StreamState::Stale | StreamState::Reconnecting => cameras.reconnecting += count,
            StreamState::Failed => cameras.failed += count,
            StreamState::Connecting => {}
        }
    }

    let all_ok = detection.status == "ok";
    let response = ReadinessResponse {
        status: if all_ok { "ready" } else { "degraded" }.to_string(),
        checks: ReadinessChecks { detection },
        cameras,
    };

    if all_ok {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}
