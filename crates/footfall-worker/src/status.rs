//! Operator-facing camera status.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::Serialize;

use footfall_models::{CameraId, CameraStatus, StreamHealth, StreamState, TrackedCount};

/// Everything an operator needs to judge one camera at a glance.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct CameraStatusView {
    pub id: CameraId,
    pub name: String,
    /// Normalized endpoint, never including credentials
    pub endpoint: String,
    pub status: CameraStatus,
    pub state: StreamState,
    pub attempt: u32,
    pub max_attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_delay_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_frame_at: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub generation: u64,
    /// False shows the "not calibrated" indicator
    pub calibrated: bool,
    pub calibration_version: u64,
    pub people_count: u32,
    pub counts: TrackedCount,
    pub recommended_actions: Vec<String>,
}

/// Manual steps suggested for a camera's current condition.
pub fn recommended_actions(health: &StreamHealth, calibrated: bool) -> Vec<String> {
    let mut actions = Vec::new();

    match health.state {
        StreamState::Stale => {
            actions.push("Stream stopped delivering frames; a reconnect is in progress".to_string());
            actions.push("Check camera power and network connectivity".to_string());
        }
        StreamState::Reconnecting => {
            actions.push("Check camera power and network connectivity".to_string());
            actions.push("Verify the stream URL and credentials".to_string());
        }
        StreamState::Failed => {
            actions.push("Check camera power and network connectivity".to_string());
            actions.push("Verify the stream URL and credentials".to_string());
            actions.push("Trigger a manual refresh once the camera is reachable".to_string());
        }
        StreamState::Connecting | StreamState::Active => {}
    }

    if !calibrated {
        actions.push("Draw a crossing line to enable entry and exit counting".to_string());
    }

    actions
}
