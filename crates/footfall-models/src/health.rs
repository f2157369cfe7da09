//! Stream health records.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::camera::CameraStatus;

/// Supervised connection state of one camera stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum StreamState {
    #[default]
    Connecting,
    Active,
    Stale,
    Reconnecting,
    /// Reconnect attempts exhausted; needs a manual refresh
    Failed,
}

impl StreamState {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamState::Connecting => "connecting",
            StreamState::Active => "active",
            StreamState::Stale => "stale",
            StreamState::Reconnecting => "reconnecting",
            StreamState::Failed => "failed",
        }
    }

    /// Coarse lifecycle status for the management layer.
    pub fn camera_status(&self) -> CameraStatus {
        match self {
            StreamState::Connecting | StreamState::Reconnecting => CameraStatus::Connecting,
            StreamState::Active => CameraStatus::Active,
            StreamState::Stale => CameraStatus::Stale,
            StreamState::Failed => CameraStatus::Offline,
        }
    }

    pub fn needs_attention(&self) -> bool {
        matches!(
            self,
            StreamState::Stale | StreamState::Reconnecting | StreamState::Failed
        )
    }
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Health bookkeeping for one camera stream.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct StreamHealth {
    pub state: StreamState,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_frame_at: Option<DateTime<Utc>>,

    pub consecutive_failures: u32,

    /// Current reconnect attempt (0 when healthy)
    pub attempt: u32,

    /// Backoff before the next reconnect attempt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_delay_ms: Option<u64>,

    /// Bumped by every explicit refresh
    pub generation: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl StreamHealth {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_to_camera_status() {
        assert_eq!(StreamState::Reconnecting.camera_status(), CameraStatus::Connecting);
        assert_eq!(StreamState::Failed.camera_status(), CameraStatus::Offline);
        assert_eq!(StreamState::Active.camera_status(), CameraStatus::Active);
        assert!(!StreamState::Active.needs_attention());
        assert!(StreamState::Failed.needs_attention());
    }
}
