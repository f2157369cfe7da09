//! Camera models and per-camera options.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::{ModelError, ModelResult};

/// Fastest allowed analysis or frame cadence (~30 cycles per second).
pub const MIN_CYCLE_MS: u64 = 33;

/// Unique identifier for a camera.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct CameraId(pub String);

impl CameraId {
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CameraId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for CameraId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CameraId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Lifecycle status shown to the management layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum CameraStatus {
    #[default]
    Connecting,
    Active,
    Stale,
    Offline,
}

impl CameraStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CameraStatus::Connecting => "connecting",
            CameraStatus::Active => "active",
            CameraStatus::Stale => "stale",
            CameraStatus::Offline => "offline",
        }
    }
}

impl fmt::Display for CameraStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A camera registered by the management layer.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Camera {
    pub id: CameraId,

    #[serde(default)]
    pub name: String,

    /// Configured stream endpoint (http, https or rtsp)
    pub stream_url: String,

    /// Declared resolution
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,

    #[serde(default = "default_fps")]
    pub fps: f64,

    /// HTTP port used when an rtsp endpoint is rewritten and carries no port
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_port: Option<u16>,

    #[serde(default)]
    pub options: CameraOptions,
}

fn default_width() -> u32 {
    1280
}

fn default_height() -> u32 {
    720
}

fn default_fps() -> f64 {
    15.0
}

impl Camera {
    pub fn new(id: impl Into<CameraId>, stream_url: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.to_string(),
            id,
            stream_url: stream_url.into(),
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
            http_port: None,
            options: CameraOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CameraOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }
}

/// Recognized per-camera options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CameraOptions {
    #[serde(default = "default_confidence")]
    pub detection_confidence_threshold: f64,

    #[serde(default = "default_min_bbox_px")]
    pub min_bbox_px: f64,

    #[serde(default = "default_analysis_interval_ms")]
    pub analysis_interval_ms: u64,

    /// Pacing of the snapshot frame source
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,

    #[serde(default = "default_health_check_interval_ms")]
    pub health_check_interval_ms: u64,

    #[serde(default = "default_stale_threshold_ms")]
    pub stale_threshold_ms: u64,

    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,

    #[serde(default = "default_reconnect_multiplier")]
    pub reconnect_multiplier: f64,

    #[serde(default = "default_reconnect_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,

    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    #[serde(default = "default_heatmap_decay_seconds")]
    pub heatmap_decay_seconds: f64,

    #[serde(default = "default_heatmap_prune_epsilon")]
    pub heatmap_prune_epsilon: f64,

    /// Contained people at which a zone reads as fully occupied
    #[serde(default = "default_zone_saturation_count")]
    pub zone_saturation_count: u32,

    #[serde(default = "default_max_capacity")]
    pub max_capacity: u32,
}

fn default_confidence() -> f64 {
    0.6
}

fn default_min_bbox_px() -> f64 {
    20.0
}

fn default_analysis_interval_ms() -> u64 {
    2500
}

fn default_frame_interval_ms() -> u64 {
    200
}

fn default_health_check_interval_ms() -> u64 {
    15_000
}

fn default_stale_threshold_ms() -> u64 {
    30_000
}

fn default_reconnect_base_delay_ms() -> u64 {
    2000
}

fn default_reconnect_multiplier() -> f64 {
    1.5
}

fn default_reconnect_max_delay_ms() -> u64 {
    15_000
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

fn default_heatmap_decay_seconds() -> f64 {
    30.0
}

fn default_heatmap_prune_epsilon() -> f64 {
    0.1
}

fn default_zone_saturation_count() -> u32 {
    10
}

fn default_max_capacity() -> u32 {
    50
}

impl Default for CameraOptions {
    fn default() -> Self {
        Self {
            detection_confidence_threshold: default_confidence(),
            min_bbox_px: default_min_bbox_px(),
            analysis_interval_ms: default_analysis_interval_ms(),
            frame_interval_ms: default_frame_interval_ms(),
            health_check_interval_ms: default_health_check_interval_ms(),
            stale_threshold_ms: default_stale_threshold_ms(),
            reconnect_base_delay_ms: default_reconnect_base_delay_ms(),
            reconnect_multiplier: default_reconnect_multiplier(),
            reconnect_max_delay_ms: default_reconnect_max_delay_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            heatmap_decay_seconds: default_heatmap_decay_seconds(),
            heatmap_prune_epsilon: default_heatmap_prune_epsilon(),
            zone_saturation_count: default_zone_saturation_count(),
            max_capacity: default_max_capacity(),
        }
    }
}

impl CameraOptions {
    pub fn validate(&self) -> ModelResult<()> {
        if !(0.0..=1.0).contains(&self.detection_confidence_threshold) {
            return Err(ModelError::invalid_options(
                "detection_confidence_threshold must be within [0, 1]",
            ));
        }
        if !(0.0..=1.0).contains(&self.heatmap_prune_epsilon) {
            return Err(ModelError::invalid_options(
                "heatmap_prune_epsilon must be within [0, 1]",
            ));
        }
        if self.min_bbox_px < 0.0 {
            return Err(ModelError::invalid_options("min_bbox_px must be non-negative"));
        }
        if self.analysis_interval_ms == 0
            || self.frame_interval_ms == 0
            || self.health_check_interval_ms == 0
            || self.stale_threshold_ms == 0
        {
            return Err(ModelError::invalid_options("intervals must be positive"));
        }
        if self.reconnect_multiplier < 1.0 {
            return Err(ModelError::invalid_options("reconnect_multiplier must be >= 1"));
        }
        if self.reconnect_base_delay_ms > self.reconnect_max_delay_ms {
            return Err(ModelError::invalid_options(
                "reconnect_base_delay_ms exceeds reconnect_max_delay_ms",
            ));
        }
        if self.heatmap_decay_seconds <= 0.0 {
            return Err(ModelError::invalid_options("heatmap_decay_seconds must be positive"));
        }
        if self.zone_saturation_count == 0 || self.max_capacity == 0 {
            return Err(ModelError::invalid_options(
                "zone_saturation_count and max_capacity must be positive",
            ));
        }
        Ok(())
    }

    pub fn analysis_interval(&self) -> Duration {
        Duration::from_millis(self.analysis_interval_ms.max(MIN_CYCLE_MS))
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(MIN_CYCLE_MS))
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms)
    }

    pub fn stale_threshold(&self) -> Duration {
        Duration::from_millis(self.stale_threshold_ms)
    }
}
