//! Worker configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use footfall_models::{CalibrationSnapshot, Camera};

use crate::error::WorkerResult;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Analytics publishing cadence
    pub publish_interval: Duration,
    /// Cameras to supervise at start-up
    pub cameras_file: Option<PathBuf>,
    /// Include the rasterized heatmap in published reports
    pub publish_heatmap_grid: bool,
    /// Identical failures logged before suppression kicks in
    pub max_logged_failures: u32,
    /// Time allowed for a supervisor to stop before it is aborted
    pub shutdown_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            publish_interval: Duration::from_millis(5000),
            cameras_file: None,
            publish_heatmap_grid: true,
            max_logged_failures: 3,
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            publish_interval: Duration::from_millis(
                std::env::var("PUBLISH_INTERVAL_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5000),
            ),
            cameras_file: std::env::var("CAMERAS_FILE")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            publish_heatmap_grid: std::env::var("PUBLISH_HEATMAP_GRID")
                .map(|s| s != "false" && s != "0")
                .unwrap_or(true),
            max_logged_failures: std::env::var("MAX_LOGGED_FAILURES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
            shutdown_timeout: Duration::from_secs(
                std::env::var("SHUTDOWN_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            ),
        }
    }
}

/// One entry of the cameras file.
#[derive(Debug, Clone, Deserialize)]
pub struct CameraSpec {
    #[serde(flatten)]
    pub camera: Camera,
    /// Previously committed calibration
    #[serde(default)]
    pub calibration: Option<CalibrationSnapshot>,
}

/// Read the start-up camera list.
pub fn load_cameras_file(path: &Path) -> WorkerResult<Vec<CameraSpec>> {
    let raw = std::fs::read_to_string(path)?;
    let specs: Vec<CameraSpec> = serde_json::from_str(&raw)?;
    Ok(specs)
}
