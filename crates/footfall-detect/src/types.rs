//! Detection service request/response types.

use serde::{Deserialize, Serialize};

/// One raw detection as reported by the service, in source pixels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDetection {
    #[serde(alias = "label")]
    pub class: String,
    pub confidence: f64,
    /// `[x, y, width, height]`
    pub bbox: [f64; 4],
}

/// Response from `POST /detect`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectResponse {
    #[serde(default)]
    pub objects: Vec<RawDetection>,
    /// Resolution the boxes refer to, when it differs from the frame's
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_height: Option<u32>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: Option<String>,
}
