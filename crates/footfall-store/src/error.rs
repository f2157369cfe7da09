//! Store error types.

use thiserror::Error;

use footfall_models::ModelError;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid polygon for zone {zone}: {points} points (at least 3 required)")]
    InvalidPolygon { zone: String, points: usize },

    #[error("Invalid calibration: {0}")]
    InvalidCalibration(String),

    #[error("No draft open for camera {0}")]
    NoDraft(String),

    #[error("Camera not registered: {0}")]
    UnknownCamera(String),

    #[error("Zone not found: {0}")]
    ZoneNotFound(String),

    #[error("Persistence request failed: {0}")]
    RequestFailed(String),

    #[error("Rejected by persistence API ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub fn request_failed(msg: impl Into<String>) -> Self {
        Self::RequestFailed(msg.into())
    }

    /// Map a non-success HTTP status.
    pub fn from_http_status(status: u16, message: String) -> Self {
        if status >= 500 || status == 429 {
            Self::RequestFailed(format!("{}: {}", status, message))
        } else {
            Self::Rejected { status, message }
        }
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::RequestFailed(_) | StoreError::Network(_))
    }

    /// Validation failures raised at the write boundary.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            StoreError::InvalidPolygon { .. } | StoreError::InvalidCalibration(_)
        )
    }
}

impl From<ModelError> for StoreError {
    fn from(e: ModelError) -> Self {
        match e {
            ModelError::InvalidPolygon { zone, points } => StoreError::InvalidPolygon { zone, points },
            other => StoreError::InvalidCalibration(other.to_string()),
        }
    }
}
