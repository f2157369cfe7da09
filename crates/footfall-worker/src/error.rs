//! Worker error types.

use thiserror::Error;

use footfall_detect::DetectError;
use footfall_models::ModelError;
use footfall_store::StoreError;
use footfall_stream::StreamError;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("No frame for {idle_ms} ms on camera {camera_id}")]
    StaleStream { camera_id: String, idle_ms: u64 },

    #[error("Camera not found: {0}")]
    CameraNotFound(String),

    #[error("Camera already registered: {0}")]
    DuplicateCamera(String),

    #[error("Invalid camera configuration: {0}")]
    InvalidCamera(String),

    #[error("Supervisor for camera {0} is not running")]
    SupervisorStopped(String),

    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    #[error("Detection error: {0}")]
    Detect(#[from] DetectError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WorkerError {
    pub fn invalid_camera(msg: impl Into<String>) -> Self {
        Self::InvalidCamera(msg.into())
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkerError::StaleStream { .. } => true,
            WorkerError::Stream(e) => e.is_retryable(),
            WorkerError::Detect(e) => e.is_retryable(),
            WorkerError::Store(e) => e.is_retryable(),
            _ => false,
        }
    }
}
