//! Detection error types.

use thiserror::Error;

pub type DetectResult<T> = Result<T, DetectError>;

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("Detection service error: {0}")]
    DetectionService(String),

    #[error("Detection timed out after {0} ms")]
    Timeout(u64),

    #[error("Invalid detection response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DetectError {
    pub fn service(msg: impl Into<String>) -> Self {
        Self::DetectionService(msg.into())
    }

    /// Whether a later cycle could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DetectError::DetectionService(_) | DetectError::Timeout(_) | DetectError::Network(_)
        )
    }
}
