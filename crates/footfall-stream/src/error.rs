//! Frame source error types.

use thiserror::Error;

pub type StreamResult<T> = Result<T, StreamError>;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Stream unavailable: {0}")]
    StreamUnavailable(String),

    #[error("Stream timed out after {0} ms")]
    Timeout(u64),

    #[error("Stream closed by camera")]
    Closed,

    #[error("Invalid stream endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Unsupported stream scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl StreamError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::StreamUnavailable(msg.into())
    }

    /// Configuration errors never heal by reconnecting.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            StreamError::InvalidEndpoint(_) | StreamError::UnsupportedScheme(_)
        )
    }
}
