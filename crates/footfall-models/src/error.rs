//! Model validation errors.

use thiserror::Error;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("Invalid polygon for zone {zone}: {points} points (at least 3 required)")]
    InvalidPolygon { zone: String, points: usize },

    #[error("Invalid calibration line: {0}")]
    InvalidLine(String),

    #[error("Invalid camera options: {0}")]
    InvalidOptions(String),
}

impl ModelError {
    pub fn invalid_options(msg: impl Into<String>) -> Self {
        Self::InvalidOptions(msg.into())
    }
}
