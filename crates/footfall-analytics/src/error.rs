//! Analytics error types.

use thiserror::Error;

pub type AnalyticsResult<T> = Result<T, AnalyticsError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalyticsError {
    /// No crossing line is configured; counting is skipped.
    #[error("Camera is not calibrated: no crossing line configured")]
    CalibrationMissing,
}
