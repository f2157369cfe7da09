//! Persistence seams.

use async_trait::async_trait;
use tracing::debug;

use footfall_models::{AnalyticsReport, CalibrationSnapshot, CameraId};

use crate::error::StoreResult;

/// Receives committed calibrations.
#[async_trait]
pub trait CalibrationSink: Send + Sync {
    async fn save_calibration(
        &self,
        camera_id: &CameraId,
        snapshot: &CalibrationSnapshot,
    ) -> StoreResult<()>;
}

/// Receives periodic analytics reports.
#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    async fn submit_analytics(&self, camera_id: &CameraId, report: &AnalyticsReport)
        -> StoreResult<()>;
}

/// Sink used when no persistence API is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardSink;

#[async_trait]
impl CalibrationSink for DiscardSink {
    async fn save_calibration(
        &self,
        camera_id: &CameraId,
        snapshot: &CalibrationSnapshot,
    ) -> StoreResult<()> {
        debug!(camera_id = %camera_id, version = snapshot.version, "Discarding calibration");
        Ok(())
    }
}

#[async_trait]
impl AnalyticsSink for DiscardSink {
    async fn submit_analytics(
        &self,
        camera_id: &CameraId,
        report: &AnalyticsReport,
    ) -> StoreResult<()> {
        debug!(camera_id = %camera_id, people = report.people_count, "Discarding analytics");
        Ok(())
    }
}
