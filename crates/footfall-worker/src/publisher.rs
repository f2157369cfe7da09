//! Periodic analytics publishing.
//!
//! Every interval the publisher builds a report for each `Active` camera and
//! submits them concurrently. A failed submission is logged and dropped; the
//! next tick sends fresh numbers anyway.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::future::join_all;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use footfall_models::{AnalyticsReport, CameraId, StreamState};
use footfall_store::AnalyticsSink;

use crate::fleet::CameraFleet;
use crate::metrics;
use crate::retry::FailureTracker;

/// Result of one publishing round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishSummary {
    pub published: usize,
    pub failed: usize,
}

pub struct AnalyticsPublisher {
    fleet: Arc<CameraFleet>,
    sink: Arc<dyn AnalyticsSink>,
    interval: Duration,
    include_grid: bool,
    max_logged_failures: u32,
    failures: HashMap<CameraId, FailureTracker>,
}

impl AnalyticsPublisher {
    pub fn new(fleet: Arc<CameraFleet>, sink: Arc<dyn AnalyticsSink>) -> Self {
        let config = fleet.config();
        Self {
            interval: config.publish_interval,
            include_grid: config.publish_heatmap_grid,
            max_logged_failures: config.max_logged_failures,
            fleet,
            sink,
            failures: HashMap::new(),
        }
    }

    /// Publish until `shutdown` flips to true, then flush once more.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(interval_ms = self.interval.as_millis() as u64, "Analytics publisher started");

        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.publish_once().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        let summary = self.publish_once().await;
        info!(
            published = summary.published,
            failed = summary.failed,
            "Analytics publisher stopped after final flush"
        );
    }

    /// Build and submit one report per active camera.
    pub async fn publish_once(&mut self) -> PublishSummary {
        metrics::set_cameras_by_state(&self.fleet.state_counts().await);

        let now = Utc::now();
        let mut reports: Vec<(CameraId, AnalyticsReport)> = Vec::new();
        for (camera_id, pipeline) in self.fleet.pipelines_in(StreamState::Active).await {
            let calibration = self.fleet.calibration().get(&camera_id).await;
            let report = pipeline.lock().await.report(&calibration, now, self.include_grid);
            reports.push((camera_id, report));
        }

        self.failures
            .retain(|id, _| reports.iter().any(|(camera_id, _)| camera_id == id));

        let sink = &self.sink;
        let results = join_all(
            reports
                .iter()
                .map(|(camera_id, report)| sink.submit_analytics(camera_id, report)),
        )
        .await;

        let mut summary = PublishSummary::default();
        for ((camera_id, report), result) in reports.iter().zip(results) {
            let max_logged = self.max_logged_failures;
            let tracker = self
                .failures
                .entry(camera_id.clone())
                .or_insert_with(|| FailureTracker::new("publish", max_logged));

            match result {
                Ok(()) => {
                    summary.published += 1;
                    tracker.record_success();
                    metrics::record_publish(camera_id.as_str(), true);
                    debug!(
                        camera_id = %camera_id,
                        people = report.people_count,
                        occupancy = report.occupancy,
                        "Published analytics"
                    );
                }
                Err(e) => {
                    summary.failed += 1;
                    metrics::record_publish(camera_id.as_str(), false);
                    if tracker.record_failure() {
                        warn!(camera_id = %camera_id, error = %e, "Failed to publish analytics");
                    }
                }
            }
        }

        summary
    }
}
