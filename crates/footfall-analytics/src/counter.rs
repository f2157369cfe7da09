//! Entry/exit counting from person-count deltas.
//!
//! The counter does not follow individual people. Each update compares the
//! number of people in view with the previous observation: growth is
//! counted as entries, shrinkage as exits. Occupancy is always derived as
//! `max(0, entries - exits)` and is not required to match the raw count.

use tracing::debug;

use footfall_models::{CalibrationLine, CameraId, DetectedObject, TrackedCount};

use crate::error::{AnalyticsError, AnalyticsResult};

/// Per-camera cumulative counter.
#[derive(Debug, Clone)]
pub struct TrackingCounter {
    camera_id: CameraId,
    entries: u64,
    exits: u64,
    previous: Option<u32>,
    max_capacity: Option<u32>,
}

impl TrackingCounter {
    pub fn new(camera_id: CameraId, max_capacity: Option<u32>) -> Self {
        Self {
            camera_id,
            entries: 0,
            exits: 0,
            previous: None,
            max_capacity,
        }
    }

    /// Apply one detection result.
    ///
    /// Without a crossing line nothing is counted and `CalibrationMissing`
    /// is returned; the observed count is still remembered so that adding
    /// a line later does not register everyone already in view as entries.
    pub fn update(
        &mut self,
        line: Option<&CalibrationLine>,
        detections: &[DetectedObject],
    ) -> AnalyticsResult<TrackedCount> {
        let current = detections.iter().filter(|d| d.is_person()).count() as u32;
        self.observe(line.is_some(), current)
    }

    /// Apply a raw person count.
    pub fn update_count(
        &mut self,
        line: Option<&CalibrationLine>,
        current: u32,
    ) -> AnalyticsResult<TrackedCount> {
        self.observe(line.is_some(), current)
    }

    fn observe(&mut self, calibrated: bool, current: u32) -> AnalyticsResult<TrackedCount> {
        // The first observation only sets the baseline
        let previous = self.previous.replace(current).unwrap_or(current);

        if !calibrated {
            return Err(AnalyticsError::CalibrationMissing);
        }

        if current > previous {
            self.entries += u64::from(current - previous);
        } else if current < previous {
            self.exits += u64::from(previous - current);
        }

        debug!(
            camera_id = %self.camera_id,
            previous,
            current,
            entries = self.entries,
            exits = self.exits,
            "Updated tracked count"
        );

        Ok(self.current())
    }

    /// Current counters without applying a new observation.
    pub fn current(&self) -> TrackedCount {
        TrackedCount {
            entries: self.entries,
            exits: self.exits,
            current_occupancy: TrackedCount::derived_occupancy(self.entries, self.exits),
            max_capacity: self.max_capacity,
        }
    }

    /// Last observed person count.
    pub fn last_observed(&self) -> u32 {
        self.previous.unwrap_or(0)
    }
}
