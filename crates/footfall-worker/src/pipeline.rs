//! Per-camera analytics state.
//!
//! One pipeline per camera owns the counter, zone engine and heatmap.
//! Detection results are applied strictly in arrival order by the
//! supervisor; the publisher reads reports from the same pipeline.

use chrono::{DateTime, Utc};

use footfall_analytics::{
    AnalyticsError, HeatmapAggregator, HeatmapConfig, TrackingCounter, ZoneEngine,
    DEFAULT_GRID_COLS, DEFAULT_GRID_ROWS,
};
use footfall_models::{
    AnalyticsReport, CalibrationSnapshot, Camera, CameraId, DensityLevel, DetectedObject,
    TrackedCount, ZoneOccupancySnapshot,
};

/// Result of applying one detection cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleOutcome {
    pub people_count: u32,
    pub count: TrackedCount,
    /// False when counting was skipped for lack of a crossing line
    pub calibrated: bool,
    pub zones_evaluated: usize,
}

#[derive(Debug)]
pub struct CameraPipeline {
    camera_id: CameraId,
    counter: TrackingCounter,
    zones: ZoneEngine,
    heatmap: HeatmapAggregator,
    max_capacity: u32,
    people_count: u32,
    zone_snapshots: Vec<ZoneOccupancySnapshot>,
    calibrated: bool,
    cycles: u64,
    last_cycle_at: Option<DateTime<Utc>>,
}

impl CameraPipeline {
    pub fn new(camera: &Camera) -> Self {
        let options = &camera.options;
        Self {
            camera_id: camera.id.clone(),
            counter: TrackingCounter::new(camera.id.clone(), Some(options.max_capacity)),
            zones: ZoneEngine::new(options.zone_saturation_count),
            heatmap: HeatmapAggregator::new(HeatmapConfig::from_options(options)),
            max_capacity: options.max_capacity,
            people_count: 0,
            zone_snapshots: Vec::new(),
            calibrated: false,
            cycles: 0,
            last_cycle_at: None,
        }
    }

    pub fn camera_id(&self) -> &CameraId {
        &self.camera_id
    }

    /// Feed one filtered detection result through every engine.
    pub fn apply(
        &mut self,
        detections: &[DetectedObject],
        calibration: &CalibrationSnapshot,
        now: DateTime<Utc>,
    ) -> CycleOutcome {
        let persons: Vec<DetectedObject> =
            detections.iter().filter(|d| d.is_person()).cloned().collect();
        self.people_count = persons.len() as u32;

        let count = match self.counter.update(calibration.line.as_ref(), &persons) {
            Ok(count) => {
                self.calibrated = true;
                count
            }
            Err(AnalyticsError::CalibrationMissing) => {
                self.calibrated = false;
                self.counter.current()
            }
        };

        self.heatmap.update(&persons, now);

        // Zone occupancy is gated on the crossing line like counting
        if self.calibrated {
            self.zone_snapshots = self.zones.evaluate(&calibration.zones, &persons, now);
            self.fill_zone_heat(calibration);
        } else {
            self.zone_snapshots.clear();
        }

        self.cycles += 1;
        self.last_cycle_at = Some(now);

        CycleOutcome {
            people_count: self.people_count,
            count,
            calibrated: self.calibrated,
            zones_evaluated: self.zone_snapshots.len(),
        }
    }

    /// Build the analytics payload as of the last applied cycle.
    ///
    /// Zone heat is re-read against `calibration` so edits committed since
    /// the last cycle are reflected; intensities themselves are not decayed.
    pub fn report(
        &self,
        calibration: &CalibrationSnapshot,
        now: DateTime<Utc>,
        include_grid: bool,
    ) -> AnalyticsReport {
        let mut zone_snapshots = self.zone_snapshots.clone();
        self.fill_heat(&mut zone_snapshots, calibration);

        let count = self.counter.current();
        AnalyticsReport {
            people_count: self.people_count,
            entries: count.entries,
            exits: count.exits,
            occupancy: count.current_occupancy,
            density_level: DensityLevel::classify(self.people_count, self.max_capacity),
            zone_snapshots,
            heat_stats: self.heatmap.stats(),
            heatmap_grid: include_grid
                .then(|| self.heatmap.grid(DEFAULT_GRID_COLS, DEFAULT_GRID_ROWS)),
            calibrated: calibration.is_calibrated(),
            timestamp: now,
        }
    }

    pub fn count(&self) -> TrackedCount {
        self.counter.current()
    }

    pub fn people_count(&self) -> u32 {
        self.people_count
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn last_cycle_at(&self) -> Option<DateTime<Utc>> {
        self.last_cycle_at
    }

    pub fn zone_snapshots(&self) -> &[ZoneOccupancySnapshot] {
        &self.zone_snapshots
    }

    fn fill_zone_heat(&mut self, calibration: &CalibrationSnapshot) {
        let mut snapshots = std::mem::take(&mut self.zone_snapshots);
        self.fill_heat(&mut snapshots, calibration);
        self.zone_snapshots = snapshots;
    }

    fn fill_heat(&self, snapshots: &mut [ZoneOccupancySnapshot], calibration: &CalibrationSnapshot) {
        for snapshot in snapshots.iter_mut() {
            snapshot.heat_intensity = calibration
                .zones
                .iter()
                .find(|z| z.id == snapshot.zone_id)
                .map(|z| self.heatmap.zone_intensity(z))
                .unwrap_or(0.0);
        }
    }
}
