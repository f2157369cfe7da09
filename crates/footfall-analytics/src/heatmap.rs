//! Decaying heat points.
//!
//! Every person detection leaves a heat point at its centroid with the
//! detection confidence as intensity. On every update each live point is
//! scaled by `max(0, 1 - age / window)`, where age runs from the point's
//! creation, so repeated updates compound. Points below the prune epsilon are
//! dropped before new points are added. Reads never decay; heat only moves
//! when a detection cycle lands.

use chrono::{DateTime, Utc};

use footfall_models::{
    CameraOptions, DetectedObject, HeatGrid, HeatPoint, HeatStats, Zone, CANONICAL_HEIGHT,
    CANONICAL_WIDTH,
};

use crate::polygon::point_in_polygon;

pub const DEFAULT_GRID_COLS: usize = 16;
pub const DEFAULT_GRID_ROWS: usize = 9;

/// Heatmap tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeatmapConfig {
    /// Age in seconds at which the per-update decay factor reaches zero
    pub decay_seconds: f64,
    /// Points below this intensity are dropped
    pub prune_epsilon: f64,
    /// Hard cap on live points; the oldest are dropped first
    pub max_points: usize,
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self::from_options(&CameraOptions::default())
    }
}

impl HeatmapConfig {
    pub fn from_options(options: &CameraOptions) -> Self {
        Self {
            decay_seconds: options.heatmap_decay_seconds,
            prune_epsilon: options.heatmap_prune_epsilon,
            max_points: 10_000,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct HeatmapAggregator {
    config: HeatmapConfig,
    points: Vec<HeatPoint>,
}

impl HeatmapAggregator {
    pub fn new(config: HeatmapConfig) -> Self {
        Self {
            config,
            points: Vec::new(),
        }
    }

    /// Decay, prune, then add one point per person detection.
    pub fn update(&mut self, detections: &[DetectedObject], now: DateTime<Utc>) -> &[HeatPoint] {
        self.decay_existing(now);

        self.points.extend(
            detections
                .iter()
                .filter(|d| d.is_person())
                .map(|d| HeatPoint::new(d.centroid(), d.confidence, now)),
        );

        if self.points.len() > self.config.max_points {
            let excess = self.points.len() - self.config.max_points;
            self.points.drain(..excess);
        }

        &self.points
    }

    fn decay_existing(&mut self, now: DateTime<Utc>) {
        let window = self.config.decay_seconds;
        let epsilon = self.config.prune_epsilon;

        for point in &mut self.points {
            let age = (now - point.created_at).num_milliseconds().max(0) as f64 / 1000.0;
            point.intensity *= (1.0 - age / window).max(0.0);
        }
        self.points.retain(|p| p.intensity >= epsilon);
    }

    pub fn points(&self) -> &[HeatPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    /// Average intensity of the points inside `zone`, zero when none are.
    pub fn zone_intensity(&self, zone: &Zone) -> f64 {
        let (sum, count) = self
            .points
            .iter()
            .filter(|p| point_in_polygon(p.position, &zone.points))
            .fold((0.0, 0usize), |(sum, count), p| (sum + p.intensity, count + 1));

        if count == 0 {
            0.0
        } else {
            sum / count as f64
        }
    }

    pub fn stats(&self) -> HeatStats {
        if self.points.is_empty() {
            return HeatStats::default();
        }

        let sum: f64 = self.points.iter().map(|p| p.intensity).sum();
        let max = self.points.iter().map(|p| p.intensity).fold(0.0, f64::max);

        HeatStats {
            point_count: self.points.len(),
            mean_intensity: sum / self.points.len() as f64,
            max_intensity: max,
        }
    }

    /// Rasterize live points over canonical space.
    ///
    /// Intensities are summed per cell and clamped to 1. Points outside
    /// the canonical frame are ignored.
    pub fn grid(&self, cols: usize, rows: usize) -> HeatGrid {
        let cols = cols.max(1);
        let rows = rows.max(1);
        let mut cells = vec![0.0; cols * rows];

        let cell_w = CANONICAL_WIDTH / cols as f64;
        let cell_h = CANONICAL_HEIGHT / rows as f64;

        for point in &self.points {
            let (x, y) = (point.position.x, point.position.y);
            if !(0.0..=CANONICAL_WIDTH).contains(&x) || !(0.0..=CANONICAL_HEIGHT).contains(&y) {
                continue;
            }
            let col = ((x / cell_w) as usize).min(cols - 1);
            let row = ((y / cell_h) as usize).min(rows - 1);
            let cell = &mut cells[row * cols + col];
            *cell = (*cell + point.intensity).min(1.0);
        }

        HeatGrid { cols, rows, cells }
    }
}
