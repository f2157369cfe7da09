//! Analytics records produced by the counting, zone and heatmap engines.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::calibration::ZoneId;
use crate::geometry::Point;

/// Cumulative entry/exit counters for one camera session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrackedCount {
    pub entries: u64,
    pub exits: u64,
    pub current_occupancy: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_capacity: Option<u32>,
}

impl TrackedCount {
    /// Occupancy derived from the counters, floored at zero.
    pub fn derived_occupancy(entries: u64, exits: u64) -> u64 {
        entries.saturating_sub(exits)
    }
}

/// A decaying, confidence-weighted marker of a recent person position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct HeatPoint {
    pub position: Point,
    /// Current intensity in [0, 1]
    pub intensity: f64,
    /// Intensity at creation
    pub initial_intensity: f64,
    pub created_at: DateTime<Utc>,
}

impl HeatPoint {
    pub fn new(position: Point, intensity: f64, created_at: DateTime<Utc>) -> Self {
        let intensity = intensity.clamp(0.0, 1.0);
        Self {
            position,
            intensity,
            initial_intensity: intensity,
            created_at,
        }
    }
}

/// Per-zone occupancy at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ZoneOccupancySnapshot {
    pub zone_id: ZoneId,
    pub zone_name: String,
    /// Detection centroids inside the polygon
    pub people_count: u32,
    /// `people_count` normalized by the saturation constant, in [0, 1]
    pub occupancy: f64,
    /// Average intensity of heat points inside the polygon
    pub heat_intensity: f64,
    pub timestamp: DateTime<Utc>,
}

/// Coarse crowd density label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum DensityLevel {
    #[default]
    Low,
    Medium,
    High,
    VeryHigh,
}

impl DensityLevel {
    /// Classify `people` against `max_capacity`.
    pub fn classify(people: u32, max_capacity: u32) -> Self {
        let pct = Self::occupancy_percentage(people, max_capacity);
        if pct > 75.0 {
            DensityLevel::VeryHigh
        } else if pct > 50.0 {
            DensityLevel::High
        } else if pct > 25.0 {
            DensityLevel::Medium
        } else {
            DensityLevel::Low
        }
    }

    pub fn occupancy_percentage(people: u32, max_capacity: u32) -> f64 {
        if max_capacity == 0 {
            return 100.0;
        }
        (people as f64 / max_capacity as f64 * 100.0).min(100.0)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DensityLevel::Low => "low",
            DensityLevel::Medium => "medium",
            DensityLevel::High => "high",
            DensityLevel::VeryHigh => "very_high",
        }
    }
}

/// Aggregate statistics over the live heat points.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HeatStats {
    pub point_count: usize,
    pub mean_intensity: f64,
    pub max_intensity: f64,
}

/// Heat intensity rasterized over canonical space, row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct HeatGrid {
    pub cols: usize,
    pub rows: usize,
    pub cells: Vec<f64>,
}

impl HeatGrid {
    pub fn cell(&self, col: usize, row: usize) -> Option<f64> {
        if col >= self.cols || row >= self.rows {
            return None;
        }
        self.cells.get(row * self.cols + col).copied()
    }
}

/// Payload submitted to the analytics persistence boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsReport {
    pub people_count: u32,
    pub entries: u64,
    pub exits: u64,
    pub occupancy: u64,
    pub density_level: DensityLevel,
    pub zone_snapshots: Vec<ZoneOccupancySnapshot>,
    pub heat_stats: HeatStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heatmap_grid: Option<HeatGrid>,
    pub calibrated: bool,
    pub timestamp: DateTime<Utc>,
}
