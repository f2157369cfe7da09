//! Zone occupancy.

use chrono::{DateTime, Utc};

use footfall_models::{DetectedObject, Zone, ZoneOccupancySnapshot};

use crate::polygon::point_in_polygon;

/// Counts person centroids per zone.
#[derive(Debug, Clone, Copy)]
pub struct ZoneEngine {
    /// Contained people at which a zone reads as fully occupied
    saturation: u32,
}

impl ZoneEngine {
    pub fn new(saturation: u32) -> Self {
        Self {
            saturation: saturation.max(1),
        }
    }

    /// Evaluate every valid zone against the person detections.
    ///
    /// Zones with fewer than three points are skipped. `heat_intensity` is
    /// left at zero; the heatmap aggregator fills it in.
    pub fn evaluate(
        &self,
        zones: &[Zone],
        detections: &[DetectedObject],
        now: DateTime<Utc>,
    ) -> Vec<ZoneOccupancySnapshot> {
        zones
            .iter()
            .filter(|zone| zone.is_valid())
            .map(|zone| {
                let people_count = detections
                    .iter()
                    .filter(|d| d.is_person())
                    .filter(|d| point_in_polygon(d.centroid(), &zone.points))
                    .count() as u32;

                ZoneOccupancySnapshot {
                    zone_id: zone.id.clone(),
                    zone_name: zone.name.clone(),
                    people_count,
                    occupancy: self.occupancy(people_count),
                    heat_intensity: 0.0,
                    timestamp: now,
                }
            })
            .collect()
    }

    fn occupancy(&self, people: u32) -> f64 {
        (people as f64 / self.saturation as f64).clamp(0.0, 1.0)
    }
}

impl Default for ZoneEngine {
    fn default() -> Self {
        Self::new(10)
    }
}
