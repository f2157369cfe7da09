//! Analytics engines for person detections.
//!
//! All engines are synchronous and owned by a single camera pipeline:
//! - `TrackingCounter`: entries, exits and occupancy from count deltas
//! - `ZoneEngine`: per-zone occupancy via point-in-polygon
//! - `HeatmapAggregator`: decaying heat points with per-zone intensity

pub mod counter;
pub mod error;
pub mod heatmap;
pub mod polygon;
pub mod zones;

pub use counter::TrackingCounter;
pub use error::{AnalyticsError, AnalyticsResult};
pub use heatmap::{HeatmapAggregator, HeatmapConfig, DEFAULT_GRID_COLS, DEFAULT_GRID_ROWS};
pub use polygon::point_in_polygon;
pub use zones::ZoneEngine;
