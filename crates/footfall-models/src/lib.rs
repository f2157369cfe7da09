//! Shared data models for the footfall service.
//!
//! This crate provides Serde-serializable types for:
//! - Canonical-space geometry (points, boxes, rescaling)
//! - Cameras, per-camera options and stream health
//! - Calibration (crossing line, zone polygons)
//! - Detections and analytics records

pub mod analytics;
pub mod calibration;
pub mod camera;
pub mod detection;
pub mod error;
pub mod geometry;
pub mod health;

// Re-export common types
pub use analytics::{
    AnalyticsReport, DensityLevel, HeatGrid, HeatPoint, HeatStats, TrackedCount,
    ZoneOccupancySnapshot,
};
pub use calibration::{CalibrationLine, CalibrationSnapshot, EntryDirection, Zone, ZoneId, ZoneType};
pub use camera::{Camera, CameraId, CameraOptions, CameraStatus};
pub use detection::{DetectedObject, ObjectClass};
pub use error::{ModelError, ModelResult};
pub use geometry::{BoundingBox, CanonicalSpace, Point, CANONICAL_HEIGHT, CANONICAL_WIDTH};
pub use health::{StreamHealth, StreamState};
