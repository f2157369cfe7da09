//! Calibration models: crossing line and zone polygons.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{ModelError, ModelResult};
use crate::geometry::Point;

/// Minimum number of vertices for a committed zone polygon.
pub const MIN_POLYGON_POINTS: usize = 3;

/// Which side of the crossing line counts as "entry".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum EntryDirection {
    #[default]
    UpToDown,
    DownToUp,
    LeftToRight,
    RightToLeft,
}

impl EntryDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryDirection::UpToDown => "up_to_down",
            EntryDirection::DownToUp => "down_to_up",
            EntryDirection::LeftToRight => "left_to_right",
            EntryDirection::RightToLeft => "right_to_left",
        }
    }
}

impl fmt::Display for EntryDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Crossing line in canonical space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CalibrationLine {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    #[serde(default)]
    pub direction: EntryDirection,
}

impl CalibrationLine {
    pub fn new(start: Point, end: Point, direction: EntryDirection) -> Self {
        Self {
            x1: start.x,
            y1: start.y,
            x2: end.x,
            y2: end.y,
            direction,
        }
    }

    pub fn start(&self) -> Point {
        Point::new(self.x1, self.y1)
    }

    pub fn end(&self) -> Point {
        Point::new(self.x2, self.y2)
    }

    pub fn length(&self) -> f64 {
        ((self.x2 - self.x1).powi(2) + (self.y2 - self.y1).powi(2)).sqrt()
    }

    /// Reject degenerate (zero-length or non-finite) lines.
    pub fn validate(&self) -> ModelResult<()> {
        let coords = [self.x1, self.y1, self.x2, self.y2];
        if coords.iter().any(|c| !c.is_finite()) {
            return Err(ModelError::InvalidLine("non-finite coordinate".to_string()));
        }
        if self.length() < f64::EPSILON {
            return Err(ModelError::InvalidLine("endpoints coincide".to_string()));
        }
        Ok(())
    }
}

/// Unique identifier for a zone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ZoneId(pub String);

impl ZoneId {
    /// Generate a new random zone ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ZoneId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ZoneId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Zone category tag.
///
/// Known tags map to a fixed variant; anything else is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(from = "String", into = "String")]
#[schemars(with = "String")]
pub enum ZoneType {
    Entrance,
    Checkout,
    Shelf,
    Seating,
    Queue,
    Restricted,
    #[default]
    General,
    Other(String),
}

impl ZoneType {
    pub fn as_str(&self) -> &str {
        match self {
            ZoneType::Entrance => "entrance",
            ZoneType::Checkout => "checkout",
            ZoneType::Shelf => "shelf",
            ZoneType::Seating => "seating",
            ZoneType::Queue => "queue",
            ZoneType::Restricted => "restricted",
            ZoneType::General => "general",
            ZoneType::Other(tag) => tag,
        }
    }

    /// Default display color for the zone category.
    pub fn default_color(&self) -> &'static str {
        match self {
            ZoneType::Entrance => "#10B981",
            ZoneType::Checkout => "#F59E0B",
            ZoneType::Shelf => "#3B82F6",
            ZoneType::Seating => "#8B5CF6",
            ZoneType::Queue => "#EC4899",
            ZoneType::Restricted => "#EF4444",
            ZoneType::General | ZoneType::Other(_) => "#6B7280",
        }
    }
}

impl From<String> for ZoneType {
    fn from(s: String) -> Self {
        match s.trim().to_lowercase().as_str() {
            "entrance" => ZoneType::Entrance,
            "checkout" => ZoneType::Checkout,
            "shelf" => ZoneType::Shelf,
            "seating" => ZoneType::Seating,
            "queue" => ZoneType::Queue,
            "restricted" => ZoneType::Restricted,
            "general" | "" => ZoneType::General,
            _ => ZoneType::Other(s),
        }
    }
}

impl From<ZoneType> for String {
    fn from(t: ZoneType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for ZoneType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A named polygon in canonical space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Zone {
    #[serde(default)]
    pub id: ZoneId,

    pub name: String,

    #[serde(default, rename = "type")]
    pub zone_type: ZoneType,

    /// Ordered polygon vertices
    pub points: Vec<Point>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl Zone {
    pub fn new(name: impl Into<String>, zone_type: ZoneType, points: Vec<Point>) -> Self {
        Self {
            id: ZoneId::new(),
            name: name.into(),
            zone_type,
            points,
            color: None,
        }
    }

    /// A zone with fewer than three points is a draft and may not be committed.
    pub fn is_valid(&self) -> bool {
        self.points.len() >= MIN_POLYGON_POINTS
    }

    pub fn validate(&self) -> ModelResult<()> {
        if !self.is_valid() {
            return Err(ModelError::InvalidPolygon {
                zone: self.name.clone(),
                points: self.points.len(),
            });
        }
        Ok(())
    }

    pub fn display_color(&self) -> &str {
        self.color
            .as_deref()
            .unwrap_or_else(|| self.zone_type.default_color())
    }
}

/// Immutable committed calibration for one camera.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct CalibrationSnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<CalibrationLine>,

    #[serde(default)]
    pub zones: Vec<Zone>,

    /// Incremented on every commit
    #[serde(default)]
    pub version: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub committed_at: Option<DateTime<Utc>>,
}

impl CalibrationSnapshot {
    /// Counting requires a crossing line.
    pub fn is_calibrated(&self) -> bool {
        self.line.is_some()
    }

    pub fn validate(&self) -> ModelResult<()> {
        if let Some(line) = &self.line {
            line.validate()?;
        }
        for zone in &self.zones {
            zone.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Point> {
        vec![
            Point::new(100.0, 100.0),
            Point::new(200.0, 100.0),
            Point::new(200.0, 200.0),
            Point::new(100.0, 200.0),
        ]
    }

    #[test]
    fn test_zone_requires_three_points() {
        let zone = Zone::new("Door", ZoneType::Entrance, square()[..2].to_vec());
        assert!(!zone.is_valid());
        assert_eq!(
            zone.validate(),
            Err(ModelError::InvalidPolygon {
                zone: "Door".to_string(),
                points: 2
            })
        );

        let zone = Zone::new("Door", ZoneType::Entrance, square());
        assert!(zone.validate().is_ok());
    }

    #[test]
    fn test_zone_type_free_form() {
        let t: ZoneType = serde_json::from_str("\"Checkout\"").unwrap();
        assert_eq!(t, ZoneType::Checkout);

        let t: ZoneType = serde_json::from_str("\"cold_storage\"").unwrap();
        assert_eq!(t, ZoneType::Other("cold_storage".to_string()));
        assert_eq!(serde_json::to_string(&t).unwrap(), "\"cold_storage\"");
        assert_eq!(t.default_color(), "#6B7280");
    }

    #[test]
    fn test_display_color_prefers_explicit() {
        let mut zone = Zone::new("Till", ZoneType::Checkout, square());
        assert_eq!(zone.display_color(), "#F59E0B");
        zone.color = Some("#000000".to_string());
        assert_eq!(zone.display_color(), "#000000");
    }

    #[test]
    fn test_line_validation() {
        let line = CalibrationLine::new(
            Point::new(10.0, 10.0),
            Point::new(10.0, 10.0),
            EntryDirection::UpToDown,
        );
        assert!(line.validate().is_err());

        let line = CalibrationLine::new(
            Point::new(0.0, 360.0),
            Point::new(1280.0, 360.0),
            EntryDirection::DownToUp,
        );
        assert!(line.validate().is_ok());
    }

    #[test]
    fn test_line_wire_format() {
        let line: CalibrationLine = serde_json::from_str(
            r#"{"x1":0,"y1":300,"x2":1280,"y2":300,"direction":"left_to_right"}"#,
        )
        .unwrap();
        assert_eq!(line.direction, EntryDirection::LeftToRight);
    }

    #[test]
    fn test_snapshot_calibrated_flag() {
        let mut snapshot = CalibrationSnapshot::default();
        assert!(!snapshot.is_calibrated());
        snapshot.line = Some(CalibrationLine::new(
            Point::new(0.0, 0.0),
            Point::new(1.0, 1.0),
            EntryDirection::UpToDown,
        ));
        assert!(snapshot.is_calibrated());
    }
}
