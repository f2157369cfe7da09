//! Detection models.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::geometry::{BoundingBox, Point};

/// Detected object class.
///
/// The detection capability reports free-form labels; the ones the
/// service reasons about get their own variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(from = "String", into = "String")]
#[schemars(with = "String")]
pub enum ObjectClass {
    Person,
    Bicycle,
    Car,
    Motorcycle,
    Bus,
    Truck,
    Other(String),
}

impl ObjectClass {
    pub fn as_str(&self) -> &str {
        match self {
            ObjectClass::Person => "person",
            ObjectClass::Bicycle => "bicycle",
            ObjectClass::Car => "car",
            ObjectClass::Motorcycle => "motorcycle",
            ObjectClass::Bus => "bus",
            ObjectClass::Truck => "truck",
            ObjectClass::Other(label) => label,
        }
    }

    pub fn is_vehicle(&self) -> bool {
        matches!(
            self,
            ObjectClass::Bicycle
                | ObjectClass::Car
                | ObjectClass::Motorcycle
                | ObjectClass::Bus
                | ObjectClass::Truck
        )
    }

    /// Overlay color for the class.
    pub fn display_color(&self) -> &'static str {
        match self {
            ObjectClass::Person => "#10B981",
            c if c.is_vehicle() => "#3B82F6",
            _ => "#9CA3AF",
        }
    }
}

impl From<String> for ObjectClass {
    fn from(s: String) -> Self {
        match s.trim().to_lowercase().as_str() {
            "person" => ObjectClass::Person,
            "bicycle" => ObjectClass::Bicycle,
            "car" => ObjectClass::Car,
            "motorcycle" => ObjectClass::Motorcycle,
            "bus" => ObjectClass::Bus,
            "truck" => ObjectClass::Truck,
            _ => ObjectClass::Other(s),
        }
    }
}

impl From<ObjectClass> for String {
    fn from(c: ObjectClass) -> Self {
        c.as_str().to_string()
    }
}

impl fmt::Display for ObjectClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An object reported for one frame, in canonical space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DetectedObject {
    pub class: ObjectClass,
    /// Confidence in [0, 1]
    pub confidence: f64,
    pub bbox: BoundingBox,
}

impl DetectedObject {
    pub fn new(class: ObjectClass, confidence: f64, bbox: BoundingBox) -> Self {
        Self {
            class,
            confidence: confidence.clamp(0.0, 1.0),
            bbox,
        }
    }

    pub fn person(confidence: f64, bbox: BoundingBox) -> Self {
        Self::new(ObjectClass::Person, confidence, bbox)
    }

    pub fn is_person(&self) -> bool {
        self.class == ObjectClass::Person
    }

    pub fn centroid(&self) -> Point {
        self.bbox.centroid()
    }
}
