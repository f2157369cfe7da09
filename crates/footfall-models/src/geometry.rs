//! Canonical-space geometry.
//!
//! All calibration geometry and detection boxes are stored in a fixed
//! 1280x720 reference frame. Surfaces of another size rescale on read
//! through [`CanonicalSpace`]; stored coordinates are never rewritten.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Width of the canonical coordinate space.
pub const CANONICAL_WIDTH: f64 = 1280.0;

/// Height of the canonical coordinate space.
pub const CANONICAL_HEIGHT: f64 = 720.0;

/// A point in canonical space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned bounding box (top-left corner plus size).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Build from the `[x, y, w, h]` array used on the wire.
    pub fn from_xywh(v: [f64; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }

    /// Center of the box.
    pub fn centroid(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }
}

/// Scale factors between a source resolution and canonical space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanonicalSpace {
    scale_x: f64,
    scale_y: f64,
}

impl CanonicalSpace {
    /// Mapping for a surface of `width` x `height` pixels.
    ///
    /// A zero dimension falls back to the identity mapping on that axis.
    pub fn from_source(width: u32, height: u32) -> Self {
        let scale_x = if width == 0 { 1.0 } else { CANONICAL_WIDTH / width as f64 };
        let scale_y = if height == 0 { 1.0 } else { CANONICAL_HEIGHT / height as f64 };
        Self { scale_x, scale_y }
    }

    pub fn identity() -> Self {
        Self { scale_x: 1.0, scale_y: 1.0 }
    }

    pub fn is_identity(&self) -> bool {
        self.scale_x == 1.0 && self.scale_y == 1.0
    }

    pub fn to_canonical(&self, p: Point) -> Point {
        Point::new(p.x * self.scale_x, p.y * self.scale_y)
    }

    pub fn to_canonical_box(&self, b: BoundingBox) -> BoundingBox {
        BoundingBox::new(
            b.x * self.scale_x,
            b.y * self.scale_y,
            b.width * self.scale_x,
            b.height * self.scale_y,
        )
    }

    /// Map a canonical point onto the source surface (render-time read).
    pub fn to_source(&self, p: Point) -> Point {
        Point::new(p.x / self.scale_x, p.y / self.scale_y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centroid() {
        let b = BoundingBox::new(100.0, 50.0, 40.0, 80.0);
        assert_eq!(b.centroid(), Point::new(120.0, 90.0));
    }

    #[test]
    fn test_rescale_from_vga() {
        let space = CanonicalSpace::from_source(640, 480);
        let p = space.to_canonical(Point::new(320.0, 240.0));
        assert_eq!(p, Point::new(640.0, 360.0));

        let b = space.to_canonical_box(BoundingBox::new(10.0, 10.0, 20.0, 20.0));
        assert_eq!(b, BoundingBox::new(20.0, 15.0, 40.0, 30.0));
    }

    #[test]
    fn test_render_rescale_round_trip() {
        let space = CanonicalSpace::from_source(1920, 1080);
        let canonical = Point::new(640.0, 360.0);
        let on_screen = space.to_source(canonical);
        assert_eq!(on_screen, Point::new(960.0, 540.0));
        assert_eq!(space.to_canonical(on_screen), canonical);
    }

    #[test]
    fn test_canonical_source_is_identity() {
        assert!(CanonicalSpace::from_source(1280, 720).is_identity());
        assert!(CanonicalSpace::from_source(0, 0).is_identity());
    }
}
