//! Point-in-polygon containment.

use footfall_models::Point;

/// Ray-casting containment test.
///
/// Casts a horizontal ray from `point` towards +x and counts edge
/// crossings; an odd count means inside. Polygons with fewer than three
/// vertices contain nothing. The result does not depend on winding order.
pub fn point_in_polygon(point: Point, polygon: &[Point]) -> bool {
    if polygon.len() < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let (pi, pj) = (polygon[i], polygon[j]);

        if (pi.y > point.y) != (pj.y > point.y) {
            let intersection_x = (pj.x - pi.x) * (point.y - pi.y) / (pj.y - pi.y) + pi.x;
            if point.x < intersection_x {
                inside = !inside;
            }
        }
        j = i;
    }

    inside
}
