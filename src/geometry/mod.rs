//! Oriented text-region geometry
//!
//! Regions come out of detection as arbitrarily rotated quadrilaterals with
//! no guaranteed winding order. Everything downstream (cropping, label
//! placement) needs a canonical "top-left" vertex, chosen here.

pub mod warp;

/// A planar point in frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// A detected, possibly rotated, text line described by exactly 4 vertices.
#[derive(Debug, Clone)]
pub struct OrientedRegion {
    points: [Point; 4],
}

impl OrientedRegion {
    pub fn new(points: [Point; 4]) -> Self {
        Self { points }
    }

    /// Axis-aligned rectangle with top-left corner `(x, y)`.
    pub fn axis_aligned(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self::new([
            Point::new(x, y),
            Point::new(x + width, y),
            Point::new(x + width, y + height),
            Point::new(x, y + height),
        ])
    }

    pub fn points(&self) -> &[Point; 4] {
        &self.points
    }

    /// Rotated-rect extent: the product of two adjacent edge lengths.
    /// Used only for ranking regions, so degenerate quads yielding zero
    /// are acceptable.
    pub fn area(&self) -> f32 {
        let [p0, p1, p2, _] = self.points;
        let e1 = ((p1.x - p0.x).powi(2) + (p1.y - p0.y).powi(2)).sqrt();
        let e2 = ((p2.x - p1.x).powi(2) + (p2.y - p1.y).powi(2)).sqrt();
        e1 * e2
    }
}

/// Pick the vertex that should map to the crop's top-left corner.
///
/// Scans the 4 vertices tracking the leftmost and second-leftmost x seen so
/// far; a point equal in value to the current leftmost is not promoted to
/// second-leftmost. If the second-leftmost point is visually higher (smaller
/// y) it wins, so a rotated rectangle resolves to its true top-left corner
/// rather than an arbitrary leftmost vertex.
///
/// Always returns an index in `0..4`. Degenerate quads (duplicate points,
/// zero area) still resolve to some index; the behavior on exact ties in x
/// is a scan-order artifact and intentionally left as-is.
pub fn select_anchor(points: &[Point; 4]) -> usize {
    let mut most_left = Point::new(f32::MAX, f32::MAX);
    let mut almost_most_left = Point::new(f32::MAX, f32::MAX);
    let mut most_left_idx: Option<usize> = None;
    let mut almost_most_left_idx: Option<usize> = None;

    for (i, &p) in points.iter().enumerate() {
        if most_left.x > p.x {
            if most_left.x != f32::MAX {
                almost_most_left = most_left;
                almost_most_left_idx = most_left_idx;
            }
            most_left = p;
            most_left_idx = Some(i);
        }
        if almost_most_left.x > p.x && p != most_left {
            almost_most_left = p;
            almost_most_left_idx = Some(i);
        }
    }

    if almost_most_left.y < most_left.y {
        if let Some(idx) = almost_most_left_idx {
            return idx;
        }
    }
    most_left_idx.unwrap_or(0)
}
