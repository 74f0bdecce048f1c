//! Planar geometry helpers shared by chains, roots and statistics.
//!
//! Angles follow screen coordinates: the y-axis points down, so a vector going
//! "up" on screen (negative dy) has an angle in `[0, π]`.

use std::f64::consts::PI;

use serde::Serialize;

/// A point in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        norm(other.x - self.x, other.y - self.y)
    }
}

/// Euclidean norm of a vector.
pub fn norm(dx: f64, dy: f64) -> f64 {
    (dx * dx + dy * dy).sqrt()
}

/// Converts a direction vector to an angle in `[0, 2π)`.
///
/// A zero vector has no direction and maps to `0.0`.
pub fn vect_to_theta(dx: f64, dy: f64) -> f64 {
    let n = norm(dx, dy);
    if n == 0.0 {
        return 0.0;
    }
    let a = (dx / n).clamp(-1.0, 1.0).acos();
    let theta = if dy <= 0.0 { a } else { 2.0 * PI - a };
    if theta >= 2.0 * PI {
        0.0
    } else {
        theta
    }
}

/// Absolute angle between two directions, folded into `[0, π]`.
pub fn angle_between(theta_a: f64, theta_b: f64) -> f64 {
    let d = (theta_a - theta_b).abs() % (2.0 * PI);
    if d > PI {
        2.0 * PI - d
    } else {
        d
    }
}

/// Axis-aligned extent of a point set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Smallest box containing all points, `None` for an empty set.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bb = BoundingBox {
            min_x: first.x,
            min_y: first.y,
            max_x: first.x,
            max_y: first.y,
        };
        for p in iter {
            bb.min_x = bb.min_x.min(p.x);
            bb.min_y = bb.min_y.min(p.y);
            bb.max_x = bb.max_x.max(p.x);
            bb.max_y = bb.max_y.max(p.y);
        }
        Some(bb)
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn center(&self) -> Point {
        Point::new(
            self.min_x + self.width() / 2.0,
            self.min_y + self.height() / 2.0,
        )
    }
}

/// Convex hull capability injected into the statistics engine.
///
/// Implementations return the hull as an ordered vertex ring (closing vertex
/// optional). An empty input yields an empty polygon.
pub trait HullProvider {
    fn convex_hull(&self, points: &[Point]) -> Vec<Point>;
}

/// Area of a simple polygon given as a vertex ring (shoelace formula).
pub fn polygon_area(ring: &[Point]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    let mut twice = 0.0;
    for (i, a) in ring.iter().enumerate() {
        let b = &ring[(i + 1) % ring.len()];
        twice += a.x * b.y - b.x * a.y;
    }
    (twice / 2.0).abs()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn given_axis_directions_when_converting_then_uses_screen_convention() {
        assert!((vect_to_theta(1.0, 0.0) - 0.0).abs() < EPS);
        // up on screen
        assert!((vect_to_theta(0.0, -1.0) - PI / 2.0).abs() < EPS);
        assert!((vect_to_theta(-1.0, 0.0) - PI).abs() < EPS);
        // down on screen
        assert!((vect_to_theta(0.0, 1.0) - 3.0 * PI / 2.0).abs() < EPS);
    }

    #[test]
    fn given_zero_vector_when_converting_then_returns_zero() {
        assert_eq!(vect_to_theta(0.0, 0.0), 0.0);
    }

    #[test]
    fn given_angles_across_zero_when_measuring_then_folds_to_smallest() {
        let a = angle_between(0.1, 2.0 * PI - 0.1);
        assert!((a - 0.2).abs() < EPS);
        assert!((angle_between(0.0, PI) - PI).abs() < EPS);
    }

    #[test]
    fn given_unit_square_when_computing_area_then_returns_one() {
        let ring = [
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(0.0, 1.0),
        ];
        assert!((polygon_area(&ring) - 1.0).abs() < EPS);
    }

    #[test]
    fn given_points_when_bounding_then_center_is_midpoint() {
        let pts = [Point::new(2.0, 4.0), Point::new(6.0, 10.0)];
        let bb = BoundingBox::from_points(&pts).unwrap();
        assert_eq!(bb.center(), Point::new(4.0, 7.0));
        assert!(BoundingBox::from_points(&[]).is_none());
    }
}
