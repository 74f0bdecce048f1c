//! Convex hull backed by the `geo` crate

use geo::{ConvexHull, Coord, LineString};

use crate::domain::{HullProvider, Point};

/// Hull provider using geo's quickhull implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoConvexHull;

impl HullProvider for GeoConvexHull {
    /// Counter-clockwise ring without the closing point; empty for fewer than
    /// three points.
    fn convex_hull(&self, points: &[Point]) -> Vec<Point> {
        if points.len() < 3 {
            return Vec::new();
        }
        let coords: Vec<Coord<f64>> = points.iter().map(|p| Coord { x: p.x, y: p.y }).collect();
        let hull = LineString::new(coords).convex_hull();

        let mut ring: Vec<Point> = hull
            .exterior()
            .coords()
            .map(|c| Point::new(c.x, c.y))
            .collect();
        if ring.len() > 1 && ring.first() == ring.last() {
            ring.pop();
        }
        ring
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::geometry::polygon_area;

    #[test]
    fn given_square_with_inner_point_when_hulling_then_inner_point_dropped() {
        let points = [
            Point::new(0.0, 0.0),
            Point::new(4.0, 0.0),
            Point::new(2.0, 1.0),
            Point::new(4.0, 4.0),
            Point::new(0.0, 4.0),
        ];
        let hull = GeoConvexHull.convex_hull(&points);
        assert_eq!(hull.len(), 4);
        assert!(!hull.contains(&Point::new(2.0, 1.0)));
        assert!((polygon_area(&hull) - 16.0).abs() < 1e-9);
    }

    #[test]
    fn given_two_points_when_hulling_then_empty() {
        let hull = GeoConvexHull.convex_hull(&[Point::new(0.0, 0.0), Point::new(1.0, 1.0)]);
        assert!(hull.is_empty());
    }
}
