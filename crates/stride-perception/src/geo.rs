//! Geodesy helpers on top of the [`geo`](::geo) crate.
//!
//! All distances are great-circle (haversine) distances in metres on a
//! spherical Earth. `geo` orders coordinates `(x, y) = (longitude,
//! latitude)`; [`point`] and [`coordinate`] convert at the boundary so the
//! rest of the workspace keeps using [`Coordinate`].
//!
//! # Example
//!
//! ```rust
//! use stride_perception::geo::{haversine_m, offset};
//! use stride_types::Coordinate;
//!
//! let origin = Coordinate::new(-37.9000, 145.0000);
//!
//! // 100 m north of the origin.
//! let north = offset(origin, 0.0, 100.0);
//! assert!((haversine_m(origin, north) - 100.0).abs() < 0.5);
//! ```

use ::geo::{
    Closest, HaversineBearing, HaversineClosestPoint, HaversineDestination, HaversineDistance,
    HaversineLength, Line, LineString, Point,
};
use stride_types::Coordinate;

pub fn point(c: Coordinate) -> Point<f64> {
    Point::new(c.longitude, c.latitude)
}

pub fn coordinate(p: Point<f64>) -> Coordinate {
    Coordinate::new(p.y(), p.x())
}

/// A polyline through `points`, in order.
pub fn line_string(points: &[Coordinate]) -> LineString<f64> {
    points
        .iter()
        .map(|c| (c.longitude, c.latitude))
        .collect::<Vec<_>>()
        .into()
}

/// Great-circle distance between two coordinates, in metres.
pub fn haversine_m(a: Coordinate, b: Coordinate) -> f64 {
    point(a).haversine_distance(&point(b))
}

/// Total length of a polyline, in metres.
pub fn path_length_m(points: &[Coordinate]) -> f64 {
    line_string(points).haversine_length()
}

/// The coordinate `east_m` / `north_m` metres away from `from`.
pub fn offset(from: Coordinate, east_m: f64, north_m: f64) -> Coordinate {
    let distance = east_m.hypot(north_m);
    if distance == 0.0 {
        return from;
    }
    let bearing = east_m.atan2(north_m).to_degrees();
    coordinate(point(from).haversine_destination(bearing, distance))
}

/// Shortest distance from `p` to the segment `a → b`, in metres.
///
/// A degenerate segment (`a == b`) yields the distance to `a`.
pub fn distance_to_segment_m(p: Coordinate, a: Coordinate, b: Coordinate) -> f64 {
    if a == b {
        return haversine_m(p, a);
    }
    let target = point(p);
    match Line::new(point(a), point(b)).haversine_closest_point(&target) {
        Closest::Intersection(_) => 0.0,
        Closest::SinglePoint(closest) => target.haversine_distance(&closest),
        Closest::Indeterminate => haversine_m(p, a),
    }
}

/// Initial bearing from `a` to `b` in degrees clockwise from north, `[0, 360)`.
pub fn bearing_deg(a: Coordinate, b: Coordinate) -> f64 {
    point(a).haversine_bearing(point(b)).rem_euclid(360.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: Coordinate = Coordinate::new(-37.9000, 145.0000);

    #[test]
    fn haversine_zero_for_same_point() {
        assert_eq!(haversine_m(ORIGIN, ORIGIN), 0.0);
    }

    #[test]
    fn haversine_one_degree_latitude() {
        let d = haversine_m(Coordinate::new(0.0, 0.0), Coordinate::new(1.0, 0.0));
        assert!((d - 111_195.0).abs() < 10.0, "got {d}");
    }

    #[test]
    fn haversine_scenario_route_length() {
        let dest = Coordinate::new(-37.9100, 145.0100);
        let d = haversine_m(ORIGIN, dest);
        // ~1.11 km south, ~0.88 km east.
        assert!((1_380.0..1_440.0).contains(&d), "got {d}");
    }

    #[test]
    fn point_uses_lon_lat_order() {
        let p = point(ORIGIN);
        assert_eq!(p.x(), 145.0);
        assert_eq!(p.y(), -37.9);
        assert_eq!(coordinate(p), ORIGIN);
    }

    #[test]
    fn offset_matches_haversine() {
        let c = offset(ORIGIN, 30.0, 40.0);
        assert!((haversine_m(ORIGIN, c) - 50.0).abs() < 0.1);
        assert!(c.latitude > ORIGIN.latitude && c.longitude > ORIGIN.longitude);
        assert_eq!(offset(ORIGIN, 0.0, 0.0), ORIGIN);
    }

    #[test]
    fn segment_distance_perpendicular() {
        let a = ORIGIN;
        let b = offset(ORIGIN, 0.0, 200.0);
        let p = offset(ORIGIN, 80.0, 100.0);
        let d = distance_to_segment_m(p, a, b);
        assert!((d - 80.0).abs() < 0.5, "got {d}");
    }

    #[test]
    fn segment_distance_clamps_to_endpoints() {
        let a = ORIGIN;
        let b = offset(ORIGIN, 0.0, 100.0);
        let p = offset(ORIGIN, 0.0, 130.0);
        let d = distance_to_segment_m(p, a, b);
        assert!((d - 30.0).abs() < 0.5, "got {d}");
    }

    #[test]
    fn degenerate_segment_is_point_distance() {
        let p = offset(ORIGIN, 0.0, 25.0);
        let d = distance_to_segment_m(p, ORIGIN, ORIGIN);
        assert!((d - 25.0).abs() < 0.1, "got {d}");
    }

    #[test]
    fn path_length_sums_legs() {
        let pts = [ORIGIN, offset(ORIGIN, 0.0, 100.0), offset(ORIGIN, 100.0, 100.0)];
        assert_eq!(line_string(&pts).0.len(), 3);
        assert!((path_length_m(&pts) - 200.0).abs() < 1.0);
    }

    #[test]
    fn bearing_cardinal_directions() {
        let north = offset(ORIGIN, 0.0, 100.0);
        let east = offset(ORIGIN, 100.0, 0.0);
        let west = offset(ORIGIN, -100.0, 0.0);
        assert!(bearing_deg(ORIGIN, north) < 0.5 || bearing_deg(ORIGIN, north) > 359.5);
        assert!((bearing_deg(ORIGIN, east) - 90.0).abs() < 0.5);
        assert!((bearing_deg(ORIGIN, west) - 270.0).abs() < 0.5);
    }
}
