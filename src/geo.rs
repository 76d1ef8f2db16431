use geo::HaversineDistance;
use geo::Point;

use crate::graph::Coordinate;

const EARTH_RADIUS_M: f64 = 6_371_008.8;

pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let p1 = Point::new(lon1, lat1);
    let p2 = Point::new(lon2, lat2);
    p1.haversine_distance(&p2)
}

/// Haversine length of a polyline in metres
pub fn polyline_length(points: &[Coordinate]) -> f64 {
    points
        .windows(2)
        .map(|w| haversine_distance(w[0].lat(), w[0].lon(), w[1].lat(), w[1].lon()))
        .sum()
}

/// Projection of a point onto a segment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    /// Nearest point on the segment
    pub point: Coordinate,
    /// Relative position along the segment in [0, 1]
    pub position: f64,
    /// Distance from the query point in metres
    pub distance_m: f64,
}

/// Project `p` onto segment `a`–`b` using a local equirectangular frame.
///
/// Accurate enough for snapping within a few kilometres.
pub fn project_onto_segment(p: Coordinate, a: Coordinate, b: Coordinate) -> Projection {
    let cos_lat = p.lat().to_radians().cos();
    let to_xy = |c: Coordinate| {
        (
            c.lon().to_radians() * cos_lat * EARTH_RADIUS_M,
            c.lat().to_radians() * EARTH_RADIUS_M,
        )
    };
    let (px, py) = to_xy(p);
    let (ax, ay) = to_xy(a);
    let (bx, by) = to_xy(b);

    let (dx, dy) = (bx - ax, by - ay);
    let len_2 = dx * dx + dy * dy;
    let position = if len_2 <= f64::EPSILON {
        0.0
    } else {
        (((px - ax) * dx + (py - ay) * dy) / len_2).clamp(0.0, 1.0)
    };

    let (qx, qy) = (ax + position * dx, ay + position * dy);
    let point = Coordinate::new(
        a.lat() + position * (b.lat() - a.lat()),
        a.lon() + position * (b.lon() - a.lon()),
    );

    Projection {
        point,
        position,
        distance_m: ((px - qx).powi(2) + (py - qy).powi(2)).sqrt(),
    }
}
