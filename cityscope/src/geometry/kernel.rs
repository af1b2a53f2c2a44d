//! Pure geometric functions: representative points and containment.

use super::types::{Boundary, Coord, Geometry, Neighbourhood, Polygon};

/// Mean Earth radius in kilometres.
const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Tolerance for treating a point as lying on a polygon edge.
const EDGE_EPSILON: f64 = 1e-12;

/// Returns the single coordinate used to place `geometry` on the map.
///
/// - Point: the coordinate itself.
/// - LineString / MultiLineString: the arc-length midpoint.
/// - Polygon / MultiPolygon: the mean of all ring vertices.
/// - MultiPoint: the mean of its points.
///
/// Never fails. Geometries without usable vertices resolve to their bounding
/// box center (the origin when there is no box at all).
pub fn representative_point(geometry: &Geometry) -> Coord {
    let point = match geometry {
        Geometry::Point(coord) => Some(*coord),
        Geometry::LineString(line) => arc_length_midpoint(std::slice::from_ref(line)),
        Geometry::MultiLineString(lines) => arc_length_midpoint(lines),
        Geometry::Polygon(_) | Geometry::MultiPolygon(_) | Geometry::MultiPoint(_) => {
            vertex_mean(geometry.vertices())
        }
    };

    match point {
        Some(p) if p.is_finite() => p,
        _ => geometry.bounding_box().center(),
    }
}

/// Arithmetic mean of the finite coordinates, or `None` if there are none.
pub fn vertex_mean(coords: impl IntoIterator<Item = Coord>) -> Option<Coord> {
    let (count, lat, lon) = coords
        .into_iter()
        .filter(Coord::is_finite)
        .fold((0usize, 0.0, 0.0), |(n, lat, lon), c| {
            (n + 1, lat + c.lat, lon + c.lon)
        });

    if count == 0 {
        return None;
    }
    Some(Coord::new(lat / count as f64, lon / count as f64))
}

/// Point at half of the cumulative path length of `parts`.
///
/// Segment lengths are great-circle distances; the point itself is linearly
/// interpolated inside the segment that crosses the halfway mark. Gaps
/// between parts do not contribute to the length. Zero-length paths resolve
/// to their first vertex.
pub fn arc_length_midpoint(parts: &[Vec<Coord>]) -> Option<Coord> {
    let first = parts
        .iter()
        .flat_map(|p| p.iter())
        .copied()
        .find(Coord::is_finite)?;

    let total: f64 = parts.iter().map(|p| path_length_km(p)).sum();
    if total <= 0.0 {
        return Some(first);
    }

    let target = total / 2.0;
    let mut walked = 0.0;
    for part in parts {
        for segment in part.windows(2) {
            let (a, b) = (segment[0], segment[1]);
            if !a.is_finite() || !b.is_finite() {
                continue;
            }
            let length = haversine_km(a, b);
            if length > 0.0 && walked + length >= target {
                let t = ((target - walked) / length).clamp(0.0, 1.0);
                return Some(Coord::new(
                    a.lat + (b.lat - a.lat) * t,
                    a.lon + (b.lon - a.lon) * t,
                ));
            }
            walked += length;
        }
    }

    // Floating point drift can leave `walked` a hair short of `target`.
    parts
        .iter()
        .rev()
        .flat_map(|p| p.iter().rev())
        .copied()
        .find(Coord::is_finite)
}

/// Length of a path in kilometres, skipping non-finite vertices.
pub fn path_length_km(path: &[Coord]) -> f64 {
    path.windows(2)
        .filter(|s| s[0].is_finite() && s[1].is_finite())
        .map(|s| haversine_km(s[0], s[1]))
        .sum()
}

/// Great-circle distance between two coordinates in kilometres.
pub fn haversine_km(a: Coord, b: Coord) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// Tests whether `point` lies inside `polygon`.
///
/// Points on the outer ring's edges count as inside. Points strictly inside
/// a hole are outside; points on a hole's edge are inside.
pub fn point_in_polygon(point: Coord, polygon: &Polygon) -> bool {
    let Some(exterior) = polygon.exterior() else {
        return false;
    };
    if !point_in_ring(point, exterior) {
        return false;
    }
    !polygon
        .holes()
        .iter()
        .any(|hole| point_in_ring(point, hole) && !point_on_ring(point, hole))
}

/// Even-odd ray casting against a single ring, edges inclusive.
///
/// The ring may be given closed (first == last) or open.
pub fn point_in_ring(point: Coord, ring: &[Coord]) -> bool {
    if ring.len() < 3 {
        return false;
    }
    if point_on_ring(point, ring) {
        return true;
    }

    let (x, y) = (point.lon, point.lat);
    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (xi, yi) = (ring[i].lon, ring[i].lat);
        let (xj, yj) = (ring[j].lon, ring[j].lat);
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// True if `point` lies on any edge of `ring` (including the closing edge).
fn point_on_ring(point: Coord, ring: &[Coord]) -> bool {
    let n = ring.len();
    (0..n).any(|i| point_on_segment(point, ring[i], ring[(i + 1) % n]))
}

fn point_on_segment(p: Coord, a: Coord, b: Coord) -> bool {
    let cross = (b.lon - a.lon) * (p.lat - a.lat) - (b.lat - a.lat) * (p.lon - a.lon);
    if cross.abs() > EDGE_EPSILON {
        return false;
    }
    p.lon >= a.lon.min(b.lon) - EDGE_EPSILON
        && p.lon <= a.lon.max(b.lon) + EDGE_EPSILON
        && p.lat >= a.lat.min(b.lat) - EDGE_EPSILON
        && p.lat <= a.lat.max(b.lat) + EDGE_EPSILON
}

impl Boundary {
    /// Containment filter: true if `point` lies in (or on the edge of) any
    /// part of the boundary.
    pub fn contains(&self, point: Coord) -> bool {
        self.parts().iter().any(|part| point_in_polygon(point, part))
    }
}

/// Names of every neighbourhood containing `point`, in input order.
///
/// A point can sit in several overlapping neighbourhoods; all of them are
/// returned. Repeated names are reported once.
pub fn point_in_any_polygon(point: Coord, neighbourhoods: &[Neighbourhood]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for neighbourhood in neighbourhoods {
        if neighbourhood.geometry.contains(point) && !names.contains(&neighbourhood.name) {
            names.push(neighbourhood.name.clone());
        }
    }
    names
}
