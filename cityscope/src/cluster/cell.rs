//! Web Mercator grid cells.
//!
//! A [`ClusterCell`] is a slippy-map tile at the clustering zoom. Features
//! falling into the same tile are aggregated into one cluster.

use std::f64::consts::PI;
use std::fmt;

use serde::Serialize;

use crate::geometry::{BoundingBox, Coord};

/// Web Mercator valid latitude range.
pub const MAX_LAT: f64 = 85.05112878;
pub const MIN_LAT: f64 = -85.05112878;

/// Deepest zoom a cell can be computed at.
pub const MAX_CELL_ZOOM: u8 = 24;

/// One Web Mercator tile used as a clustering bucket.
///
/// Ordering is by column, then row, then zoom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ClusterCell {
    /// Column (east-west), 0 at the antimeridian.
    pub x: u32,
    /// Row (north-south), 0 at the north edge.
    pub y: u32,
    pub zoom: u8,
}

impl ClusterCell {
    pub fn new(x: u32, y: u32, zoom: u8) -> Self {
        Self { x, y, zoom }
    }

    /// Cell containing `coord` at `zoom`.
    ///
    /// Latitudes beyond the Mercator limit are clamped onto the edge rows and
    /// `lon = 180` lands in the last column, so every finite coordinate maps
    /// to a cell.
    pub fn containing(coord: Coord, zoom: u8) -> Self {
        let zoom = zoom.min(MAX_CELL_ZOOM);
        let n = 2.0_f64.powi(zoom as i32);
        let max_index = (n as u32).saturating_sub(1);

        let lat = coord.lat.clamp(MIN_LAT, MAX_LAT);
        let lon = coord.lon.clamp(-180.0, 180.0);

        let x = ((lon + 180.0) / 360.0 * n) as u32;

        let lat_rad = lat * PI / 180.0;
        let y = ((1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n) as u32;

        Self {
            x: x.min(max_index),
            y: y.min(max_index),
            zoom,
        }
    }

    /// Geographic extent of the cell.
    pub fn bounds(&self) -> BoundingBox {
        let (north, west) = corner(self.x, self.y, self.zoom);
        let (south, east) = corner(self.x + 1, self.y + 1, self.zoom);
        BoundingBox::new(south, west, north, east)
    }
}

/// Northwest corner of tile `(x, y)`.
fn corner(x: u32, y: u32, zoom: u8) -> (f64, f64) {
    let n = 2.0_f64.powi(zoom as i32);
    let lon = x as f64 / n * 360.0 - 180.0;
    let lat_rad = (PI * (1.0 - 2.0 * y as f64 / n)).sinh().atan();
    (lat_rad * 180.0 / PI, lon)
}

impl fmt::Display for ClusterCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_york_city_at_zoom_16() {
        let cell = ClusterCell::containing(Coord::new(40.7128, -74.0060), 16);
        assert_eq!(cell, ClusterCell::new(19295, 24640, 16));
    }

    #[test]
    fn test_origin_at_zoom_1() {
        // (0,0) sits on the corner shared by the four zoom-1 tiles; floor
        // puts it in the southeast one.
        let cell = ClusterCell::containing(Coord::new(0.0, 0.0), 1);
        assert_eq!(cell, ClusterCell::new(1, 1, 1));
    }

    #[test]
    fn test_edges_are_clamped() {
        let north_east = ClusterCell::containing(Coord::new(89.9, 180.0), 4);
        assert_eq!(north_east, ClusterCell::new(15, 0, 4));

        let south_west = ClusterCell::containing(Coord::new(-89.9, -180.0), 4);
        assert_eq!(south_west, ClusterCell::new(0, 15, 4));
    }

    #[test]
    fn test_zoom_is_capped() {
        let cell = ClusterCell::containing(Coord::new(10.0, 10.0), 40);
        assert_eq!(cell.zoom, MAX_CELL_ZOOM);
    }

    #[test]
    fn test_bounds_contain_source_point() {
        let point = Coord::new(48.8566, 2.3522);
        let cell = ClusterCell::containing(point, 15);
        let bounds = cell.bounds();

        assert!(bounds.contains(point));
        assert!(bounds.north > bounds.south);
        assert!(bounds.east > bounds.west);
    }

    #[test]
    fn test_display() {
        assert_eq!(ClusterCell::new(3, 5, 4).to_string(), "4/3/5");
    }
}
