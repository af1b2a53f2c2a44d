//! Geometry kernel.
//!
//! Pure functions over GeoJSON-shaped geometries: representative point
//! extraction, bounding boxes and point-in-polygon containment. Nothing in
//! this module performs I/O or holds state, so every function is safe to
//! call from any task.
//!
//! # Example
//!
//! ```
//! use cityscope::geometry::{representative_point, Coord, Geometry};
//!
//! let road = Geometry::LineString(vec![Coord::new(0.0, 0.0), Coord::new(0.0, 2.0)]);
//! let mid = representative_point(&road);
//! assert!((mid.lon - 1.0).abs() < 1e-9);
//! ```

mod kernel;
mod types;

pub use kernel::{
    arc_length_midpoint, haversine_km, path_length_km, point_in_any_polygon, point_in_polygon,
    point_in_ring, representative_point, vertex_mean,
};
pub use types::{
    BoundingBox, Boundary, Coord, Geometry, GeometryError, GeometryType, Neighbourhood, Polygon,
};
