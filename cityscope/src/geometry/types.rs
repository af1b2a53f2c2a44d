//! Geometry type definitions

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A WGS84 coordinate in decimal degrees.
///
/// Serializes as a GeoJSON position (`[lon, lat]`). Positions with an
/// altitude component are accepted and the altitude is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "[f64; 2]")]
pub struct Coord {
    /// Latitude (north-south)
    pub lat: f64,
    /// Longitude (east-west)
    pub lon: f64,
}

impl Coord {
    /// Creates a coordinate from latitude and longitude.
    #[inline]
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Returns true if both components are finite numbers.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lon.is_finite()
    }
}

impl TryFrom<Vec<f64>> for Coord {
    type Error = GeometryError;

    fn try_from(position: Vec<f64>) -> Result<Self, Self::Error> {
        match position.as_slice() {
            [lon, lat, ..] => Ok(Coord::new(*lat, *lon)),
            _ => Err(GeometryError::InvalidPosition(position.len())),
        }
    }
}

impl From<Coord> for [f64; 2] {
    fn from(coord: Coord) -> Self {
        [coord.lon, coord.lat]
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lon)
    }
}

/// A polygon as a list of linear rings. The first ring is the outer
/// boundary, any further rings are holes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Polygon(pub Vec<Vec<Coord>>);

impl Polygon {
    /// Builds a polygon from a single outer ring.
    pub fn from_exterior(ring: Vec<Coord>) -> Self {
        Self(vec![ring])
    }

    /// The outer ring, if the polygon has any rings at all.
    pub fn exterior(&self) -> Option<&[Coord]> {
        self.0.first().map(Vec::as_slice)
    }

    /// Holes cut out of the outer ring.
    pub fn holes(&self) -> &[Vec<Coord>] {
        self.0.get(1..).unwrap_or(&[])
    }

    /// All rings, outer ring first.
    pub fn rings(&self) -> &[Vec<Coord>] {
        &self.0
    }
}

/// Geometry kinds supported by the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometryType {
    Point,
    LineString,
    Polygon,
    MultiPoint,
    MultiLineString,
    MultiPolygon,
}

impl fmt::Display for GeometryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GeometryType::Point => "Point",
            GeometryType::LineString => "LineString",
            GeometryType::Polygon => "Polygon",
            GeometryType::MultiPoint => "MultiPoint",
            GeometryType::MultiLineString => "MultiLineString",
            GeometryType::MultiPolygon => "MultiPolygon",
        };
        f.write_str(name)
    }
}

/// A GeoJSON geometry.
///
/// Deserializes from `{"type": "...", "coordinates": ...}` objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Point(Coord),
    LineString(Vec<Coord>),
    Polygon(Polygon),
    MultiPoint(Vec<Coord>),
    MultiLineString(Vec<Vec<Coord>>),
    MultiPolygon(Vec<Polygon>),
}

impl Geometry {
    /// Returns the kind of this geometry.
    pub fn geometry_type(&self) -> GeometryType {
        match self {
            Geometry::Point(_) => GeometryType::Point,
            Geometry::LineString(_) => GeometryType::LineString,
            Geometry::Polygon(_) => GeometryType::Polygon,
            Geometry::MultiPoint(_) => GeometryType::MultiPoint,
            Geometry::MultiLineString(_) => GeometryType::MultiLineString,
            Geometry::MultiPolygon(_) => GeometryType::MultiPolygon,
        }
    }

    /// Iterates over every vertex of every part and ring.
    pub fn vertices(&self) -> Box<dyn Iterator<Item = Coord> + '_> {
        match self {
            Geometry::Point(c) => Box::new(std::iter::once(*c)),
            Geometry::LineString(line) | Geometry::MultiPoint(line) => {
                Box::new(line.iter().copied())
            }
            Geometry::Polygon(polygon) => Box::new(polygon.0.iter().flatten().copied()),
            Geometry::MultiLineString(lines) => Box::new(lines.iter().flatten().copied()),
            Geometry::MultiPolygon(polygons) => Box::new(
                polygons
                    .iter()
                    .flat_map(|p| p.0.iter())
                    .flatten()
                    .copied(),
            ),
        }
    }

    /// Bounding box over all vertices.
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_coords(self.vertices())
    }
}

/// Axis-aligned bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl BoundingBox {
    /// Sentinel for "no coordinates seen". Extending it with any coordinate
    /// yields a degenerate box around that coordinate.
    pub const INVALID: BoundingBox = BoundingBox {
        south: f64::INFINITY,
        west: f64::INFINITY,
        north: f64::NEG_INFINITY,
        east: f64::NEG_INFINITY,
    };

    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self {
            south,
            west,
            north,
            east,
        }
    }

    /// Builds the smallest box covering the given coordinates. Non-finite
    /// coordinates are ignored.
    pub fn from_coords(coords: impl IntoIterator<Item = Coord>) -> Self {
        coords.into_iter().fold(Self::INVALID, |mut bbox, c| {
            bbox.extend(c);
            bbox
        })
    }

    /// Grows the box to include `coord`.
    pub fn extend(&mut self, coord: Coord) {
        if !coord.is_finite() {
            return;
        }
        self.south = self.south.min(coord.lat);
        self.north = self.north.max(coord.lat);
        self.west = self.west.min(coord.lon);
        self.east = self.east.max(coord.lon);
    }

    /// Returns false for the [`BoundingBox::INVALID`] sentinel.
    pub fn is_valid(&self) -> bool {
        self.south <= self.north && self.west <= self.east
    }

    /// Center of the box. The invalid box's center is the origin.
    pub fn center(&self) -> Coord {
        if !self.is_valid() {
            return Coord::default();
        }
        Coord::new(
            (self.south + self.north) / 2.0,
            (self.west + self.east) / 2.0,
        )
    }

    /// Inclusive containment test.
    pub fn contains(&self, coord: Coord) -> bool {
        self.is_valid()
            && coord.lat >= self.south
            && coord.lat <= self.north
            && coord.lon >= self.west
            && coord.lon <= self.east
    }

    /// True if the two boxes share at least one point.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.is_valid()
            && other.is_valid()
            && self.south <= other.north
            && other.south <= self.north
            && self.west <= other.east
            && other.west <= self.east
    }
}

impl fmt::Display for BoundingBox {
    /// Formats in Overpass `(south,west,north,east)` order.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.south, self.west, self.north, self.east
        )
    }
}

/// A city's extent: a Polygon or MultiPolygon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Geometry", into = "Geometry")]
pub enum Boundary {
    Polygon(Polygon),
    MultiPolygon(Vec<Polygon>),
}

impl Boundary {
    /// Polygons making up this boundary.
    pub fn parts(&self) -> &[Polygon] {
        match self {
            Boundary::Polygon(polygon) => std::slice::from_ref(polygon),
            Boundary::MultiPolygon(polygons) => polygons,
        }
    }

    /// Bounding box of the outer rings.
    ///
    /// Returns [`BoundingBox::INVALID`] when no outer ring has coordinates.
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_coords(
            self.parts()
                .iter()
                .filter_map(Polygon::exterior)
                .flatten()
                .copied(),
        )
    }
}

impl TryFrom<Geometry> for Boundary {
    type Error = GeometryError;

    fn try_from(geometry: Geometry) -> Result<Self, Self::Error> {
        match geometry {
            Geometry::Polygon(polygon) => Ok(Boundary::Polygon(polygon)),
            Geometry::MultiPolygon(polygons) => Ok(Boundary::MultiPolygon(polygons)),
            other => Err(GeometryError::NotAreal(other.geometry_type())),
        }
    }
}

impl From<Boundary> for Geometry {
    fn from(boundary: Boundary) -> Self {
        match boundary {
            Boundary::Polygon(polygon) => Geometry::Polygon(polygon),
            Boundary::MultiPolygon(polygons) => Geometry::MultiPolygon(polygons),
        }
    }
}

/// A named area inside a city, used for membership lookups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neighbourhood {
    pub name: String,
    pub geometry: Boundary,
}

impl Neighbourhood {
    pub fn new(name: impl Into<String>, geometry: Boundary) -> Self {
        Self {
            name: name.into(),
            geometry,
        }
    }
}

/// Errors produced when building geometries from external input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    /// A position had fewer than two components.
    #[error("Invalid position: expected [lon, lat], got {0} component(s)")]
    InvalidPosition(usize),

    /// A boundary must be a Polygon or MultiPolygon.
    #[error("Expected Polygon or MultiPolygon, got {0}")]
    NotAreal(GeometryType),
}
