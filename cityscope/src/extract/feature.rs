//! Normalized point features.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::geometry::{representative_point, Coord, Geometry, GeometryType};
use crate::source::ElementKind;

/// Identity of the source element a feature was produced from.
///
/// Formats and serializes as `kind/id`, e.g. `way/4242`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct FeatureId {
    pub kind: ElementKind,
    pub id: i64,
}

impl FeatureId {
    pub fn new(kind: ElementKind, id: i64) -> Self {
        Self { kind, id }
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

impl FromStr for FeatureId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = s
            .split_once('/')
            .ok_or_else(|| format!("feature id '{}' is not kind/id", s))?;
        let id = id
            .parse()
            .map_err(|_| format!("feature id '{}' has a non-numeric id", s))?;
        Ok(Self::new(kind.parse()?, id))
    }
}

impl From<FeatureId> for String {
    fn from(id: FeatureId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for FeatureId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A map feature reduced to one representative point.
///
/// Immutable once created. The representative point is derived from the raw
/// geometry and is only used for placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    id: FeatureId,
    geometry_type: GeometryType,
    representative_point: Coord,
    raw_geometry: Geometry,
    name: Option<String>,
    layer: String,
    domain: String,
}

impl Feature {
    /// Builds a feature, deriving its representative point from `geometry`.
    pub fn new(
        id: FeatureId,
        geometry: Geometry,
        name: Option<String>,
        layer: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            id,
            geometry_type: geometry.geometry_type(),
            representative_point: representative_point(&geometry),
            raw_geometry: geometry,
            name,
            layer: layer.into(),
            domain: domain.into(),
        }
    }

    pub fn id(&self) -> FeatureId {
        self.id
    }

    pub fn geometry_type(&self) -> GeometryType {
        self.geometry_type
    }

    pub fn representative_point(&self) -> Coord {
        self.representative_point
    }

    pub fn raw_geometry(&self) -> &Geometry {
        &self.raw_geometry
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn layer(&self) -> &str {
        &self.layer
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }
}
