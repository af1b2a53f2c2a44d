//! Element → feature conversion.

use std::collections::HashSet;

use tracing::debug;

use super::error::MalformedGeometry;
use super::feature::{Feature, FeatureId};
use crate::catalog::LayerDefinition;
use crate::geometry::{Boundary, Coord, Geometry, Polygon};
use crate::source::RawElement;

/// Counters describing one conversion pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConversionStats {
    pub received: usize,
    pub duplicates: usize,
    pub malformed: usize,
    pub outside: usize,
    pub kept: usize,
}

/// Builds the geometry an element describes.
///
/// - node → Point
/// - way forming a closed ring (≥ 4 vertices, first == last) → Polygon
/// - any other way → LineString
/// - relation → MultiPoint cloud of all member vertices
pub fn element_geometry(element: &RawElement) -> Result<Geometry, MalformedGeometry> {
    let malformed = |reason| MalformedGeometry {
        element: element
            .key()
            .map(|(kind, id)| FeatureId::new(kind, id).to_string())
            .unwrap_or_else(|| "unknown element".to_string()),
        reason,
    };

    match element {
        RawElement::Node { lat, lon, .. } => match (lat, lon) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => {
                Ok(Geometry::Point(Coord::new(*lat, *lon)))
            }
            _ => Err(malformed("node without coordinates")),
        },
        RawElement::Way { geometry, .. } => {
            let coords: Vec<Coord> = geometry
                .iter()
                .flatten()
                .map(|v| Coord::from(*v))
                .filter(Coord::is_finite)
                .collect();
            if coords.is_empty() {
                return Err(malformed("way without geometry"));
            }
            if is_closed_ring(&coords) {
                Ok(Geometry::Polygon(Polygon::from_exterior(coords)))
            } else {
                Ok(Geometry::LineString(coords))
            }
        }
        RawElement::Relation { members, .. } => {
            let coords: Vec<Coord> = members
                .iter()
                .flat_map(|m| m.coords())
                .filter(Coord::is_finite)
                .collect();
            if coords.is_empty() {
                return Err(malformed("relation without member geometry"));
            }
            Ok(Geometry::MultiPoint(coords))
        }
        RawElement::Other => Err(malformed("unsupported element type")),
    }
}

fn is_closed_ring(coords: &[Coord]) -> bool {
    coords.len() >= 4 && coords.first() == coords.last()
}

/// Turns raw elements into boundary-contained features for `layer`.
///
/// Elements are deduplicated by source id first; malformed elements are
/// skipped; features whose representative point falls outside the boundary
/// are discarded.
pub fn features_from_elements(
    elements: Vec<RawElement>,
    boundary: &Boundary,
    layer: &LayerDefinition,
) -> (Vec<Feature>, ConversionStats) {
    let mut stats = ConversionStats {
        received: elements.len(),
        ..Default::default()
    };
    let mut seen = HashSet::with_capacity(elements.len());
    let mut features = Vec::with_capacity(elements.len());

    for element in elements {
        let Some((kind, id)) = element.key() else {
            stats.malformed += 1;
            continue;
        };
        if !seen.insert((kind, id)) {
            stats.duplicates += 1;
            continue;
        }

        let geometry = match element_geometry(&element) {
            Ok(geometry) => geometry,
            Err(err) => {
                debug!(layer = layer.name, error = %err, "Skipping element");
                stats.malformed += 1;
                continue;
            }
        };

        let name = element.name().map(str::to_string);
        let feature = Feature::new(
            FeatureId::new(kind, id),
            geometry,
            name,
            layer.name,
            layer.domain,
        );

        if !boundary.contains(feature.representative_point()) {
            stats.outside += 1;
            continue;
        }
        features.push(feature);
    }

    stats.kept = features.len();
    (features, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::LayerCatalog;
    use crate::geometry::GeometryType;
    use crate::source::{LatLon, OverpassResponse, RawMember};
    use std::collections::HashMap;

    fn unit_square() -> Boundary {
        Boundary::Polygon(Polygon::from_exterior(vec![
            Coord::new(0.0, 0.0),
            Coord::new(0.0, 1.0),
            Coord::new(1.0, 1.0),
            Coord::new(1.0, 0.0),
            Coord::new(0.0, 0.0),
        ]))
    }

    fn node(id: i64, lat: f64, lon: f64) -> RawElement {
        RawElement::Node {
            id,
            lat: Some(lat),
            lon: Some(lon),
            tags: HashMap::new(),
        }
    }

    fn way(id: i64, coords: &[(f64, f64)]) -> RawElement {
        RawElement::Way {
            id,
            geometry: coords
                .iter()
                .map(|&(lat, lon)| Some(LatLon { lat, lon }))
                .collect(),
            tags: HashMap::new(),
        }
    }

    #[test]
    fn test_hospital_node_in_unit_square() {
        let body = r#"{"elements":[{"type":"node","id":1,"lat":0.5,"lon":0.5,"tags":{"amenity":"hospital","name":"St. Mary"}}]}"#;
        let response = OverpassResponse::from_slice(body.as_bytes()).unwrap();
        let layer = LayerCatalog::builtin().get("hospitals").unwrap();

        let (features, stats) = features_from_elements(response.elements, &unit_square(), layer);

        assert_eq!(features.len(), 1);
        let feature = &features[0];
        assert_eq!(feature.layer(), "hospitals");
        assert_eq!(feature.domain(), "health");
        assert_eq!(feature.representative_point(), Coord::new(0.5, 0.5));
        assert_eq!(feature.name(), Some("St. Mary"));
        assert!(unit_square().contains(feature.representative_point()));
        assert_eq!(stats.kept, 1);
    }

    #[test]
    fn test_closed_way_becomes_polygon() {
        let element = way(2, &[(0.2, 0.2), (0.2, 0.4), (0.4, 0.4), (0.2, 0.2)]);
        let geometry = element_geometry(&element).unwrap();
        assert_eq!(geometry.geometry_type(), GeometryType::Polygon);
    }

    #[test]
    fn test_open_way_becomes_linestring() {
        let element = way(3, &[(0.2, 0.2), (0.2, 0.4), (0.4, 0.4)]);
        assert_eq!(
            element_geometry(&element).unwrap().geometry_type(),
            GeometryType::LineString
        );

        // Three vertices with first == last is not a ring
        let element = way(4, &[(0.2, 0.2), (0.2, 0.4), (0.2, 0.2)]);
        assert_eq!(
            element_geometry(&element).unwrap().geometry_type(),
            GeometryType::LineString
        );
    }

    #[test]
    fn test_relation_becomes_point_cloud() {
        let element = RawElement::Relation {
            id: 5,
            members: vec![RawMember {
                kind: "way".to_string(),
                role: "outer".to_string(),
                lat: None,
                lon: None,
                geometry: vec![
                    Some(LatLon { lat: 0.0, lon: 0.0 }),
                    None,
                    Some(LatLon { lat: 1.0, lon: 1.0 }),
                ],
            }],
            tags: HashMap::new(),
        };
        let geometry = element_geometry(&element).unwrap();
        assert_eq!(
            geometry,
            Geometry::MultiPoint(vec![Coord::new(0.0, 0.0), Coord::new(1.0, 1.0)])
        );
    }

    #[test]
    fn test_malformed_elements_are_skipped() {
        let layer = LayerCatalog::builtin().get("roads").unwrap();
        let elements = vec![
            RawElement::Node {
                id: 1,
                lat: None,
                lon: None,
                tags: HashMap::new(),
            },
            way(2, &[]),
            RawElement::Other,
            node(3, 0.5, 0.5),
        ];

        let (features, stats) = features_from_elements(elements, &unit_square(), layer);

        assert_eq!(features.len(), 1);
        assert_eq!(stats.malformed, 3);
    }

    #[test]
    fn test_duplicates_removed_before_filtering() {
        let layer = LayerCatalog::builtin().get("parks").unwrap();
        let elements = vec![node(1, 0.5, 0.5), node(1, 0.5, 0.5), node(2, 0.6, 0.6)];

        let (features, stats) = features_from_elements(elements, &unit_square(), layer);

        assert_eq!(features.len(), 2);
        assert_eq!(stats.duplicates, 1);
    }

    #[test]
    fn test_node_and_way_with_same_number_are_distinct() {
        let layer = LayerCatalog::builtin().get("parks").unwrap();
        let elements = vec![node(1, 0.5, 0.5), way(1, &[(0.1, 0.1), (0.2, 0.2)])];

        let (features, _) = features_from_elements(elements, &unit_square(), layer);
        assert_eq!(features.len(), 2);
    }

    #[test]
    fn test_points_outside_boundary_are_discarded() {
        let layer = LayerCatalog::builtin().get("schools").unwrap();
        let elements = vec![node(1, 0.5, 0.5), node(2, 2.0, 2.0), node(3, 1.0, 0.5)];

        let (features, stats) = features_from_elements(elements, &unit_square(), layer);

        let ids: Vec<i64> = features.iter().map(|f| f.id().id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(stats.outside, 1);
    }
}
