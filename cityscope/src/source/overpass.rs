//! Overpass API query building and response decoding.
//!
//! Queries are built from a bounding box and a [`TagPredicate`] and sent as
//! the `data` form field of a POST request. Responses use `out geom;` so ways
//! and relation members carry their vertex lists inline.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::http::AsyncHttpClient;
use super::types::SourceError;
use crate::catalog::TagPredicate;
use crate::geometry::{BoundingBox, Coord};

/// Public Overpass endpoint used when nothing is configured.
pub const DEFAULT_OVERPASS_URL: &str = "https://overpass-api.de/api/interpreter";

/// Server-side query timeout in seconds.
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 60;

/// A single Overpass QL query for one layer inside one bounding box.
#[derive(Debug, Clone, PartialEq)]
pub struct OverpassQuery {
    pub bbox: BoundingBox,
    pub predicate: TagPredicate,
    pub timeout_secs: u64,
}

impl OverpassQuery {
    pub fn new(bbox: BoundingBox, predicate: TagPredicate) -> Self {
        Self {
            bbox,
            predicate,
            timeout_secs: DEFAULT_QUERY_TIMEOUT_SECS,
        }
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Renders the query as Overpass QL.
    pub fn to_ql(&self) -> String {
        let filter = self.predicate.to_overpass();
        let bbox = self.bbox;
        format!(
            "[out:json][timeout:{timeout}];(node{filter}({bbox});way{filter}({bbox});relation{filter}({bbox}););out geom;",
            timeout = self.timeout_secs,
            filter = filter,
            bbox = bbox,
        )
    }
}

impl fmt::Display for OverpassQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_ql())
    }
}

/// Element kinds returned by the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Node,
    Way,
    Relation,
}

impl ElementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Node => "node",
            ElementKind::Way => "way",
            ElementKind::Relation => "relation",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ElementKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "node" => Ok(ElementKind::Node),
            "way" => Ok(ElementKind::Way),
            "relation" => Ok(ElementKind::Relation),
            other => Err(format!("unknown element kind '{}'", other)),
        }
    }
}

/// A `{lat, lon}` vertex as Overpass encodes it.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl From<LatLon> for Coord {
    fn from(v: LatLon) -> Self {
        Coord::new(v.lat, v.lon)
    }
}

/// A relation member with inline geometry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawMember {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    /// Vertices of a way member. Entries can be null when clipped.
    #[serde(default)]
    pub geometry: Vec<Option<LatLon>>,
}

impl RawMember {
    /// Every usable vertex of this member.
    pub fn coords(&self) -> Vec<Coord> {
        let mut coords: Vec<Coord> = self.geometry.iter().flatten().copied().map(Coord::from).collect();
        if let (Some(lat), Some(lon)) = (self.lat, self.lon) {
            coords.push(Coord::new(lat, lon));
        }
        coords
    }
}

/// An element returned by the source.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RawElement {
    Node {
        id: i64,
        #[serde(default)]
        lat: Option<f64>,
        #[serde(default)]
        lon: Option<f64>,
        #[serde(default)]
        tags: HashMap<String, String>,
    },
    Way {
        id: i64,
        #[serde(default)]
        geometry: Vec<Option<LatLon>>,
        #[serde(default)]
        tags: HashMap<String, String>,
    },
    Relation {
        id: i64,
        #[serde(default)]
        members: Vec<RawMember>,
        #[serde(default)]
        tags: HashMap<String, String>,
    },
    /// Anything else (areas, counts, ...) is ignored.
    #[serde(other)]
    Other,
}

impl RawElement {
    /// `(kind, id)` identity, or `None` for ignored element types.
    pub fn key(&self) -> Option<(ElementKind, i64)> {
        match self {
            RawElement::Node { id, .. } => Some((ElementKind::Node, *id)),
            RawElement::Way { id, .. } => Some((ElementKind::Way, *id)),
            RawElement::Relation { id, .. } => Some((ElementKind::Relation, *id)),
            RawElement::Other => None,
        }
    }

    /// Tags attached to the element.
    pub fn tags(&self) -> Option<&HashMap<String, String>> {
        match self {
            RawElement::Node { tags, .. }
            | RawElement::Way { tags, .. }
            | RawElement::Relation { tags, .. } => Some(tags),
            RawElement::Other => None,
        }
    }

    /// The `name` tag, if present and non-empty.
    pub fn name(&self) -> Option<&str> {
        self.tags()?
            .get("name")
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }
}

/// Top-level Overpass JSON document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OverpassResponse {
    #[serde(default)]
    pub elements: Vec<RawElement>,
    /// Set by the server when the query was aborted (timeout, memory).
    #[serde(default)]
    pub remark: Option<String>,
}

impl OverpassResponse {
    /// Decodes a response body.
    pub fn from_slice(body: &[u8]) -> Result<Self, SourceError> {
        serde_json::from_slice(body).map_err(|e| SourceError::InvalidResponse(e.to_string()))
    }
}

/// Client for an Overpass interpreter endpoint.
pub struct OverpassClient<C: AsyncHttpClient> {
    http: C,
    url: String,
    request_timeout: Duration,
}

impl<C: AsyncHttpClient> OverpassClient<C> {
    pub fn new(http: C, url: impl Into<String>, request_timeout: Duration) -> Self {
        Self {
            http,
            url: url.into(),
            request_timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Runs a query with a bounded client-side timeout.
    ///
    /// A server `remark` reporting a runtime error is treated as a failed
    /// request, since the element list is truncated in that case.
    pub async fn query(&self, query: &OverpassQuery) -> Result<OverpassResponse, SourceError> {
        let ql = query.to_ql();
        debug!(url = %self.url, query = %ql, "Overpass query");

        let body = match tokio::time::timeout(
            self.request_timeout,
            self.http.post_form(&self.url, &[("data", ql.as_str())]),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    url = %self.url,
                    timeout_secs = self.request_timeout.as_secs(),
                    "Overpass query timeout"
                );
                return Err(SourceError::Timeout {
                    secs: self.request_timeout.as_secs(),
                });
            }
        };

        let response = OverpassResponse::from_slice(&body)?;
        if let Some(remark) = response.remark.as_deref() {
            if remark.contains("runtime error") {
                warn!(url = %self.url, remark = remark, "Overpass query aborted by server");
                return Err(SourceError::InvalidResponse(remark.to_string()));
            }
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::http::tests::MockAsyncHttpClient;

    const SAMPLE: &str = r#"{
        "version": 0.6,
        "elements": [
            {"type": "node", "id": 1, "lat": 0.5, "lon": 0.5, "tags": {"amenity": "hospital", "name": "General"}},
            {"type": "way", "id": 2, "geometry": [{"lat": 0.1, "lon": 0.1}, null, {"lat": 0.2, "lon": 0.2}], "tags": {"highway": "residential"}},
            {"type": "relation", "id": 3, "members": [
                {"type": "way", "ref": 9, "role": "outer", "geometry": [{"lat": 0.0, "lon": 0.0}, {"lat": 1.0, "lon": 1.0}]},
                {"type": "node", "ref": 10, "role": "label", "lat": 0.5, "lon": 0.6}
            ]},
            {"type": "area", "id": 4}
        ]
    }"#;

    #[test]
    fn test_query_renders_all_element_types() {
        let query = OverpassQuery::new(
            BoundingBox::new(0.0, 1.0, 2.0, 3.0),
            TagPredicate::Equals("amenity", "hospital"),
        )
        .with_timeout(25);
        assert_eq!(
            query.to_ql(),
            "[out:json][timeout:25];(node[\"amenity\"=\"hospital\"](0,1,2,3);way[\"amenity\"=\"hospital\"](0,1,2,3);relation[\"amenity\"=\"hospital\"](0,1,2,3););out geom;"
        );
    }

    #[test]
    fn test_response_decodes_element_types() {
        let response = OverpassResponse::from_slice(SAMPLE.as_bytes()).unwrap();
        assert_eq!(response.elements.len(), 4);
        assert_eq!(response.elements[0].key(), Some((ElementKind::Node, 1)));
        assert_eq!(response.elements[0].name(), Some("General"));
        assert_eq!(response.elements[3], RawElement::Other);

        let RawElement::Way { geometry, .. } = &response.elements[1] else {
            panic!("expected way");
        };
        assert_eq!(geometry.len(), 3);
        assert!(geometry[1].is_none());

        let RawElement::Relation { members, .. } = &response.elements[2] else {
            panic!("expected relation");
        };
        assert_eq!(members[0].coords().len(), 2);
        assert_eq!(members[1].coords(), vec![Coord::new(0.5, 0.6)]);
    }

    #[test]
    fn test_invalid_body_is_invalid_response() {
        let err = OverpassResponse::from_slice(b"<html>busy</html>").unwrap_err();
        assert!(matches!(err, SourceError::InvalidResponse(_)));
    }

    #[test]
    fn test_element_kind_parse() {
        assert_eq!("way".parse::<ElementKind>(), Ok(ElementKind::Way));
        assert!("area".parse::<ElementKind>().is_err());
    }

    #[tokio::test]
    async fn test_client_posts_query_as_data_field() {
        let http = MockAsyncHttpClient::with_json(SAMPLE);
        let client = OverpassClient::new(http.clone(), "http://overpass.test", Duration::from_secs(5));
        let query = OverpassQuery::new(BoundingBox::new(0.0, 0.0, 1.0, 1.0), TagPredicate::Any("highway"));

        let response = client.query(&query).await.unwrap();
        assert_eq!(response.elements.len(), 4);

        let form = http.last_form.lock().unwrap().clone();
        assert_eq!(form[0].0, "data");
        assert_eq!(form[0].1, query.to_ql());
    }

    #[tokio::test]
    async fn test_client_runtime_remark_is_error() {
        let http = MockAsyncHttpClient::with_json(
            r#"{"elements": [], "remark": "runtime error: Query timed out in \"query\""}"#,
        );
        let client = OverpassClient::new(http, "http://overpass.test", Duration::from_secs(5));
        let query = OverpassQuery::new(BoundingBox::new(0.0, 0.0, 1.0, 1.0), TagPredicate::Any("highway"));

        assert!(matches!(
            client.query(&query).await,
            Err(SourceError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_client_propagates_rate_limit() {
        let http = MockAsyncHttpClient::new(Err(SourceError::from_status(429, "http://overpass.test")));
        let client = OverpassClient::new(http, "http://overpass.test", Duration::from_secs(5));
        let query = OverpassQuery::new(BoundingBox::new(0.0, 0.0, 1.0, 1.0), TagPredicate::Any("highway"));

        assert!(matches!(
            client.query(&query).await,
            Err(SourceError::RateLimited { .. })
        ));
    }
}
