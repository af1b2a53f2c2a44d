//! Feature sources: the contract and the Overpass-backed implementation.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use super::convert::features_from_elements;
use super::error::ExtractError;
use super::feature::Feature;
use crate::catalog::LayerCatalog;
use crate::geometry::Boundary;
use crate::source::{
    AsyncHttpClient, OverpassClient, OverpassQuery, DEFAULT_OVERPASS_URL,
    DEFAULT_QUERY_TIMEOUT_SECS,
};

/// What to extract: one layer for one city.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractRequest {
    pub city: String,
    pub boundary: Arc<Boundary>,
    pub layer: String,
}

impl ExtractRequest {
    pub fn new(city: impl Into<String>, boundary: Arc<Boundary>, layer: impl Into<String>) -> Self {
        Self {
            city: city.into(),
            boundary,
            layer: layer.into(),
        }
    }
}

/// Produces the features of one layer inside a city boundary.
///
/// Implementations must only return features whose representative point is
/// contained in the request boundary. Ordering is not significant.
pub trait FeatureSource: Send + Sync + 'static {
    fn extract_features(
        &self,
        request: &ExtractRequest,
    ) -> impl Future<Output = Result<Vec<Feature>, ExtractError>> + Send;

    /// Short name for logging.
    fn name(&self) -> &str;
}

/// Extracts features live from an Overpass interpreter.
pub struct OverpassFeatureSource<C: AsyncHttpClient> {
    client: OverpassClient<C>,
    catalog: LayerCatalog,
    query_timeout_secs: u64,
}

impl<C: AsyncHttpClient> OverpassFeatureSource<C> {
    /// Creates a source against the public endpoint with default timeouts.
    pub fn new(http: C) -> Self {
        Self::with_endpoint(
            http,
            DEFAULT_OVERPASS_URL,
            Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS),
        )
    }

    /// Creates a source against a specific endpoint.
    ///
    /// `request_timeout` bounds each HTTP attempt; the server-side query
    /// timeout is set to the same number of seconds.
    pub fn with_endpoint(http: C, url: impl Into<String>, request_timeout: Duration) -> Self {
        Self {
            client: OverpassClient::new(http, url, request_timeout),
            catalog: LayerCatalog::builtin(),
            query_timeout_secs: request_timeout.as_secs().max(1),
        }
    }
}

impl<C: AsyncHttpClient + 'static> FeatureSource for OverpassFeatureSource<C> {
    async fn extract_features(&self, request: &ExtractRequest) -> Result<Vec<Feature>, ExtractError> {
        let bbox = request.boundary.bounding_box();
        if !bbox.is_valid() {
            return Err(ExtractError::EmptyBoundary);
        }

        let layer = self
            .catalog
            .get(&request.layer)
            .ok_or_else(|| ExtractError::UnknownLayer(request.layer.clone()))?;

        let query = OverpassQuery::new(bbox, layer.predicate).with_timeout(self.query_timeout_secs);
        debug!(
            city = %request.city,
            layer = layer.name,
            bbox = %bbox,
            "Querying map-data source"
        );

        let response = self.client.query(&query).await?;
        let (features, stats) = features_from_elements(response.elements, &request.boundary, layer);

        info!(
            city = %request.city,
            layer = layer.name,
            received = stats.received,
            duplicates = stats.duplicates,
            malformed = stats.malformed,
            outside = stats.outside,
            kept = stats.kept,
            "Layer extracted"
        );
        Ok(features)
    }

    fn name(&self) -> &str {
        "overpass"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Coord, Polygon};
    use crate::source::{MockAsyncHttpClient, SourceError};

    fn unit_square() -> Arc<Boundary> {
        Arc::new(Boundary::Polygon(Polygon::from_exterior(vec![
            Coord::new(0.0, 0.0),
            Coord::new(0.0, 1.0),
            Coord::new(1.0, 1.0),
            Coord::new(1.0, 0.0),
            Coord::new(0.0, 0.0),
        ])))
    }

    fn source(http: MockAsyncHttpClient) -> OverpassFeatureSource<MockAsyncHttpClient> {
        OverpassFeatureSource::with_endpoint(http, "http://overpass.test", Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_extracts_hospital() {
        let http = MockAsyncHttpClient::with_json(
            r#"{"elements":[{"type":"node","id":1,"lat":0.5,"lon":0.5,"tags":{"amenity":"hospital"}}]}"#,
        );
        let request = ExtractRequest::new("Testville", unit_square(), "hospitals");

        let features = source(http.clone()).extract_features(&request).await.unwrap();

        assert_eq!(features.len(), 1);
        assert_eq!(features[0].domain(), "health");
        assert_eq!(features[0].name(), None);

        let form = http.last_form.lock().unwrap().clone();
        assert!(form[0].1.contains("[\"amenity\"=\"hospital\"](0,0,1,1)"));
    }

    #[tokio::test]
    async fn test_empty_boundary_fails_without_request() {
        let http = MockAsyncHttpClient::with_json(r#"{"elements":[]}"#);
        let request = ExtractRequest::new(
            "Nowhere",
            Arc::new(Boundary::MultiPolygon(vec![])),
            "hospitals",
        );

        let result = source(http.clone()).extract_features(&request).await;

        assert_eq!(result, Err(ExtractError::EmptyBoundary));
        assert_eq!(http.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_layer() {
        let http = MockAsyncHttpClient::with_json(r#"{"elements":[]}"#);
        let request = ExtractRequest::new("Testville", unit_square(), "volcanoes");

        let result = source(http).extract_features(&request).await;
        assert_eq!(result, Err(ExtractError::UnknownLayer("volcanoes".to_string())));
    }

    #[tokio::test]
    async fn test_upstream_error_is_source_unavailable() {
        let http = MockAsyncHttpClient::new(Err(SourceError::Http("connection reset".to_string())));
        let request = ExtractRequest::new("Testville", unit_square(), "roads");

        let err = source(http).extract_features(&request).await.unwrap_err();
        assert!(matches!(err, ExtractError::SourceUnavailable(_)));
        assert!(err.is_retryable());
    }
}
