//! Adapter exposing a [`LayerStore`] as a [`FeatureSource`].

use std::sync::Arc;

use tracing::{debug, warn};

use super::{LayerStore, StorageError};
use crate::extract::{ExtractError, ExtractRequest, Feature, FeatureSource};

/// Serves layers from persisted storage instead of the live map-data source.
///
/// Store reads run on the blocking pool. Loaded features are filtered
/// against the request boundary like live extractions are.
pub struct StoredFeatureSource<S: LayerStore> {
    store: Arc<S>,
}

impl<S: LayerStore> StoredFeatureSource<S> {
    pub fn new(store: S) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S: LayerStore> FeatureSource for StoredFeatureSource<S> {
    async fn extract_features(&self, request: &ExtractRequest) -> Result<Vec<Feature>, ExtractError> {
        if !request.boundary.bounding_box().is_valid() {
            return Err(ExtractError::EmptyBoundary);
        }

        let store = Arc::clone(&self.store);
        let city = request.city.clone();
        let layer = request.layer.clone();

        let loaded = tokio::task::spawn_blocking(move || {
            let available = store.list_available_layers(&city)?;
            if !available.contains_key(&layer) {
                return Err(StorageError::LayerNotFound { city, layer });
            }
            store.load_features(&city, std::slice::from_ref(&layer))
        })
        .await
        .map_err(|e| ExtractError::SourceUnavailable(format!("storage task failed: {}", e)))?;

        let features = match loaded {
            Ok(features) => features,
            Err(StorageError::LayerNotFound { layer, .. }) => {
                return Err(ExtractError::UnknownLayer(layer))
            }
            Err(StorageError::CityNotFound(_)) | Err(StorageError::InvalidName(_)) => {
                return Err(ExtractError::UnknownLayer(request.layer.clone()))
            }
            Err(e) => {
                warn!(city = %request.city, layer = %request.layer, error = %e, "Storage read failed");
                return Err(ExtractError::StoredLayerUnreadable(e.to_string()));
            }
        };

        let total = features.len();
        let kept: Vec<Feature> = features
            .into_iter()
            .filter(|f| f.layer() == request.layer)
            .filter(|f| request.boundary.contains(f.representative_point()))
            .collect();

        debug!(
            city = %request.city,
            layer = %request.layer,
            loaded = total,
            kept = kept.len(),
            "Layer served from storage"
        );
        Ok(kept)
    }

    fn name(&self) -> &str {
        "storage"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::FeatureId;
    use crate::geometry::{Boundary, Coord, Geometry, Polygon};
    use crate::source::ElementKind;
    use crate::storage::{DirectoryLayerStore, LayerInfo};
    use tempfile::TempDir;

    fn unit_square() -> Arc<Boundary> {
        Arc::new(Boundary::Polygon(Polygon::from_exterior(vec![
            Coord::new(0.0, 0.0),
            Coord::new(0.0, 1.0),
            Coord::new(1.0, 1.0),
            Coord::new(1.0, 0.0),
            Coord::new(0.0, 0.0),
        ])))
    }

    fn hospital(id: i64, lat: f64, lon: f64) -> Feature {
        Feature::new(
            FeatureId::new(ElementKind::Node, id),
            Geometry::Point(Coord::new(lat, lon)),
            None,
            "hospitals",
            "health",
        )
    }

    fn seeded_store(temp: &TempDir) -> DirectoryLayerStore {
        let store = DirectoryLayerStore::new(temp.path());
        store
            .save_layer(
                "Testville",
                "hospitals",
                LayerInfo {
                    domain: "health".to_string(),
                    icon: "hospital".to_string(),
                },
                &[hospital(1, 0.5, 0.5), hospital(2, 5.0, 5.0)],
            )
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_serves_features_inside_boundary() {
        let temp = TempDir::new().unwrap();
        let source = StoredFeatureSource::new(seeded_store(&temp));

        let request = ExtractRequest::new("Testville", unit_square(), "hospitals");
        let features = source.extract_features(&request).await.unwrap();

        assert_eq!(features.len(), 1);
        assert_eq!(features[0].id().to_string(), "node/1");
    }

    #[tokio::test]
    async fn test_unlisted_layer_is_unknown() {
        let temp = TempDir::new().unwrap();
        let source = StoredFeatureSource::new(seeded_store(&temp));

        let request = ExtractRequest::new("Testville", unit_square(), "parks");
        let result = source.extract_features(&request).await;

        assert_eq!(result, Err(ExtractError::UnknownLayer("parks".to_string())));
    }

    #[tokio::test]
    async fn test_missing_city_is_unknown_layer() {
        let temp = TempDir::new().unwrap();
        let source = StoredFeatureSource::new(DirectoryLayerStore::new(temp.path()));

        let request = ExtractRequest::new("Atlantis", unit_square(), "hospitals");
        let result = source.extract_features(&request).await;

        assert_eq!(result, Err(ExtractError::UnknownLayer("hospitals".to_string())));
    }

    #[tokio::test]
    async fn test_corrupt_layer_file_is_not_retried() {
        let temp = TempDir::new().unwrap();
        let source = StoredFeatureSource::new(seeded_store(&temp));
        std::fs::write(temp.path().join("Testville").join("hospitals.json"), "not json").unwrap();

        let request = ExtractRequest::new("Testville", unit_square(), "hospitals");
        let err = source.extract_features(&request).await.unwrap_err();

        assert!(matches!(err, ExtractError::StoredLayerUnreadable(_)));
        assert!(!err.is_retryable());
    }
}
