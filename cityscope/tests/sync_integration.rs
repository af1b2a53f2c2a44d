//! Integration tests for the layer synchronization flow.
//!
//! These tests drive the public API end to end:
//! - Overpass extraction through a scripted HTTP client into the engine
//! - Retry exhaustion surfacing as a failed layer
//! - Persisted layers served through the storage adapter
//! - City switches and layer toggles through the reactive driver
//!
//! Run with: `cargo test --test sync_integration`

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

use cityscope::cluster::{ClusterConfig, Marker};
use cityscope::extract::{
    ExtractError, ExtractRequest, Feature, FeatureId, FeatureSource, OverpassFeatureSource,
    RetryPolicy,
};
use cityscope::geometry::{Boundary, Coord, Geometry, Neighbourhood, Polygon};
use cityscope::source::{AsyncHttpClient, ElementKind, SourceError};
use cityscope::storage::{DirectoryLayerStore, LayerInfo, StoredFeatureSource};
use cityscope::sync::{
    ActiveLayerSet, CitySession, Declaration, LayerLoadState, SyncConfig, SyncDriver, SyncEngine,
    SyncProgress,
};

// ============================================================================
// Mock Implementations
// ============================================================================

/// HTTP client answering Overpass queries by tag filter.
///
/// A query whose text contains a registered filter gets that response;
/// anything else gets HTTP 503.
#[derive(Clone, Default)]
struct ScriptedOverpass {
    responses: Arc<HashMap<&'static str, &'static str>>,
    requests: Arc<AtomicUsize>,
}

impl ScriptedOverpass {
    fn new(responses: &[(&'static str, &'static str)]) -> Self {
        Self {
            responses: Arc::new(responses.iter().copied().collect()),
            requests: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl AsyncHttpClient for ScriptedOverpass {
    async fn post_form(&self, url: &str, fields: &[(&str, &str)]) -> Result<Vec<u8>, SourceError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let query = fields
            .iter()
            .find(|(name, _)| *name == "data")
            .map(|(_, value)| *value)
            .unwrap_or_default();

        self.responses
            .iter()
            .find(|(filter, _)| query.contains(*filter))
            .map(|(_, body)| body.as_bytes().to_vec())
            .ok_or_else(|| SourceError::from_status(503, url))
    }
}

/// Feature source whose fetches for one layer wait on a oneshot release.
struct GatedSource {
    gated_layer: &'static str,
    release: Mutex<Option<oneshot::Receiver<()>>>,
    calls: Mutex<Vec<String>>,
}

impl GatedSource {
    fn new(gated_layer: &'static str) -> (Self, oneshot::Sender<()>) {
        let (tx, rx) = oneshot::channel();
        let source = Self {
            gated_layer,
            release: Mutex::new(Some(rx)),
            calls: Mutex::new(Vec::new()),
        };
        (source, tx)
    }
}

impl FeatureSource for GatedSource {
    async fn extract_features(&self, request: &ExtractRequest) -> Result<Vec<Feature>, ExtractError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{}:{}", request.city, request.layer));

        if request.layer == self.gated_layer {
            let release = self.release.lock().unwrap().take();
            if let Some(release) = release {
                let _ = release.await;
            }
        }

        let center = request.boundary.bounding_box().center();
        Ok(vec![Feature::new(
            FeatureId::new(ElementKind::Node, 1),
            Geometry::Point(center),
            Some(request.city.clone()),
            request.layer.clone(),
            "test",
        )])
    }

    fn name(&self) -> &str {
        "gated"
    }
}

// ============================================================================
// Fixtures
// ============================================================================

fn square(south: f64, west: f64, size: f64) -> Boundary {
    Boundary::Polygon(Polygon::from_exterior(vec![
        Coord::new(south, west),
        Coord::new(south, west + size),
        Coord::new(south + size, west + size),
        Coord::new(south + size, west),
        Coord::new(south, west),
    ]))
}

fn unit_square_city() -> Arc<CitySession> {
    Arc::new(CitySession::new(
        "Testville",
        square(0.0, 0.0, 1.0),
        vec![
            Neighbourhood::new("South", square(0.0, 0.0, 0.5)),
            Neighbourhood::new("Centre", square(0.25, 0.25, 0.5)),
        ],
    ))
}

fn fast_config() -> SyncConfig {
    SyncConfig {
        chunk_size: 50,
        retry: RetryPolicy::new(3, Duration::from_millis(1)),
        cluster: ClusterConfig::default(),
    }
}

fn layers(names: &[&str]) -> ActiveLayerSet {
    names.iter().copied().collect()
}

async fn wait_for_progress<F>(rx: &mut watch::Receiver<SyncProgress>, condition: F)
where
    F: FnMut(&SyncProgress) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(condition))
        .await
        .expect("timed out waiting for progress")
        .expect("progress channel closed");
}

const HOSPITAL_RESPONSE: &str = r#"{
    "elements": [
        {"type": "node", "id": 1, "lat": 0.5, "lon": 0.5, "tags": {"amenity": "hospital", "name": "General"}},
        {"type": "node", "id": 1, "lat": 0.5, "lon": 0.5, "tags": {"amenity": "hospital", "name": "General"}},
        {"type": "node", "id": 2, "lat": 3.0, "lon": 3.0, "tags": {"amenity": "hospital"}}
    ]
}"#;

const PARK_RESPONSE: &str = r#"{
    "elements": [
        {"type": "way", "id": 10, "tags": {"leisure": "park"}, "geometry": [
            {"lat": 0.1, "lon": 0.1}, {"lat": 0.1, "lon": 0.3},
            {"lat": 0.3, "lon": 0.3}, {"lat": 0.3, "lon": 0.1},
            {"lat": 0.1, "lon": 0.1}
        ]}
    ]
}"#;

// ============================================================================
// Engine over Overpass
// ============================================================================

#[tokio::test]
async fn test_overpass_layers_materialize_inside_boundary() {
    let http = ScriptedOverpass::new(&[
        ("\"amenity\"=\"hospital\"", HOSPITAL_RESPONSE),
        ("\"leisure\"=\"park\"", PARK_RESPONSE),
    ]);
    let source = OverpassFeatureSource::with_endpoint(
        http.clone(),
        "http://overpass.test/api/interpreter",
        Duration::from_secs(5),
    );
    let mut engine = SyncEngine::new(source, fast_config());
    engine.select_city(unit_square_city());

    engine.declare(&layers(&["hospitals", "parks"]));
    engine.run_until_idle().await;

    let progress = engine.progress();
    assert_eq!(progress.materialized_feature_count, 2);
    assert_eq!(
        progress.layers["hospitals"],
        LayerLoadState::Loaded { features: 1 }
    );
    assert_eq!(progress.layers["parks"], LayerLoadState::Loaded { features: 1 });
    assert_eq!(http.request_count(), 2);

    let hospital = engine
        .markers()
        .into_iter()
        .find_map(|marker| match marker {
            Marker::Feature {
                layer,
                domain,
                position,
                name,
                neighbourhoods,
                ..
            } if layer == "hospitals" => Some((domain, position, name, neighbourhoods)),
            _ => None,
        })
        .expect("hospital marker");

    assert_eq!(hospital.0, "health");
    assert_eq!(hospital.1, Coord::new(0.5, 0.5));
    assert_eq!(hospital.2.as_deref(), Some("General"));
    assert_eq!(hospital.3, vec!["South".to_string(), "Centre".to_string()]);
}

#[tokio::test]
async fn test_unavailable_source_fails_one_layer_only() {
    let http = ScriptedOverpass::new(&[("\"leisure\"=\"park\"", PARK_RESPONSE)]);
    let source = OverpassFeatureSource::with_endpoint(
        http.clone(),
        "http://overpass.test/api/interpreter",
        Duration::from_secs(5),
    );
    let mut engine = SyncEngine::new(source, fast_config());
    engine.select_city(unit_square_city());

    engine.declare(&layers(&["roads", "parks"]));
    engine.run_until_idle().await;

    let progress = engine.progress();
    match &progress.layers["roads"] {
        LayerLoadState::Failed { error } => assert!(error.contains("503"), "{}", error),
        other => panic!("expected roads to fail, got {:?}", other),
    }
    assert_eq!(progress.layers["parks"], LayerLoadState::Loaded { features: 1 });
    // Three attempts for roads, one for parks.
    assert_eq!(http.request_count(), 4);
}

#[tokio::test]
async fn test_empty_boundary_city_loads_layers_empty() {
    let http = ScriptedOverpass::new(&[]);
    let source = OverpassFeatureSource::with_endpoint(
        http.clone(),
        "http://overpass.test/api/interpreter",
        Duration::from_secs(5),
    );
    let mut engine = SyncEngine::new(source, fast_config());
    engine.select_city(Arc::new(CitySession::new(
        "Nowhere",
        Boundary::MultiPolygon(vec![]),
        vec![],
    )));

    engine.declare(&layers(&["hospitals"]));
    engine.run_until_idle().await;

    assert_eq!(
        engine.layer_state("hospitals"),
        Some(&LayerLoadState::Loaded { features: 0 })
    );
    assert_eq!(http.request_count(), 0);
}

// ============================================================================
// Engine over storage
// ============================================================================

#[tokio::test]
async fn test_persisted_layers_served_through_engine() {
    let temp = tempfile::TempDir::new().unwrap();
    let store = DirectoryLayerStore::new(temp.path());
    let inside = Feature::new(
        FeatureId::new(ElementKind::Way, 7),
        Geometry::Point(Coord::new(0.2, 0.8)),
        Some("Riverside Park".to_string()),
        "parks",
        "environment",
    );
    let outside = Feature::new(
        FeatureId::new(ElementKind::Way, 8),
        Geometry::Point(Coord::new(2.0, 2.0)),
        None,
        "parks",
        "environment",
    );
    store
        .save_layer(
            "Testville",
            "parks",
            LayerInfo {
                domain: "environment".to_string(),
                icon: "tree".to_string(),
            },
            &[inside, outside],
        )
        .unwrap();

    let mut engine = SyncEngine::new(StoredFeatureSource::new(store), fast_config());
    engine.select_city(unit_square_city());
    engine.declare(&layers(&["parks", "hospitals"]));
    engine.run_until_idle().await;

    assert_eq!(
        engine.layer_state("parks"),
        Some(&LayerLoadState::Loaded { features: 1 })
    );
    assert!(matches!(
        engine.layer_state("hospitals"),
        Some(LayerLoadState::Failed { .. })
    ));
}

// ============================================================================
// Driver
// ============================================================================

#[tokio::test]
async fn test_toggle_before_resolution_only_materializes_new_layer() {
    let (source, release_roads) = GatedSource::new("roads");
    let engine = SyncEngine::new(source, fast_config());
    let (driver, mut progress) = SyncDriver::new(engine, Duration::ZERO);
    let (tx, rx) = mpsc::channel(8);
    let token = CancellationToken::new();
    let handle = tokio::spawn(driver.run(rx, token.clone()));

    tx.send(Declaration::SelectCity(unit_square_city())).await.unwrap();
    tx.send(Declaration::SetActiveLayers(layers(&["roads"])))
        .await
        .unwrap();
    wait_for_progress(&mut progress, |p| {
        p.layers.get("roads") == Some(&LayerLoadState::Fetching)
    })
    .await;

    tx.send(Declaration::SetActiveLayers(layers(&["parks"])))
        .await
        .unwrap();
    let _ = release_roads.send(());
    wait_for_progress(&mut progress, |p| {
        p.is_settled() && p.loaded_layers().collect::<Vec<_>>() == vec!["parks"]
    })
    .await;

    token.cancel();
    let engine = handle.await.unwrap();
    assert_eq!(engine.aggregator().layer_len("roads"), 0);
    assert_eq!(engine.progress().materialized_feature_count, 1);
}

#[tokio::test]
async fn test_city_switch_mid_fetch_yields_no_stale_features() {
    let (source, release_hospitals) = GatedSource::new("hospitals");
    let engine = SyncEngine::new(source, fast_config());
    let (driver, mut progress) = SyncDriver::new(engine, Duration::from_millis(20));
    let (tx, rx) = mpsc::channel(8);
    let token = CancellationToken::new();
    let handle = tokio::spawn(driver.run(rx, token.clone()));

    tx.send(Declaration::SelectCity(unit_square_city())).await.unwrap();
    tx.send(Declaration::SetActiveLayers(layers(&["hospitals"])))
        .await
        .unwrap();
    wait_for_progress(&mut progress, |p| {
        p.layers.get("hospitals") == Some(&LayerLoadState::Fetching)
    })
    .await;

    let other_city = Arc::new(CitySession::new("Elsewhere", square(40.0, 40.0, 1.0), vec![]));
    tx.send(Declaration::SelectCity(other_city)).await.unwrap();
    // The first city's fetch was aborted; releasing it must change nothing.
    let _ = release_hospitals.send(());

    wait_for_progress(&mut progress, |p| {
        p.city.as_deref() == Some("Elsewhere")
            && p.is_settled()
            && p.loaded_layers().collect::<Vec<_>>() == vec!["hospitals"]
    })
    .await;

    token.cancel();
    let engine = handle.await.unwrap();
    let markers = engine.markers();
    assert_eq!(markers.len(), 1);
    assert!(markers[0].position().lat >= 40.0);
}
