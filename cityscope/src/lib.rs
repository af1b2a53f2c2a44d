//! cityscope - incremental geospatial feature synchronization
//!
//! This library keeps a city map's overlay of point features (hospitals,
//! parks, bus stops, ...) in step with the set of layers a user has switched
//! on. Features are extracted from OpenStreetMap data (or persisted layer
//! files), reduced to one representative point each, filtered to the city
//! boundary and clustered on a Web Mercator grid for rendering.
//!
//! # Modules
//!
//! - [`geometry`]: coordinates, geometries, bounding boxes, point-in-polygon
//! - [`catalog`]: the built-in layer table
//! - [`source`]: Overpass API access
//! - [`extract`]: the feature extraction pipeline
//! - [`storage`]: persisted layers
//! - [`cluster`]: the clustering aggregator
//! - [`sync`]: the layer synchronization engine and its reactive driver
//! - [`config`] and [`logging`]: ambient setup for binaries
//!
//! # High-Level API
//!
//! ```ignore
//! use cityscope::extract::OverpassFeatureSource;
//! use cityscope::source::AsyncReqwestClient;
//! use cityscope::sync::{CitySession, SyncConfig, SyncEngine};
//!
//! let source = OverpassFeatureSource::new(AsyncReqwestClient::new()?);
//! let mut engine = SyncEngine::new(source, SyncConfig::default());
//! engine.select_city(Arc::new(CitySession::new("Lisbon", boundary, neighbourhoods)));
//! engine.declare(&["hospitals", "parks"].into_iter().collect());
//! engine.run_until_idle().await;
//! ```

pub mod catalog;
pub mod cluster;
pub mod config;
pub mod extract;
pub mod geometry;
pub mod logging;
pub mod source;
pub mod storage;
pub mod sync;

/// Version of the cityscope library and CLI.
///
/// This is synchronized across all components in the workspace.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
