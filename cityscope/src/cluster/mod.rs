//! Clustering aggregator.
//!
//! Holds the materialized feature set and groups it into Web Mercator grid
//! cells for rendering. Updates are incremental: adding or removing features
//! marks cells dirty and only those cells are recomputed on refresh.
//!
//! ```
//! use cityscope::cluster::{ClusterAggregator, ClusterConfig};
//!
//! let mut aggregator = ClusterAggregator::new(ClusterConfig::default());
//! assert_eq!(aggregator.refresh(), 0);
//! assert!(aggregator.markers().is_empty());
//! ```

mod aggregator;
mod cell;

pub use aggregator::{
    Cluster, ClusterAggregator, ClusterConfig, Marker, DEFAULT_CELL_ZOOM_OFFSET, DEFAULT_ZOOM,
};
pub use cell::{ClusterCell, MAX_CELL_ZOOM};
