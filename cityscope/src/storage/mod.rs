//! Object storage collaborator.
//!
//! Persisted layers are an alternative to live extraction: a
//! [`LayerStore`] lists which layers exist for a city and loads their
//! features. [`StoredFeatureSource`] plugs any store into the sync engine as
//! a [`FeatureSource`](crate::extract::FeatureSource).

mod directory;
mod source;

pub use directory::{DirectoryLayerStore, LAYER_INDEX_FILE};
pub use source::StoredFeatureSource;

use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::LayerDefinition;
use crate::extract::Feature;

/// Descriptive metadata for a persisted layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerInfo {
    pub domain: String,
    pub icon: String,
}

impl From<&LayerDefinition> for LayerInfo {
    fn from(def: &LayerDefinition) -> Self {
        Self {
            domain: def.domain.to_string(),
            icon: def.icon.to_string(),
        }
    }
}

/// Errors from a layer store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("No persisted layers for city '{0}'")]
    CityNotFound(String),

    #[error("Layer '{layer}' is not persisted for city '{city}'")]
    LayerNotFound { city: String, layer: String },

    #[error("Invalid storage name '{0}'")]
    InvalidName(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Read access to persisted layers.
pub trait LayerStore: Send + Sync + 'static {
    /// Layers persisted for `city`, keyed by layer name.
    fn list_available_layers(&self, city: &str)
        -> Result<BTreeMap<String, LayerInfo>, StorageError>;

    /// Features of every requested layer, concatenated in request order.
    fn load_features(&self, city: &str, layers: &[String]) -> Result<Vec<Feature>, StorageError>;
}
