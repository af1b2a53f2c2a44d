//! Directory-backed layer store.
//!
//! # Layout
//!
//! ```text
//! <root>/
//! └── <city>/
//!     ├── layers.json      # { "<layer>": { "domain": ..., "icon": ... }, ... }
//!     ├── hospitals.json   # [Feature, ...]
//!     └── parks.json
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tracing::{debug, info};

use super::{LayerInfo, LayerStore, StorageError};
use crate::extract::Feature;

/// Name of the per-city layer index file.
pub const LAYER_INDEX_FILE: &str = "layers.json";

/// Stores each city as a directory of JSON files under a root.
#[derive(Debug, Clone)]
pub struct DirectoryLayerStore {
    root: PathBuf,
}

impl DirectoryLayerStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persists one layer's features and records it in the city index.
    ///
    /// Overwrites a previously saved layer of the same name.
    pub fn save_layer(
        &self,
        city: &str,
        layer: &str,
        info: LayerInfo,
        features: &[Feature],
    ) -> Result<(), StorageError> {
        let dir = self.city_dir(city)?;
        let layer_path = dir.join(layer_file_name(layer)?);

        fs::create_dir_all(&dir).map_err(|source| StorageError::Io {
            path: dir.clone(),
            source,
        })?;

        write_json(&layer_path, &features)?;

        let index_path = dir.join(LAYER_INDEX_FILE);
        let mut index: BTreeMap<String, LayerInfo> = if index_path.exists() {
            read_json(&index_path)?
        } else {
            BTreeMap::new()
        };
        index.insert(layer.to_string(), info);
        write_json(&index_path, &index)?;

        info!(
            city = city,
            layer = layer,
            features = features.len(),
            path = %layer_path.display(),
            "Saved layer"
        );
        Ok(())
    }

    fn city_dir(&self, city: &str) -> Result<PathBuf, StorageError> {
        validate_name(city)?;
        Ok(self.root.join(city))
    }
}

impl LayerStore for DirectoryLayerStore {
    fn list_available_layers(
        &self,
        city: &str,
    ) -> Result<BTreeMap<String, LayerInfo>, StorageError> {
        let index_path = self.city_dir(city)?.join(LAYER_INDEX_FILE);
        if !index_path.exists() {
            return Err(StorageError::CityNotFound(city.to_string()));
        }
        read_json(&index_path)
    }

    fn load_features(&self, city: &str, layers: &[String]) -> Result<Vec<Feature>, StorageError> {
        let dir = self.city_dir(city)?;
        let mut features = Vec::new();

        for layer in layers {
            let path = dir.join(layer_file_name(layer)?);
            if !path.exists() {
                return Err(StorageError::LayerNotFound {
                    city: city.to_string(),
                    layer: layer.clone(),
                });
            }
            let loaded: Vec<Feature> = read_json(&path)?;
            debug!(city = city, layer = %layer, features = loaded.len(), "Loaded layer file");
            features.extend(loaded);
        }

        Ok(features)
    }
}

fn validate_name(name: &str) -> Result<(), StorageError> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.contains('\0');
    if bad {
        Err(StorageError::InvalidName(name.to_string()))
    } else {
        Ok(())
    }
}

fn layer_file_name(layer: &str) -> Result<String, StorageError> {
    validate_name(layer)?;
    if format!("{}.json", layer) == LAYER_INDEX_FILE {
        return Err(StorageError::InvalidName(layer.to_string()));
    }
    Ok(format!("{}.json", layer))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StorageError> {
    let file = fs::File::open(path).map_err(|source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| StorageError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn write_json<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StorageError> {
    let io_err = |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = fs::File::create(path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, value).map_err(|source| StorageError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    writer.flush().map_err(io_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::FeatureId;
    use crate::geometry::{Coord, Geometry};
    use crate::source::ElementKind;
    use tempfile::TempDir;

    fn park(id: i64, lat: f64, lon: f64) -> Feature {
        Feature::new(
            FeatureId::new(ElementKind::Node, id),
            Geometry::Point(Coord::new(lat, lon)),
            Some(format!("Park {}", id)),
            "parks",
            "environment",
        )
    }

    fn park_info() -> LayerInfo {
        LayerInfo {
            domain: "environment".to_string(),
            icon: "tree".to_string(),
        }
    }

    #[test]
    fn test_save_then_list_and_load() {
        let temp = TempDir::new().unwrap();
        let store = DirectoryLayerStore::new(temp.path());
        let features = vec![park(1, 0.1, 0.1), park(2, 0.2, 0.2)];

        store.save_layer("Testville", "parks", park_info(), &features).unwrap();

        let layers = store.list_available_layers("Testville").unwrap();
        assert_eq!(layers.len(), 1);
        assert_eq!(layers["parks"], park_info());

        let loaded = store
            .load_features("Testville", &["parks".to_string()])
            .unwrap();
        assert_eq!(loaded, features);
    }

    #[test]
    fn test_second_layer_extends_index() {
        let temp = TempDir::new().unwrap();
        let store = DirectoryLayerStore::new(temp.path());

        store.save_layer("Testville", "parks", park_info(), &[]).unwrap();
        store
            .save_layer(
                "Testville",
                "hospitals",
                LayerInfo {
                    domain: "health".to_string(),
                    icon: "hospital".to_string(),
                },
                &[],
            )
            .unwrap();

        let names: Vec<_> = store
            .list_available_layers("Testville")
            .unwrap()
            .into_keys()
            .collect();
        assert_eq!(names, vec!["hospitals", "parks"]);
    }

    #[test]
    fn test_missing_city() {
        let temp = TempDir::new().unwrap();
        let store = DirectoryLayerStore::new(temp.path());

        assert!(matches!(
            store.list_available_layers("Atlantis"),
            Err(StorageError::CityNotFound(_))
        ));
    }

    #[test]
    fn test_missing_layer_file() {
        let temp = TempDir::new().unwrap();
        let store = DirectoryLayerStore::new(temp.path());
        store.save_layer("Testville", "parks", park_info(), &[]).unwrap();

        let result = store.load_features("Testville", &["roads".to_string()]);
        assert!(matches!(result, Err(StorageError::LayerNotFound { .. })));
    }

    #[test]
    fn test_rejects_path_traversal() {
        let temp = TempDir::new().unwrap();
        let store = DirectoryLayerStore::new(temp.path());

        assert!(matches!(
            store.list_available_layers("../etc"),
            Err(StorageError::InvalidName(_))
        ));
        assert!(matches!(
            store.save_layer("Testville", "layers", park_info(), &[]),
            Err(StorageError::InvalidName(_))
        ));
    }

    #[test]
    fn test_corrupt_index_is_json_error() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("Testville");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(LAYER_INDEX_FILE), "not json").unwrap();

        let store = DirectoryLayerStore::new(temp.path());
        assert!(matches!(
            store.list_available_layers("Testville"),
            Err(StorageError::Json { .. })
        ));
    }
}
