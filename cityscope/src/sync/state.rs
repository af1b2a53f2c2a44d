//! Layer sets and progress snapshots.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

/// Declared intent: layer name to enabled flag.
///
/// Layers mapped to `false` and layers absent from the set are treated the
/// same way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveLayerSet {
    layers: BTreeMap<String, bool>,
}

impl ActiveLayerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a layer's flag, returning the updated set.
    pub fn with(mut self, layer: impl Into<String>, active: bool) -> Self {
        self.set(layer, active);
        self
    }

    pub fn set(&mut self, layer: impl Into<String>, active: bool) {
        self.layers.insert(layer.into(), active);
    }

    pub fn is_active(&self, layer: &str) -> bool {
        self.layers.get(layer).copied().unwrap_or(false)
    }

    /// Names of the layers declared `true`.
    pub fn enabled(&self) -> BTreeSet<String> {
        self.layers
            .iter()
            .filter(|(_, active)| **active)
            .map(|(name, _)| name.clone())
            .collect()
    }
}

impl<S: Into<String>> FromIterator<S> for ActiveLayerSet {
    /// Builds a set with every given layer enabled.
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            layers: iter.into_iter().map(|name| (name.into(), true)).collect(),
        }
    }
}

/// Layers whose materialization completed.
pub type LoadedLayerSet = BTreeSet<String>;

/// Per-layer progress as seen by the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LayerLoadState {
    /// Extraction in progress.
    Fetching,
    /// Features received and being merged into the aggregate.
    Merging { merged: usize, total: usize },
    /// Fully materialized.
    Loaded { features: usize },
    /// Extraction failed; nothing from this layer is materialized.
    Failed { error: String },
}

impl LayerLoadState {
    /// True while the layer still has work outstanding.
    pub fn is_busy(&self) -> bool {
        matches!(self, LayerLoadState::Fetching | LayerLoadState::Merging { .. })
    }
}

impl fmt::Display for LayerLoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerLoadState::Fetching => write!(f, "fetching"),
            LayerLoadState::Merging { merged, total } => write!(f, "merging {}/{}", merged, total),
            LayerLoadState::Loaded { features } => write!(f, "loaded ({} features)", features),
            LayerLoadState::Failed { error } => write!(f, "failed: {}", error),
        }
    }
}

/// Snapshot of the engine's state published to the UI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncProgress {
    /// Selected city, if any.
    pub city: Option<String>,
    pub materialized_feature_count: usize,
    pub layers: BTreeMap<String, LayerLoadState>,
}

impl SyncProgress {
    /// True when no layer is fetching or merging.
    pub fn is_settled(&self) -> bool {
        !self.layers.values().any(LayerLoadState::is_busy)
    }

    pub fn loaded_layers(&self) -> impl Iterator<Item = &str> {
        self.layers
            .iter()
            .filter(|(_, state)| matches!(state, LayerLoadState::Loaded { .. }))
            .map(|(name, _)| name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enabled_skips_false_entries() {
        let set = ActiveLayerSet::new()
            .with("roads", true)
            .with("parks", false)
            .with("hospitals", true);

        let enabled: Vec<_> = set.enabled().into_iter().collect();
        assert_eq!(enabled, vec!["hospitals", "roads"]);
        assert!(!set.is_active("parks"));
        assert!(!set.is_active("schools"));
    }

    #[test]
    fn test_from_iter_enables_all() {
        let set: ActiveLayerSet = ["roads", "parks"].into_iter().collect();
        assert!(set.is_active("roads"));
        assert!(set.is_active("parks"));
    }

    #[test]
    fn test_progress_settled() {
        let mut progress = SyncProgress::default();
        assert!(progress.is_settled());

        progress
            .layers
            .insert("roads".to_string(), LayerLoadState::Merging { merged: 1, total: 3 });
        assert!(!progress.is_settled());

        progress
            .layers
            .insert("roads".to_string(), LayerLoadState::Loaded { features: 3 });
        assert!(progress.is_settled());
        assert_eq!(progress.loaded_layers().collect::<Vec<_>>(), vec!["roads"]);
    }
}
