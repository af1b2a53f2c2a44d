//! Incremental clustering aggregator.
//!
//! Members are bucketed into [`ClusterCell`]s at `zoom + cell_zoom_offset`.
//! Mutations only mark cells dirty; [`ClusterAggregator::refresh`] then
//! recomputes the descriptors of dirty cells alone.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, trace};

use super::cell::{ClusterCell, MAX_CELL_ZOOM};
use crate::extract::{Feature, FeatureId};
use crate::geometry::{point_in_any_polygon, BoundingBox, Coord, Neighbourhood};

/// Default viewport zoom.
pub const DEFAULT_ZOOM: u8 = 13;

/// Default offset between viewport zoom and cell zoom.
pub const DEFAULT_CELL_ZOOM_OFFSET: u8 = 2;

/// Grid parameters for the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterConfig {
    /// Viewport zoom level.
    pub zoom: u8,
    /// Cells are computed at `zoom + cell_zoom_offset`.
    pub cell_zoom_offset: u8,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            zoom: DEFAULT_ZOOM,
            cell_zoom_offset: DEFAULT_CELL_ZOOM_OFFSET,
        }
    }
}

impl ClusterConfig {
    pub fn cell_zoom(&self) -> u8 {
        self.zoom
            .saturating_add(self.cell_zoom_offset)
            .min(MAX_CELL_ZOOM)
    }
}

/// Aggregate descriptor of one cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cluster {
    pub cell: ClusterCell,
    /// Mean of the members' representative points.
    pub center: Coord,
    pub member_count: usize,
    /// Members per domain.
    pub domain_counts: BTreeMap<String, usize>,
    /// Union of the members' neighbourhoods.
    pub neighbourhood_names: BTreeSet<String>,
}

impl Cluster {
    /// Domain histogram ordered by descending count, ties by domain name.
    pub fn domain_slices(&self) -> Vec<(&str, usize)> {
        let mut slices: Vec<(&str, usize)> = self
            .domain_counts
            .iter()
            .map(|(domain, count)| (domain.as_str(), *count))
            .collect();
        slices.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        slices
    }

    /// Domain with the most members.
    pub fn dominant_domain(&self) -> Option<&str> {
        self.domain_slices().first().map(|(domain, _)| *domain)
    }
}

/// What the tile-rendering surface draws.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Marker {
    /// A cell holding exactly one feature.
    Feature {
        id: FeatureId,
        layer: String,
        domain: String,
        name: Option<String>,
        position: Coord,
        neighbourhoods: Vec<String>,
    },
    /// A cell holding several features.
    Cluster(Cluster),
}

impl Marker {
    pub fn position(&self) -> Coord {
        match self {
            Marker::Feature { position, .. } => *position,
            Marker::Cluster(cluster) => cluster.center,
        }
    }
}

type MemberKey = (String, FeatureId);

#[derive(Debug)]
struct Member {
    feature: Feature,
    cell: ClusterCell,
    neighbourhoods: Vec<String>,
}

/// Materialized feature set with a grid index of cluster descriptors.
#[derive(Debug)]
pub struct ClusterAggregator {
    config: ClusterConfig,
    neighbourhoods: Arc<[Neighbourhood]>,
    members: HashMap<MemberKey, Member>,
    by_layer: HashMap<String, HashSet<FeatureId>>,
    by_cell: HashMap<ClusterCell, HashSet<MemberKey>>,
    clusters: BTreeMap<ClusterCell, Cluster>,
    /// Feature markers for single-member cells, captured at refresh time.
    singles: HashMap<ClusterCell, Marker>,
    dirty: HashSet<ClusterCell>,
    /// Layers whose members are held out of descriptors until committed.
    staged: HashSet<String>,
}

impl Default for ClusterAggregator {
    fn default() -> Self {
        Self::new(ClusterConfig::default())
    }
}

impl ClusterAggregator {
    pub fn new(config: ClusterConfig) -> Self {
        Self {
            config,
            neighbourhoods: Arc::from(Vec::new()),
            members: HashMap::new(),
            by_layer: HashMap::new(),
            by_cell: HashMap::new(),
            clusters: BTreeMap::new(),
            singles: HashMap::new(),
            dirty: HashSet::new(),
            staged: HashSet::new(),
        }
    }

    pub fn config(&self) -> ClusterConfig {
        self.config
    }

    /// Drops every member and installs the neighbourhoods used for
    /// membership lookups.
    pub fn reset(&mut self, neighbourhoods: Arc<[Neighbourhood]>) {
        self.clear();
        self.neighbourhoods = neighbourhoods;
    }

    /// Drops every member and descriptor.
    pub fn clear(&mut self) {
        self.members.clear();
        self.by_layer.clear();
        self.by_cell.clear();
        self.clusters.clear();
        self.singles.clear();
        self.dirty.clear();
        self.staged.clear();
    }

    /// Number of materialized features.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Number of materialized features of `layer`.
    pub fn layer_len(&self, layer: &str) -> usize {
        self.by_layer.get(layer).map_or(0, HashSet::len)
    }

    /// Layers with at least one materialized feature.
    pub fn layers(&self) -> impl Iterator<Item = &str> {
        self.by_layer.keys().map(String::as_str)
    }

    /// Number of cells awaiting [`refresh`](Self::refresh).
    pub fn dirty_len(&self) -> usize {
        self.dirty.len()
    }

    /// Holds `layer` out of descriptors: its members are indexed by
    /// [`add`](Self::add) but [`refresh`](Self::refresh) ignores them until
    /// [`commit_layer`](Self::commit_layer).
    pub fn stage_layer(&mut self, layer: &str) {
        self.staged.insert(layer.to_string());
    }

    /// Makes a staged layer visible. Its cells are rebuilt on the next
    /// refresh.
    pub fn commit_layer(&mut self, layer: &str) {
        if !self.staged.remove(layer) {
            return;
        }
        if let Some(ids) = self.by_layer.get(layer) {
            for id in ids {
                if let Some(member) = self.members.get(&(layer.to_string(), *id)) {
                    self.dirty.insert(member.cell);
                }
            }
        }
    }

    pub fn is_staged(&self, layer: &str) -> bool {
        self.staged.contains(layer)
    }

    /// Adds features, replacing any member with the same `(layer, id)` key.
    pub fn add(&mut self, features: impl IntoIterator<Item = Feature>) -> usize {
        let cell_zoom = self.config.cell_zoom();
        let mut added = 0;

        for feature in features {
            let point = feature.representative_point();
            let key = (feature.layer().to_string(), feature.id());
            let member = Member {
                cell: ClusterCell::containing(point, cell_zoom),
                neighbourhoods: point_in_any_polygon(point, &self.neighbourhoods),
                feature,
            };

            self.remove_key(&key);

            self.by_layer
                .entry(key.0.clone())
                .or_default()
                .insert(key.1);
            self.by_cell
                .entry(member.cell)
                .or_default()
                .insert(key.clone());
            self.dirty.insert(member.cell);
            self.members.insert(key, member);
            added += 1;
        }

        trace!(added = added, dirty = self.dirty.len(), "Members added");
        added
    }

    /// Removes every member of `layer`. Returns the number removed.
    pub fn remove_layer(&mut self, layer: &str) -> usize {
        self.staged.remove(layer);
        let Some(ids) = self.by_layer.remove(layer) else {
            return 0;
        };
        let mut removed = 0;
        for id in ids {
            if let Some(member) = self.members.remove(&(layer.to_string(), id)) {
                self.unlink_cell(&member, id);
                removed += 1;
            }
        }
        debug!(layer = layer, removed = removed, "Layer purged from aggregate");
        removed
    }

    /// Removes every member matching `predicate`. Returns the number removed.
    pub fn remove_where<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&Feature) -> bool,
    {
        let doomed: Vec<MemberKey> = self
            .members
            .iter()
            .filter(|(_, member)| predicate(&member.feature))
            .map(|(key, _)| key.clone())
            .collect();

        doomed.iter().filter(|key| self.remove_key(key)).count()
    }

    /// Recomputes the descriptors of dirty cells from their visible
    /// members. Cells left without visible members are dropped; cells still
    /// holding staged members stay dirty.
    ///
    /// Returns the number of cells recomputed.
    pub fn refresh(&mut self) -> usize {
        let dirty: Vec<ClusterCell> = self.dirty.drain().collect();

        for cell in &dirty {
            let keys = self.by_cell.get(cell);
            let unused = keys.map_or(true, HashSet::is_empty);
            let holds_staged =
                keys.is_some_and(|keys| keys.iter().any(|(layer, _)| self.staged.contains(layer)));

            let visible: Vec<&Member> = keys
                .into_iter()
                .flatten()
                .filter(|(layer, _)| !self.staged.contains(layer))
                .filter_map(|key| self.members.get(key))
                .collect();
            let single = match visible.as_slice() {
                [member] => Some(feature_marker(member)),
                _ => None,
            };
            let rebuilt =
                (!visible.is_empty()).then(|| build_cluster(*cell, visible.iter().copied()));

            if holds_staged {
                self.dirty.insert(*cell);
            }

            match rebuilt {
                Some(cluster) => {
                    self.clusters.insert(*cell, cluster);
                }
                None => {
                    self.clusters.remove(cell);
                    if unused {
                        self.by_cell.remove(cell);
                    }
                }
            }
            match single {
                Some(marker) => {
                    self.singles.insert(*cell, marker);
                }
                None => {
                    self.singles.remove(cell);
                }
            }
        }

        trace!(cells = dirty.len(), clusters = self.clusters.len(), "Aggregate refreshed");
        dirty.len()
    }

    /// Changes the viewport zoom. Every member is re-bucketed and every cell
    /// marked dirty; call [`refresh`](Self::refresh) afterwards.
    pub fn set_zoom(&mut self, zoom: u8) {
        if zoom == self.config.zoom {
            return;
        }
        self.config.zoom = zoom;
        let cell_zoom = self.config.cell_zoom();

        self.by_cell.clear();
        self.clusters.clear();
        self.singles.clear();
        self.dirty.clear();

        for (key, member) in self.members.iter_mut() {
            member.cell = ClusterCell::containing(member.feature.representative_point(), cell_zoom);
            self.by_cell
                .entry(member.cell)
                .or_default()
                .insert(key.clone());
            self.dirty.insert(member.cell);
        }

        debug!(zoom = zoom, cells = self.dirty.len(), "Aggregate re-bucketed");
    }

    /// Current descriptors, ordered by cell.
    pub fn clusters(&self) -> impl Iterator<Item = &Cluster> {
        self.clusters.values()
    }

    /// Descriptors whose center falls inside `viewport`.
    pub fn clusters_in(&self, viewport: &BoundingBox) -> impl Iterator<Item = &Cluster> + '_ {
        let viewport = *viewport;
        self.clusters
            .values()
            .filter(move |cluster| viewport.contains(cluster.center))
    }

    /// Markers for every current descriptor, ordered by cell.
    ///
    /// Reflects the last [`refresh`](Self::refresh); members added since
    /// then do not show up.
    pub fn markers(&self) -> Vec<Marker> {
        self.clusters
            .iter()
            .map(|(cell, cluster)| {
                self.singles
                    .get(cell)
                    .cloned()
                    .unwrap_or_else(|| Marker::Cluster(cluster.clone()))
            })
            .collect()
    }

    fn remove_key(&mut self, key: &MemberKey) -> bool {
        let Some(member) = self.members.remove(key) else {
            return false;
        };
        if let Some(ids) = self.by_layer.get_mut(&key.0) {
            ids.remove(&key.1);
            if ids.is_empty() {
                self.by_layer.remove(&key.0);
            }
        }
        self.unlink_cell(&member, key.1);
        true
    }

    fn unlink_cell(&mut self, member: &Member, id: FeatureId) {
        if let Some(keys) = self.by_cell.get_mut(&member.cell) {
            keys.remove(&(member.feature.layer().to_string(), id));
        }
        self.dirty.insert(member.cell);
    }
}

fn feature_marker(member: &Member) -> Marker {
    let feature = &member.feature;
    Marker::Feature {
        id: feature.id(),
        layer: feature.layer().to_string(),
        domain: feature.domain().to_string(),
        name: feature.name().map(str::to_string),
        position: feature.representative_point(),
        neighbourhoods: member.neighbourhoods.clone(),
    }
}

fn build_cluster<'a>(cell: ClusterCell, members: impl Iterator<Item = &'a Member>) -> Cluster {
    let mut count = 0usize;
    let mut lat_sum = 0.0;
    let mut lon_sum = 0.0;
    let mut domain_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut neighbourhood_names = BTreeSet::new();

    for member in members {
        let point = member.feature.representative_point();
        count += 1;
        lat_sum += point.lat;
        lon_sum += point.lon;
        *domain_counts
            .entry(member.feature.domain().to_string())
            .or_default() += 1;
        neighbourhood_names.extend(member.neighbourhoods.iter().cloned());
    }

    let center = if count == 0 {
        cell.bounds().center()
    } else {
        Coord::new(lat_sum / count as f64, lon_sum / count as f64)
    };

    Cluster {
        cell,
        center,
        member_count: count,
        domain_counts,
        neighbourhood_names,
    }
}
