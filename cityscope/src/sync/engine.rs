//! Layer synchronization engine.
//!
//! The engine reconciles the declared [`ActiveLayerSet`] against what it has
//! materialized for the selected city:
//!
//! ```text
//! declare(active)
//!   ├── removed layers ──► cancel fetch, drop pending merge, purge, refresh
//!   └── added layers   ──► spawn fetch (ticket + child token) into JoinSet
//!                               │
//! join_next_fetch() ◄───────────┘
//!   └── apply_outcome() ──► stale ticket? discard
//!                           ok ──► pending merge queue
//!                           err ─► Failed / loaded-empty
//! merge_next_chunk() ──► add chunk_size features; last chunk ──► Loaded + refresh
//! ```
//!
//! All mutation goes through `&mut self`, so the owning task is the only
//! writer and no locks are involved.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::Arc;
use std::vec;

use tokio::task::{Id, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::session::CitySession;
use super::state::{ActiveLayerSet, LayerLoadState, LoadedLayerSet, SyncProgress};
use crate::cluster::{Cluster, ClusterAggregator, ClusterConfig, Marker};
use crate::extract::{ExtractError, ExtractRequest, Feature, FeatureSource, RetryPolicy};

/// Default number of features merged per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 50;

/// Engine tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncConfig {
    /// Features merged into the aggregate per cooperative step.
    pub chunk_size: usize,
    /// Retry policy applied to every extraction.
    pub retry: RetryPolicy,
    /// Clustering grid parameters.
    pub cluster: ClusterConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            retry: RetryPolicy::default(),
            cluster: ClusterConfig::default(),
        }
    }
}

/// Layers added and removed by one declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncDiff {
    pub added: BTreeSet<String>,
    pub removed: BTreeSet<String>,
}

impl SyncDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Result of one fetch task.
#[derive(Debug)]
pub struct FetchOutcome {
    layer: String,
    ticket: u64,
    /// `None` when the fetch was cancelled before finishing.
    result: Option<Result<Vec<Feature>, ExtractError>>,
}

impl FetchOutcome {
    pub fn layer(&self) -> &str {
        &self.layer
    }
}

struct InFlight {
    ticket: u64,
    task: Id,
    token: CancellationToken,
}

struct PendingMerge {
    layer: String,
    features: vec::IntoIter<Feature>,
    merged: usize,
    total: usize,
}

/// Incremental feature synchronization for one selected city at a time.
pub struct SyncEngine<S: FeatureSource> {
    source: Arc<S>,
    config: SyncConfig,
    session: Option<Arc<CitySession>>,
    session_token: CancellationToken,
    fetches: JoinSet<FetchOutcome>,
    in_flight: HashMap<String, InFlight>,
    pending: VecDeque<PendingMerge>,
    states: BTreeMap<String, LayerLoadState>,
    loaded: LoadedLayerSet,
    aggregator: ClusterAggregator,
    next_ticket: u64,
}

impl<S: FeatureSource> SyncEngine<S> {
    pub fn new(source: S, config: SyncConfig) -> Self {
        Self::with_shared_source(Arc::new(source), config)
    }

    pub fn with_shared_source(source: Arc<S>, config: SyncConfig) -> Self {
        Self {
            source,
            config,
            session: None,
            session_token: CancellationToken::new(),
            fetches: JoinSet::new(),
            in_flight: HashMap::new(),
            pending: VecDeque::new(),
            states: BTreeMap::new(),
            loaded: LoadedLayerSet::new(),
            aggregator: ClusterAggregator::new(config.cluster),
            next_ticket: 0,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn session(&self) -> Option<&Arc<CitySession>> {
        self.session.as_ref()
    }

    /// Makes `session` the selected city.
    ///
    /// Every fetch of the previous city is cancelled and everything it
    /// materialized is dropped before this returns.
    pub fn select_city(&mut self, session: Arc<CitySession>) {
        self.reset();
        self.aggregator.reset(Arc::clone(session.neighbourhoods()));
        info!(
            city = session.name(),
            neighbourhoods = session.neighbourhoods().len(),
            "City selected"
        );
        self.session = Some(session);
    }

    /// Cancels all work and returns to idle with no city selected.
    pub fn teardown(&mut self) {
        self.reset();
        if let Some(session) = self.session.take() {
            info!(city = session.name(), "Sync session torn down");
        }
    }

    /// Reconciles tracked layers against `active`.
    ///
    /// Removals are applied before this returns. Additions spawn fetches
    /// whose results arrive through [`join_next_fetch`](Self::join_next_fetch).
    /// Declaring the same set twice is a no-op.
    pub fn declare(&mut self, active: &ActiveLayerSet) -> SyncDiff {
        let Some(session) = self.session.clone() else {
            debug!("Active layers declared with no city selected");
            return SyncDiff::default();
        };

        let wanted = active.enabled();
        let tracked = self.tracked_layers();

        let diff = SyncDiff {
            added: wanted.difference(&tracked).cloned().collect(),
            removed: tracked.difference(&wanted).cloned().collect(),
        };

        // Failed layers are not tracked; forget those no longer wanted.
        self.states.retain(|layer, state| {
            wanted.contains(layer) || !matches!(state, LayerLoadState::Failed { .. })
        });

        if !diff.removed.is_empty() {
            let purged: usize = diff.removed.iter().map(|layer| self.remove_layer(layer)).sum();
            self.aggregator.refresh();
            debug!(
                city = session.name(),
                layers = ?diff.removed,
                purged = purged,
                "Layers removed"
            );
        }

        for layer in &diff.added {
            self.spawn_fetch(&session, layer);
        }

        if !diff.is_empty() {
            debug!(
                city = session.name(),
                added = ?diff.added,
                removed = ?diff.removed,
                in_flight = self.in_flight.len(),
                "Active layers reconciled"
            );
        }

        diff
    }

    /// True while any fetch task is running.
    pub fn has_in_flight(&self) -> bool {
        !self.fetches.is_empty()
    }

    /// True while fetched features are waiting to be merged.
    pub fn has_pending_merge(&self) -> bool {
        !self.pending.is_empty()
    }

    /// True when there is nothing left to fetch or merge.
    pub fn is_idle(&self) -> bool {
        !self.has_in_flight() && !self.has_pending_merge()
    }

    /// Waits for the next fetch task to finish.
    ///
    /// Cancel safe. Returns `None` when no task is running.
    pub async fn join_next_fetch(&mut self) -> Option<Result<FetchOutcome, JoinError>> {
        self.fetches.join_next().await
    }

    /// Applies a finished fetch. Results for a layer that was removed,
    /// re-added or belongs to a previous city are discarded.
    pub fn apply_outcome(&mut self, joined: Result<FetchOutcome, JoinError>) {
        let outcome = match joined {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => {
                trace!(task = %e.id(), "Fetch task aborted");
                return;
            }
            Err(e) => {
                let task = e.id();
                let layer = self
                    .in_flight
                    .iter()
                    .find(|(_, fetch)| fetch.task == task)
                    .map(|(layer, _)| layer.clone());
                warn!(task = %task, layer = ?layer, error = %e, "Fetch task panicked");
                if let Some(layer) = layer {
                    self.in_flight.remove(&layer);
                    self.states.insert(
                        layer,
                        LayerLoadState::Failed {
                            error: "fetch task panicked".to_string(),
                        },
                    );
                }
                return;
            }
        };

        let current = self.in_flight.get(&outcome.layer).map(|fetch| fetch.ticket);
        if current != Some(outcome.ticket) {
            debug!(
                layer = %outcome.layer,
                ticket = outcome.ticket,
                "Discarding stale fetch result"
            );
            return;
        }
        self.in_flight.remove(&outcome.layer);

        let city = self.city_name().unwrap_or_default().to_string();
        let layer = outcome.layer;

        match outcome.result {
            None => {
                self.states.remove(&layer);
            }
            Some(Ok(features)) if features.is_empty() => {
                info!(city = %city, layer = %layer, features = 0, "Layer loaded");
                self.mark_loaded(layer, 0);
            }
            Some(Ok(features)) => {
                let total = features.len();
                debug!(city = %city, layer = %layer, features = total, "Layer fetched, merging");
                self.aggregator.stage_layer(&layer);
                self.states
                    .insert(layer.clone(), LayerLoadState::Merging { merged: 0, total });
                self.pending.push_back(PendingMerge {
                    layer,
                    features: features.into_iter(),
                    merged: 0,
                    total,
                });
            }
            Some(Err(ExtractError::EmptyBoundary)) => {
                warn!(city = %city, layer = %layer, "City boundary is empty, layer loaded with no features");
                self.mark_loaded(layer, 0);
            }
            Some(Err(e)) => {
                warn!(city = %city, layer = %layer, error = %e, "Layer failed");
                self.states
                    .insert(layer, LayerLoadState::Failed { error: e.to_string() });
            }
        }
    }

    /// Merges up to `chunk_size` features of the oldest pending layer.
    ///
    /// Merged chunks stay staged in the aggregator, out of clusters and
    /// markers. After a layer's last chunk it is marked loaded, committed
    /// and the aggregate is refreshed. Returns false when nothing was pending.
    pub fn merge_next_chunk(&mut self) -> bool {
        let chunk_size = self.config.chunk_size.max(1);
        let Some(pending) = self.pending.front_mut() else {
            return false;
        };

        let chunk: Vec<Feature> = pending.features.by_ref().take(chunk_size).collect();
        pending.merged += chunk.len();
        let (layer, merged, total) = (pending.layer.clone(), pending.merged, pending.total);
        self.aggregator.add(chunk);

        if merged < total {
            trace!(layer = %layer, merged = merged, total = total, "Merged chunk");
            self.states
                .insert(layer, LayerLoadState::Merging { merged, total });
            return true;
        }

        self.pending.pop_front();
        self.mark_loaded(layer.clone(), total);
        self.aggregator.commit_layer(&layer);
        self.aggregator.refresh();
        info!(
            city = self.city_name().unwrap_or_default(),
            layer = %layer,
            features = total,
            clusters = self.aggregator.clusters().count(),
            "Layer loaded"
        );
        true
    }

    /// Drives fetches and merges until nothing is outstanding.
    pub async fn run_until_idle(&mut self) {
        loop {
            if self.merge_next_chunk() {
                tokio::task::yield_now().await;
                continue;
            }
            match self.join_next_fetch().await {
                Some(joined) => self.apply_outcome(joined),
                None => break,
            }
        }
    }

    /// Changes the viewport zoom and rebuilds the aggregate.
    pub fn set_zoom(&mut self, zoom: u8) {
        self.aggregator.set_zoom(zoom);
        self.aggregator.refresh();
    }

    pub fn progress(&self) -> SyncProgress {
        SyncProgress {
            city: self.city_name().map(str::to_string),
            materialized_feature_count: self.aggregator.len(),
            layers: self.states.clone(),
        }
    }

    pub fn layer_state(&self, layer: &str) -> Option<&LayerLoadState> {
        self.states.get(layer)
    }

    pub fn loaded_layers(&self) -> &LoadedLayerSet {
        &self.loaded
    }

    pub fn markers(&self) -> Vec<Marker> {
        self.aggregator.markers()
    }

    pub fn clusters(&self) -> impl Iterator<Item = &Cluster> {
        self.aggregator.clusters()
    }

    pub fn aggregator(&self) -> &ClusterAggregator {
        &self.aggregator
    }

    fn city_name(&self) -> Option<&str> {
        self.session.as_deref().map(CitySession::name)
    }

    /// Layers currently loaded, being fetched, or being merged.
    fn tracked_layers(&self) -> BTreeSet<String> {
        self.loaded
            .iter()
            .chain(self.in_flight.keys())
            .chain(self.pending.iter().map(|p| &p.layer))
            .cloned()
            .collect()
    }

    fn spawn_fetch(&mut self, session: &CitySession, layer: &str) {
        let ticket = self.next_ticket;
        self.next_ticket += 1;

        let token = self.session_token.child_token();
        let task_token = token.clone();
        let source = Arc::clone(&self.source);
        let retry = self.config.retry;
        let request = ExtractRequest::new(session.name(), Arc::clone(session.boundary()), layer);

        let handle = self.fetches.spawn(async move {
            let result = tokio::select! {
                biased;
                _ = task_token.cancelled() => None,
                result = retry.retry(&request.layer, || source.extract_features(&request)) => Some(result),
            };
            FetchOutcome {
                layer: request.layer,
                ticket,
                result,
            }
        });

        trace!(
            city = session.name(),
            layer = layer,
            ticket = ticket,
            source = self.source.name(),
            "Fetch spawned"
        );
        self.in_flight.insert(
            layer.to_string(),
            InFlight {
                ticket,
                task: handle.id(),
                token,
            },
        );
        self.states.insert(layer.to_string(), LayerLoadState::Fetching);
    }

    /// Drops every trace of `layer`. Returns the number of purged features.
    fn remove_layer(&mut self, layer: &str) -> usize {
        if let Some(fetch) = self.in_flight.remove(layer) {
            fetch.token.cancel();
        }
        self.pending.retain(|pending| pending.layer != layer);
        self.loaded.remove(layer);
        self.states.remove(layer);
        self.aggregator.remove_layer(layer)
    }

    fn mark_loaded(&mut self, layer: String, features: usize) {
        self.loaded.insert(layer.clone());
        self.states.insert(layer, LayerLoadState::Loaded { features });
    }

    fn reset(&mut self) {
        self.session_token.cancel();
        self.session_token = CancellationToken::new();
        self.fetches.abort_all();
        self.fetches = JoinSet::new();
        self.in_flight.clear();
        self.pending.clear();
        self.states.clear();
        self.loaded.clear();
        self.aggregator.clear();
    }
}

impl<S: FeatureSource> Drop for SyncEngine<S> {
    fn drop(&mut self) {
        self.session_token.cancel();
    }
}
