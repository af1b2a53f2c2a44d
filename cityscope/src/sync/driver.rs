//! Reactive driver for the sync engine.
//!
//! The driver owns a [`SyncEngine`] and feeds it declarations from the UI
//! state container. City changes are applied immediately; active-layer
//! changes are debounced so a burst of toggles produces one reconciliation.
//! Progress snapshots are published on a `watch` channel after every step.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinError;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use super::engine::{FetchOutcome, SyncEngine};
use super::session::CitySession;
use super::state::{ActiveLayerSet, SyncProgress};
use crate::extract::FeatureSource;

/// Default debounce applied to active-layer changes.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);

/// Default capacity of the declaration channel.
pub const DEFAULT_DECLARATION_CHANNEL_CAPACITY: usize = 32;

/// Input from the UI state container.
#[derive(Debug, Clone)]
pub enum Declaration {
    /// A city was selected. Applied immediately.
    SelectCity(Arc<CitySession>),
    /// The active layer set changed. Debounced; only the latest set applies.
    SetActiveLayers(ActiveLayerSet),
    /// Viewport zoom changed.
    SetZoom(u8),
    /// Stop syncing and drop everything.
    Teardown,
}

/// What woke the run loop.
enum Wake {
    Shutdown,
    Declaration(Declaration),
    DebounceElapsed,
    Fetched(Result<FetchOutcome, JoinError>),
    Merge,
}

/// Runs a [`SyncEngine`] from a declaration channel.
pub struct SyncDriver<S: FeatureSource> {
    engine: SyncEngine<S>,
    debounce: Duration,
    progress_tx: watch::Sender<SyncProgress>,
    /// Most recently applied active set, re-applied after a city change.
    last_active: Option<ActiveLayerSet>,
    /// Active set waiting for the debounce deadline.
    pending_active: Option<(ActiveLayerSet, Instant)>,
}

impl<S: FeatureSource> SyncDriver<S> {
    /// Creates a driver and the receiver on which progress is published.
    pub fn new(engine: SyncEngine<S>, debounce: Duration) -> (Self, watch::Receiver<SyncProgress>) {
        let (progress_tx, progress_rx) = watch::channel(engine.progress());
        let driver = Self {
            engine,
            debounce,
            progress_tx,
            last_active: None,
            pending_active: None,
        };
        (driver, progress_rx)
    }

    /// Another receiver for progress snapshots.
    pub fn subscribe(&self) -> watch::Receiver<SyncProgress> {
        self.progress_tx.subscribe()
    }

    /// Processes declarations until the channel closes, `Teardown` arrives or
    /// `cancellation_token` fires. Returns the engine in its final state.
    pub async fn run(
        mut self,
        mut declarations: mpsc::Receiver<Declaration>,
        cancellation_token: CancellationToken,
    ) -> SyncEngine<S> {
        info!(debounce_ms = self.debounce.as_millis() as u64, "Sync driver started");

        loop {
            let debounce_deadline = self
                .pending_active
                .as_ref()
                .map(|(_, deadline)| *deadline)
                .unwrap_or_else(Instant::now);

            let wake = tokio::select! {
                biased;

                _ = cancellation_token.cancelled() => Wake::Shutdown,

                declaration = declarations.recv() => match declaration {
                    Some(declaration) => Wake::Declaration(declaration),
                    None => Wake::Shutdown,
                },

                _ = tokio::time::sleep_until(debounce_deadline), if self.pending_active.is_some() => {
                    Wake::DebounceElapsed
                }

                Some(joined) = self.engine.join_next_fetch(), if self.engine.has_in_flight() => {
                    Wake::Fetched(joined)
                }

                _ = std::future::ready(()), if self.engine.has_pending_merge() => Wake::Merge,
            };

            match wake {
                Wake::Shutdown => {
                    info!("Sync driver shutting down");
                    break;
                }
                Wake::Declaration(Declaration::Teardown) => {
                    self.engine.teardown();
                    self.last_active = None;
                    self.pending_active = None;
                    self.publish();
                    info!("Sync driver torn down");
                    break;
                }
                Wake::Declaration(declaration) => self.handle_declaration(declaration),
                Wake::DebounceElapsed => {
                    if let Some((active, _)) = self.pending_active.take() {
                        self.apply_active(active);
                    }
                }
                Wake::Fetched(joined) => {
                    self.engine.apply_outcome(joined);
                    self.publish();
                }
                Wake::Merge => {
                    self.engine.merge_next_chunk();
                    self.publish();
                    tokio::task::yield_now().await;
                }
            }
        }

        self.engine
    }

    fn handle_declaration(&mut self, declaration: Declaration) {
        match declaration {
            Declaration::SelectCity(session) => {
                self.engine.select_city(session);
                // Re-apply the latest intent, including one still debouncing.
                let active = self
                    .pending_active
                    .take()
                    .map(|(active, _)| active)
                    .or_else(|| self.last_active.clone());
                match active {
                    Some(active) => self.apply_active(active),
                    None => self.publish(),
                }
            }
            Declaration::SetActiveLayers(active) => {
                if self.debounce.is_zero() {
                    self.apply_active(active);
                } else {
                    trace!(debounce_ms = self.debounce.as_millis() as u64, "Active layers debouncing");
                    self.pending_active = Some((active, Instant::now() + self.debounce));
                }
            }
            Declaration::SetZoom(zoom) => {
                debug!(zoom = zoom, "Viewport zoom changed");
                self.engine.set_zoom(zoom);
                self.publish();
            }
            Declaration::Teardown => self.engine.teardown(),
        }
    }

    fn apply_active(&mut self, active: ActiveLayerSet) {
        self.engine.declare(&active);
        self.last_active = Some(active);
        self.publish();
    }

    fn publish(&self) {
        self.progress_tx.send_replace(self.engine.progress());
    }
}
