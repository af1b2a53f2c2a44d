//! Layer synchronization engine.
//!
//! Keeps the materialized feature set of the selected city in step with the
//! set of layers the UI declares active. Layers are fetched concurrently,
//! merged into the [`cluster`](crate::cluster) aggregate in cooperative
//! chunks, and purged synchronously when they are switched off.
//!
//! # Components
//!
//! - [`SyncEngine`]: owns the session, fetch tasks, merge queue and aggregate.
//! - [`SyncDriver`]: consumes [`Declaration`]s, debounces layer toggles and
//!   publishes [`SyncProgress`] on a `watch` channel.
//! - [`CitySession`]: the selected city's name, boundary and neighbourhoods.
//!
//! # Example
//!
//! ```ignore
//! use cityscope::sync::{ActiveLayerSet, CitySession, SyncConfig, SyncEngine};
//!
//! let mut engine = SyncEngine::new(source, SyncConfig::default());
//! engine.select_city(Arc::new(CitySession::new("Lisbon", boundary, vec![])));
//! engine.declare(&["hospitals", "parks"].into_iter().collect::<ActiveLayerSet>());
//! engine.run_until_idle().await;
//! let markers = engine.markers();
//! ```

mod driver;
mod engine;
mod session;
mod state;

pub use driver::{
    Declaration, SyncDriver, DEFAULT_DEBOUNCE, DEFAULT_DECLARATION_CHANNEL_CAPACITY,
};
pub use engine::{FetchOutcome, SyncConfig, SyncDiff, SyncEngine, DEFAULT_CHUNK_SIZE};
pub use session::CitySession;
pub use state::{ActiveLayerSet, LayerLoadState, LoadedLayerSet, SyncProgress};
