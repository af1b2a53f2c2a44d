//! INI serialization logic for converting `ConfigFile` → INI string.
//!
//! Produces the commented INI representation written to `config.ini`.

use std::path::Path;

use super::settings::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let storage_dir = config
        .storage
        .directory
        .as_ref()
        .map(|p| path_to_string(p))
        .unwrap_or_default();

    format!(
        r#"[source]
; Overpass API interpreter used for live extraction
overpass_url = {}
; Timeout for each request attempt, in seconds (default: 60)
timeout = {}
; Attempts per layer before it is reported as failed (default: 3)
max_attempts = {}
; Delay before the first retry, doubled on each further retry (default: 500)
backoff_ms = {}

[sync]
; Features merged into the map per step (default: 50)
chunk_size = {}
; Quiet period after a layer toggle before syncing, in ms (default: 250)
debounce_ms = {}

[cluster]
; Viewport zoom level (default: 13)
zoom = {}
; Clusters are grid cells at zoom + cell_zoom_offset (default: 2)
cell_zoom_offset = {}

[storage]
; Directory of persisted layers (<directory>/<city>/<layer>.json)
; If empty, layers are always extracted live
directory = {}

[logging]
; Log file path (cleared at the start of each session)
file = {}
"#,
        config.source.overpass_url,
        config.source.timeout,
        config.source.max_attempts,
        config.source.backoff_ms,
        config.sync.chunk_size,
        config.sync.debounce_ms,
        config.cluster.zoom,
        config.cluster.cell_zoom_offset,
        storage_dir,
        path_to_string(&config.logging.file),
    )
}

/// Render a path for the config file, abbreviating the home directory.
fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}
