//! Default values for all configuration settings and the
//! `ConfigFile::default()` implementation.

use super::settings::*;
use crate::cluster::{DEFAULT_CELL_ZOOM_OFFSET, DEFAULT_ZOOM};
use crate::extract::{DEFAULT_BACKOFF_BASE, DEFAULT_MAX_ATTEMPTS};
use crate::source::{DEFAULT_OVERPASS_URL, DEFAULT_QUERY_TIMEOUT_SECS};
use crate::sync::{DEFAULT_CHUNK_SIZE, DEFAULT_DEBOUNCE};

/// Default log file name inside the config directory.
pub const DEFAULT_LOG_FILE_NAME: &str = "cityscope.log";

/// Deepest viewport zoom accepted from config.
pub const MAX_CONFIG_ZOOM: u8 = 22;

impl Default for ConfigFile {
    fn default() -> Self {
        let config_dir = super::file::config_directory();

        Self {
            source: SourceSettings {
                overpass_url: DEFAULT_OVERPASS_URL.to_string(),
                timeout: DEFAULT_QUERY_TIMEOUT_SECS,
                max_attempts: DEFAULT_MAX_ATTEMPTS,
                backoff_ms: DEFAULT_BACKOFF_BASE.as_millis() as u64,
            },
            sync: SyncSettings {
                chunk_size: DEFAULT_CHUNK_SIZE,
                debounce_ms: DEFAULT_DEBOUNCE.as_millis() as u64,
            },
            cluster: ClusterSettings {
                zoom: DEFAULT_ZOOM,
                cell_zoom_offset: DEFAULT_CELL_ZOOM_OFFSET,
            },
            storage: StorageSettings::default(),
            logging: LoggingSettings {
                file: config_dir.join(DEFAULT_LOG_FILE_NAME),
            },
        }
    }
}
