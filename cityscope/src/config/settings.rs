//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.

use std::path::PathBuf;
use std::time::Duration;

use crate::cluster::ClusterConfig;
use crate::extract::RetryPolicy;
use crate::sync::SyncConfig;

/// Complete application configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    pub source: SourceSettings,
    pub sync: SyncSettings,
    pub cluster: ClusterSettings,
    pub storage: StorageSettings,
    pub logging: LoggingSettings,
}

/// Map-data source (`[source]`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSettings {
    /// Overpass interpreter endpoint
    pub overpass_url: String,
    /// Per-attempt timeout in seconds
    pub timeout: u64,
    /// Attempts per extraction, first try included
    pub max_attempts: u32,
    /// Backoff before the first retry, in milliseconds
    pub backoff_ms: u64,
}

impl SourceSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.backoff_ms))
    }
}

/// Sync engine (`[sync]`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Features merged per cooperative step
    pub chunk_size: usize,
    /// Debounce for active-layer changes, in milliseconds
    pub debounce_ms: u64,
}

impl SyncSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Clustering grid (`[cluster]`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterSettings {
    pub zoom: u8,
    pub cell_zoom_offset: u8,
}

impl From<&ClusterSettings> for ClusterConfig {
    fn from(settings: &ClusterSettings) -> Self {
        ClusterConfig {
            zoom: settings.zoom,
            cell_zoom_offset: settings.cell_zoom_offset,
        }
    }
}

/// Persisted layers (`[storage]`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StorageSettings {
    /// Root of the persisted-layer directory, if any
    pub directory: Option<PathBuf>,
}

/// Logging (`[logging]`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Log file path
    pub file: PathBuf,
}

impl ConfigFile {
    /// Engine configuration assembled from `[source]`, `[sync]` and `[cluster]`.
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            chunk_size: self.sync.chunk_size,
            retry: self.source.retry_policy(),
            cluster: ClusterConfig::from(&self.cluster),
        }
    }
}
