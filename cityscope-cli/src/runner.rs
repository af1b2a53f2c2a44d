//! CLI runner for common setup and operations.
//!
//! Encapsulates config loading, logging initialization and feature-source
//! construction to reduce duplication across command handlers.

use tracing::info;

use cityscope::config::ConfigFile;
use cityscope::extract::OverpassFeatureSource;
use cityscope::logging::{init_logging, split_log_path, LoggingGuard};
use cityscope::source::AsyncReqwestClient;
use cityscope::storage::{DirectoryLayerStore, StoredFeatureSource};

use crate::error::CliError;

/// Slack added to the per-request timeout for the HTTP client itself.
const HTTP_TIMEOUT_SLACK_SECS: u64 = 5;

/// Runner that manages CLI lifecycle and common operations.
pub struct CliRunner {
    /// Logging guard - keeps logging active while runner exists
    _logging_guard: LoggingGuard,
    /// Loaded configuration file
    config: ConfigFile,
}

impl CliRunner {
    /// Create a new CLI runner, loading config and initializing logging.
    ///
    /// # Arguments
    ///
    /// * `debug_mode` - When true, enables debug-level logging unless RUST_LOG is set
    /// * `stdout_enabled` - Mirror log lines to stdout
    pub fn new(debug_mode: bool, stdout_enabled: bool) -> Result<Self, CliError> {
        let config = ConfigFile::load()?;

        let (log_dir, log_file) = split_log_path(&config.logging.file);
        let logging_guard = init_logging(&log_dir, &log_file, stdout_enabled, debug_mode)
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            _logging_guard: logging_guard,
            config,
        })
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!("cityscope v{}", cityscope::VERSION);
        info!("cityscope CLI: {} command", command);
    }

    /// Live Overpass-backed feature source configured from `[source]`.
    pub fn overpass_source(&self) -> Result<OverpassFeatureSource<AsyncReqwestClient>, CliError> {
        let settings = &self.config.source;
        let http =
            AsyncReqwestClient::with_timeout(settings.timeout.saturating_add(HTTP_TIMEOUT_SLACK_SECS))?;
        Ok(OverpassFeatureSource::with_endpoint(
            http,
            settings.overpass_url.clone(),
            settings.request_timeout(),
        ))
    }

    /// Directory store from `[storage] directory`.
    pub fn layer_store(&self) -> Result<DirectoryLayerStore, CliError> {
        self.config
            .storage
            .directory
            .as_ref()
            .map(DirectoryLayerStore::new)
            .ok_or_else(|| {
                CliError::Config(
                    "No persisted-layer directory. Set [storage] directory in config.ini"
                        .to_string(),
                )
            })
    }

    /// Storage-backed feature source.
    pub fn stored_source(&self) -> Result<StoredFeatureSource<DirectoryLayerStore>, CliError> {
        Ok(StoredFeatureSource::new(self.layer_store()?))
    }
}
