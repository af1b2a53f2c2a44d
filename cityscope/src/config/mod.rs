//! User configuration.
//!
//! Settings are read from `~/.cityscope/config.ini`; a missing file yields
//! defaults. [`ConfigFile::sync_config`] turns the file into the engine's
//! [`SyncConfig`](crate::sync::SyncConfig).
//!
//! ```
//! use cityscope::config::ConfigFile;
//!
//! let config = ConfigFile::default();
//! assert_eq!(config.sync_config().chunk_size, 50);
//! ```

mod defaults;
mod file;
mod parser;
mod settings;
mod writer;

pub use defaults::{DEFAULT_LOG_FILE_NAME, MAX_CONFIG_ZOOM};
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{
    ClusterSettings, ConfigFile, LoggingSettings, SourceSettings, StorageSettings, SyncSettings,
};
