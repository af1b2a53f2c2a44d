//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::path::PathBuf;
use std::process;

use cityscope::config::ConfigFileError;
use cityscope::extract::ExtractError;
use cityscope::source::SourceError;
use cityscope::storage::StorageError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Input file missing or not usable GeoJSON
    Input { path: PathBuf, reason: String },
    /// Failed to create the HTTP client
    Source(SourceError),
    /// Extraction failed
    Extract(ExtractError),
    /// Persisted-layer storage error
    Storage(StorageError),
    /// Failed to render output
    Output(String),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Extract(ExtractError::SourceUnavailable(_)) => {
                eprintln!();
                eprintln!("The Overpass API may be overloaded or rate limiting you.");
                eprintln!("Try again later, or point [source] overpass_url at another instance.");
            }
            CliError::Extract(ExtractError::UnknownLayer(_)) => {
                eprintln!();
                eprintln!("Run 'cityscope layers' to list available layers.");
            }
            CliError::Config(_) => {
                eprintln!();
                eprintln!("Run 'cityscope config path' to locate the configuration file.");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Input { path, reason } => {
                write!(f, "Cannot use '{}': {}", path.display(), reason)
            }
            CliError::Source(e) => write!(f, "Failed to create HTTP client: {}", e),
            CliError::Extract(e) => write!(f, "Extraction failed: {}", e),
            CliError::Storage(e) => write!(f, "Storage error: {}", e),
            CliError::Output(msg) => write!(f, "Failed to write output: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Source(e) => Some(e),
            CliError::Extract(e) => Some(e),
            CliError::Storage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<SourceError> for CliError {
    fn from(e: SourceError) -> Self {
        CliError::Source(e)
    }
}

impl From<ExtractError> for CliError {
    fn from(e: ExtractError) -> Self {
        CliError::Extract(e)
    }
}

impl From<StorageError> for CliError {
    fn from(e: StorageError) -> Self {
        CliError::Storage(e)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Output(e.to_string())
    }
}
