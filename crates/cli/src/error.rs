//! Error types for CLI operations.

use std::path::Path;

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Driver connection could not be established
    #[error("Failed to connect to sensor driver: {0}")]
    Connect(#[source] contracts::SensorError),

    /// A simulated session step failed
    #[error("Simulation step '{step}' failed: {source}")]
    Simulation {
        step: &'static str,
        #[source]
        source: contracts::SensorError,
    },

    /// Stream listener setup or run failed
    #[error("Stream listener failed: {message}")]
    Listener { message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn config_not_found(path: &Path) -> Self {
        Self::ConfigNotFound {
            path: path.display().to_string(),
        }
    }

    pub fn simulation(step: &'static str, source: contracts::SensorError) -> Self {
        Self::Simulation { step, source }
    }

    pub fn listener(message: impl Into<String>) -> Self {
        Self::Listener {
            message: message.into(),
        }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
