use common::ErrorLocation;

use display_core::error::SupervisorError;
use display_core::error::config::ConfigError;

use std::panic::Location;

use thiserror::Error;

/// Errors that stop the kiosk process.
#[derive(Debug, Error)]
pub enum RemoteDisplayError {
    /// Error from this App
    #[error("Remote Display Error: {message} {location}")]
    RemoteDisplay {
        message: String,
        location: ErrorLocation,
    },

    /// Configuration could not be loaded or is incomplete
    #[error("Config Error: {message} {location}")]
    Config {
        message: String,
        location: ErrorLocation,
    },

    /// The connection core refused to start
    #[error("Core Error: {message} {location}")]
    Core {
        message: String,
        location: ErrorLocation,
    },
}

impl From<ConfigError> for RemoteDisplayError {
    #[track_caller]
    fn from(error: ConfigError) -> Self {
        RemoteDisplayError::Config {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<SupervisorError> for RemoteDisplayError {
    #[track_caller]
    fn from(error: SupervisorError) -> Self {
        RemoteDisplayError::Core {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
