use common::ErrorLocation;

use std::io::Error as IoError;
use std::panic::Location;

use thiserror::Error as ThisError;

/// Failure reported by a [`crate::DisplaySurface`] implementation.
#[derive(Debug, ThisError)]
pub enum SurfaceError {
    #[error("Surface Unavailable Error: {message} {location}")]
    Unavailable {
        message: String,
        location: ErrorLocation,
    },

    #[error("Surface Script Error: {message} {location}")]
    Script {
        message: String,
        location: ErrorLocation,
    },

    #[error("Surface IO Error: {message} {location}")]
    Io {
        message: String,
        location: ErrorLocation,
    },
}

impl From<IoError> for SurfaceError {
    #[track_caller]
    fn from(error: IoError) -> Self {
        SurfaceError::Io {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
