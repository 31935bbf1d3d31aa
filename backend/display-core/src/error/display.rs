use crate::error::surface::SurfaceError;

use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error as ThisError;
use tokio::task::JoinError;

#[derive(Debug, ThisError)]
pub enum DisplayError {
    #[error("Display Surface Error: {message} {location}")]
    Surface {
        message: String,
        location: ErrorLocation,
    },

    #[error("Display Timeout Error: {message} {location}")]
    Timeout {
        message: String,
        location: ErrorLocation,
    },

    #[error("Display Join Error: {message} {location}")]
    Join {
        message: String,
        location: ErrorLocation,
    },
}

impl From<SurfaceError> for DisplayError {
    #[track_caller]
    fn from(error: SurfaceError) -> Self {
        DisplayError::Surface {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<JoinError> for DisplayError {
    #[track_caller]
    fn from(error: JoinError) -> Self {
        DisplayError::Join {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
