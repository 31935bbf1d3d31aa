use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error as ThisError;

/// Returned by an [`crate::EventHandler`] that could not process an event.
#[derive(Debug, ThisError)]
pub enum EventError {
    #[error("Event Rejected Error: {message} {location}")]
    Rejected {
        message: String,
        location: ErrorLocation,
    },
}

impl EventError {
    #[track_caller]
    pub fn rejected(message: impl Into<String>) -> Self {
        EventError::Rejected {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
