use common::ErrorLocation;
use models::ModelError;

use std::panic::Location;

use thiserror::Error as ThisError;
use tokio_tungstenite::tungstenite::Error as WsError;

#[derive(Debug, ThisError)]
pub enum TransportError {
    #[error("Authentication Failed Error: {message} {location}")]
    AuthenticationFailed {
        message: String,
        location: ErrorLocation,
    },

    /// The server answered `success: false`.
    #[error("Command Error: {message} {location}")]
    Command {
        message: String,
        code: Option<String>,
        location: ErrorLocation,
    },

    #[error("Connection Closed Error: {message} {location}")]
    ConnectionClosed {
        message: String,
        location: ErrorLocation,
    },

    #[error("Transport Error: {message} {location}")]
    Transport {
        message: String,
        location: ErrorLocation,
    },

    #[error("Protocol Error: {message} {location}")]
    Protocol {
        message: String,
        location: ErrorLocation,
    },

    #[error("Invalid State Error: {message} {location}")]
    InvalidState {
        message: String,
        location: ErrorLocation,
    },
}

impl TransportError {
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, TransportError::AuthenticationFailed { .. })
    }

    pub fn is_connection_closed(&self) -> bool {
        matches!(self, TransportError::ConnectionClosed { .. })
    }

    #[track_caller]
    pub(crate) fn closed() -> Self {
        TransportError::ConnectionClosed {
            message: String::from("Connection closed"),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<WsError> for TransportError {
    #[track_caller]
    fn from(error: WsError) -> Self {
        let location = ErrorLocation::from(Location::caller());
        let message = error.to_string();
        match error {
            WsError::ConnectionClosed | WsError::AlreadyClosed => {
                TransportError::ConnectionClosed { message, location }
            }
            _ => TransportError::Transport { message, location },
        }
    }
}

impl From<ModelError> for TransportError {
    #[track_caller]
    fn from(error: ModelError) -> Self {
        TransportError::Protocol {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
