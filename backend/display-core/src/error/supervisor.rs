use crate::error::display::DisplayError;
use crate::error::token::TokenError;

use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum SupervisorError {
    #[error("Invalid Target Error: {message} {location}")]
    InvalidTarget {
        message: String,
        location: ErrorLocation,
    },

    #[error("Supervisor Token Error: {message} {location}")]
    Token {
        message: String,
        location: ErrorLocation,
    },

    #[error("Supervisor Display Error: {message} {location}")]
    Display {
        message: String,
        location: ErrorLocation,
    },
}

impl From<TokenError> for SupervisorError {
    #[track_caller]
    fn from(error: TokenError) -> Self {
        SupervisorError::Token {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<DisplayError> for SupervisorError {
    #[track_caller]
    fn from(error: DisplayError) -> Self {
        SupervisorError::Display {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<url::ParseError> for SupervisorError {
    #[track_caller]
    fn from(error: url::ParseError) -> Self {
        SupervisorError::InvalidTarget {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
