//! Integration commands sent by the display.

use models::protocol::{
    CONNECT_COMMAND, PING_COMMAND, REGISTER_COMMAND, SETTINGS_COMMAND, UPDATE_COMMAND,
};
use models::{Command, CommandBuilder, ModelError};

use serde_json::json;

pub fn register(display_id: &str, hostname: &str) -> Result<Command, ModelError> {
    CommandBuilder::new(REGISTER_COMMAND)
        .with_param("display_id", display_id)
        .with_param("hostname", hostname)
        .build()
}

pub fn settings(display_id: &str) -> Result<Command, ModelError> {
    CommandBuilder::new(SETTINGS_COMMAND)
        .with_param("display_id", display_id)
        .build()
}

/// Report the URL currently shown.
pub fn update_current_url(display_id: &str, url: &str) -> Result<Command, ModelError> {
    CommandBuilder::new(UPDATE_COMMAND)
        .with_param("display_id", display_id)
        .with_param("data", json!({ "display": { "current_url": url } }))
        .build()
}

/// Subscription request for navigation and settings events.
pub fn connect(display_id: &str) -> Result<Command, ModelError> {
    CommandBuilder::new(CONNECT_COMMAND)
        .with_param("display_id", display_id)
        .build()
}

pub fn ping() -> Result<Command, ModelError> {
    CommandBuilder::new(PING_COMMAND).build()
}
