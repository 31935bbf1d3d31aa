//! Home Assistant WebSocket API frames.
//!
//! Every frame is a JSON text message with a top-level `type`. Before
//! authentication the server speaks `auth_required` / `auth_ok` /
//! `auth_invalid`; afterwards every frame carries a numeric `id` shared by
//! commands, their results and subscription events.

use crate::command::Command;
use crate::error::model_error::ModelError;

use std::fmt;

use const_format::concatcp;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Integration domain registered by the Home Assistant plugin.
pub const DOMAIN: &str = "remote_assist_display";

pub const REGISTER_COMMAND: &str = concatcp!(DOMAIN, "/register");
pub const SETTINGS_COMMAND: &str = concatcp!(DOMAIN, "/settings");
pub const UPDATE_COMMAND: &str = concatcp!(DOMAIN, "/update");
pub const CONNECT_COMMAND: &str = concatcp!(DOMAIN, "/connect");
pub const NAVIGATE_COMMAND: &str = concatcp!(DOMAIN, "/navigate");
pub const NAVIGATE_URL_COMMAND: &str = concatcp!(DOMAIN, "/navigate_url");

pub const UNSUBSCRIBE_COMMAND: &str = "unsubscribe_events";
pub const PING_COMMAND: &str = "ping";

const AUTH_TYPE: &str = "auth";

/// Error object attached to `result` and `auth_invalid` frames.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ServerError {
    /// Usually a string such as `unknown_command`; kept loose so a numeric
    /// code cannot make the whole frame undecodable.
    #[serde(default)]
    pub code: Option<Value>,
    #[serde(default)]
    pub message: String,
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(Value::String(code)) => write!(f, "{code}: {}", self.message),
            Some(code) => write!(f, "{code}: {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Any frame the server may send.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    AuthRequired {
        #[serde(default)]
        ha_version: Option<String>,
    },
    AuthOk {
        #[serde(default)]
        ha_version: Option<String>,
    },
    AuthInvalid {
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        error: Option<ServerError>,
    },
    Result {
        id: u64,
        #[serde(default)]
        success: bool,
        #[serde(default)]
        result: Option<Value>,
        #[serde(default)]
        error: Option<ServerError>,
    },
    Event {
        id: u64,
        #[serde(default)]
        event: Value,
    },
    Pong {
        id: u64,
    },
    #[serde(other)]
    Unknown,
}

impl InboundMessage {
    /// Decode one text frame.
    #[track_caller]
    pub fn parse(text: &str) -> Result<Self, ModelError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Wire name of the frame type, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            InboundMessage::AuthRequired { .. } => "auth_required",
            InboundMessage::AuthOk { .. } => "auth_ok",
            InboundMessage::AuthInvalid { .. } => "auth_invalid",
            InboundMessage::Result { .. } => "result",
            InboundMessage::Event { .. } => "event",
            InboundMessage::Pong { .. } => "pong",
            InboundMessage::Unknown => "unknown",
        }
    }

    /// Message id, when the frame carries one.
    pub fn id(&self) -> Option<u64> {
        match self {
            InboundMessage::Result { id, .. }
            | InboundMessage::Event { id, .. }
            | InboundMessage::Pong { id } => Some(*id),
            _ => None,
        }
    }

    /// Human readable reason for an `auth_invalid` frame.
    pub fn rejection_reason(&self) -> Option<String> {
        match self {
            InboundMessage::AuthInvalid { message, error } => Some(
                error
                    .as_ref()
                    .map(|e| e.message.clone())
                    .filter(|m| !m.is_empty())
                    .or_else(|| message.clone())
                    .unwrap_or_else(|| String::from("Unknown error")),
            ),
            _ => None,
        }
    }
}

/// `{"type":"auth","access_token":...}`
#[derive(Debug, Serialize)]
pub struct AuthFrame<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    access_token: &'a str,
}

impl<'a> AuthFrame<'a> {
    pub fn new(access_token: &'a str) -> Self {
        Self {
            kind: AUTH_TYPE,
            access_token,
        }
    }
}

/// A command stamped with its message id, as written to the socket.
#[derive(Debug, Serialize)]
pub struct OutboundFrame<'a> {
    pub id: u64,
    #[serde(flatten)]
    pub command: &'a Command,
}

impl<'a> OutboundFrame<'a> {
    pub fn new(id: u64, command: &'a Command) -> Self {
        Self { id, command }
    }

    #[track_caller]
    pub fn to_json(&self) -> Result<String, ModelError> {
        Ok(serde_json::to_string(self)?)
    }
}
