use crate::ErrorLocation;
use crate::error::model_error::ModelError;
use crate::protocol::{NAVIGATE_COMMAND, NAVIGATE_URL_COMMAND};
use crate::settings::DisplaySettings;

use std::panic::Location;
use std::time::Duration;

use serde_json::Value;

/// A subscription event decoded into something the display can act on.
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayEvent {
    /// Load an absolute URL.
    NavigateUrl { url: String },
    /// Show a dashboard card path, optionally reverting after `expire_time`.
    NavigateCard {
        path: String,
        expire_time: Option<Duration>,
    },
    /// The server pushed new settings for this display.
    SettingsChanged(DisplaySettings),
    /// Well-formed but not addressed to us; `reason` is for logs.
    Ignored { reason: String },
}

impl DisplayEvent {
    /// Decode the `event` payload of a `remote_assist_display/connect`
    /// subscription.
    ///
    /// A payload naming a known command but missing its arguments is an
    /// error. Anything unrecognised is [`DisplayEvent::Ignored`].
    #[track_caller]
    pub fn parse(event: &Value, display_id: &str) -> Result<Self, ModelError> {
        if let Some(command) = event.get("command").and_then(Value::as_str) {
            return Self::parse_command(command, event);
        }

        if let Some(result) = event.get("result") {
            if let Some(settings) = result
                .get("displays")
                .and_then(|displays| displays.get(display_id))
                .and_then(|display| display.get("settings"))
            {
                return Ok(DisplayEvent::SettingsChanged(serde_json::from_value(
                    settings.clone(),
                )?));
            }

            if let Some(settings) = result.get("settings").filter(|s| s.is_object()) {
                return Ok(DisplayEvent::SettingsChanged(serde_json::from_value(
                    settings.clone(),
                )?));
            }

            return Ok(DisplayEvent::Ignored {
                reason: String::from("result without settings for this display"),
            });
        }

        Ok(DisplayEvent::Ignored {
            reason: String::from("no command or result"),
        })
    }

    #[track_caller]
    fn parse_command(command: &str, event: &Value) -> Result<Self, ModelError> {
        match command {
            NAVIGATE_URL_COMMAND => {
                let url = required_str(event, "url", command)?;
                Ok(DisplayEvent::NavigateUrl { url })
            }
            NAVIGATE_COMMAND => {
                let path = required_str(event, "path", command)?;
                let expire_time = match event.get("expire_time") {
                    None | Some(Value::Null) => None,
                    Some(value) => Some(seconds(value)?),
                };
                Ok(DisplayEvent::NavigateCard { path, expire_time })
            }
            other => Ok(DisplayEvent::Ignored {
                reason: format!("unhandled command {other}"),
            }),
        }
    }
}

#[track_caller]
fn required_str(event: &Value, key: &str, command: &str) -> Result<String, ModelError> {
    event
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ModelError::Validation {
            message: format!("{command} event is missing '{key}'"),
            location: ErrorLocation::from(Location::caller()),
        })
}

#[track_caller]
fn seconds(value: &Value) -> Result<Duration, ModelError> {
    let secs = value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse::<f64>().ok()))
        .filter(|s| s.is_finite() && *s >= 0.0)
        .ok_or_else(|| ModelError::Validation {
            message: format!("Invalid expire_time: {value}"),
            location: ErrorLocation::from(Location::caller()),
        })?;

    Duration::try_from_secs_f64(secs).map_err(|e| ModelError::Validation {
        message: format!("Invalid expire_time {value}: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })
}
