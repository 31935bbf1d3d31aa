use crate::ErrorLocation;
use crate::error::model_error::ModelError;

use std::panic::Location;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Settings the server declares for this display.
///
/// Every field is optional; the server only sends what the user configured.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplaySettings {
    #[serde(default)]
    pub default_dashboard: Option<String>,
    #[serde(default)]
    pub display_id: Option<String>,
    #[serde(default)]
    pub hide_header: Option<bool>,
    #[serde(default)]
    pub hide_sidebar: Option<bool>,
}

impl DisplaySettings {
    /// Read settings from a `remote_assist_display/settings` result.
    ///
    /// Accepts `{"settings": {...}}` as well as the bare object.
    #[track_caller]
    pub fn from_settings_response(response: &Value) -> Result<Self, ModelError> {
        let object = match response.get("settings") {
            Some(inner) if inner.is_object() => inner,
            Some(Value::Null) | None if response.is_object() => response,
            Some(Value::Null) | None if response.is_null() => return Ok(Self::default()),
            _ => {
                return Err(ModelError::Decode {
                    message: format!("Settings response is not an object: {response}"),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
        };

        Ok(serde_json::from_value(object.clone())?)
    }

    /// Overlay the fields present in `update`.
    pub fn merge(&mut self, update: DisplaySettings) {
        if update.default_dashboard.is_some() {
            self.default_dashboard = update.default_dashboard;
        }
        if update.display_id.is_some() {
            self.display_id = update.display_id;
        }
        if update.hide_header.is_some() {
            self.hide_header = update.hide_header;
        }
        if update.hide_sidebar.is_some() {
            self.hide_sidebar = update.hide_sidebar;
        }
    }

    /// Absolute URL of the default dashboard, or `base_url` when none is set.
    pub fn dashboard_url(&self, base_url: &str) -> String {
        join_url(base_url, self.default_dashboard.as_deref().unwrap_or(""))
    }
}

/// Join a base URL and a path without doubling or dropping the slash.
pub fn join_url(base_url: &str, path: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let path = path.trim_start_matches('/');

    if path.is_empty() {
        return base.to_string();
    }

    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }

    format!("{base}/{path}")
}
