//! `RAD_*` environment variables.

use crate::error::config::ConfigError;

use common::ErrorLocation;

use std::panic::Location;
use std::str::FromStr;

pub const URL: &str = "RAD_URL";
pub const UNIQUE_ID: &str = "RAD_UNIQUE_ID";
pub const HOSTNAME: &str = "RAD_HOSTNAME";
pub const LOG_LEVEL: &str = "RAD_LOG_LEVEL";
pub const TOKEN_RETRY_LIMIT: &str = "RAD_TOKEN_RETRY_LIMIT";
pub const DEFAULT_DASHBOARD_TIMEOUT: &str = "RAD_DEFAULT_DASHBOARD_TIMEOUT";
pub const RECONNECT_DELAY_MS: &str = "RAD_RECONNECT_DELAY_MS";
pub const CONFIG_DIR: &str = "RAD_CONFIG_DIR";
pub const CREDENTIAL_FILE: &str = "RAD_CREDENTIAL_FILE";
pub const BROWSER_COMMAND: &str = "RAD_BROWSER_COMMAND";

/// Non-empty value of `name`.
pub fn var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[track_caller]
pub(crate) fn parse<T>(variable: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::EnvOverride {
        location: ErrorLocation::from(Location::caller()),
        variable,
        value: value.to_string(),
        reason: e.to_string(),
    })
}
