//! Persisted display configuration.
//!
//! `config.json` in the config directory, with `RAD_*` environment variables
//! layered on top. Missing sections fall back to defaults.

pub mod env;

use crate::display::DisplayOptions;
use crate::error::config::ConfigError;
use crate::supervisor::{ReconnectPolicy, SupervisorOptions};
use crate::token::TokenOptions;

use common::ErrorLocation;

use std::panic::Location;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{LevelFilter, info, warn};
use serde::{Deserialize, Serialize};
use sysinfo::System;
use uuid::Uuid;

const CONFIG_FILE_NAME: &str = "config.json";
const CONFIG_DIR_NAME: &str = "remote-assist-display";
const CONFIG_VERSION: u32 = 1;
const UNIQUE_ID_PREFIX: &str = "remote-assist-display";
const FALLBACK_HOSTNAME: &str = "localhost";

// ============================================
// ENUMS WITH DEFAULTS
// ============================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReconnectStrategy {
    #[default]
    Flat,
    Exponential,
}

// ============================================
// CONFIG STRUCTS
// ============================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// `http(s)://` address of Home Assistant.
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub unique_id: Option<String>,
    pub hostname: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    #[serde(default)]
    pub reconnect_strategy: ReconnectStrategy,
    #[serde(default = "default_max_reconnect_delay_ms")]
    pub max_reconnect_delay_ms: u64,
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: Option<u64>,
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
    #[serde(default = "default_handshake_timeout_secs")]
    pub handshake_timeout_secs: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_ms: default_reconnect_delay_ms(),
            reconnect_strategy: ReconnectStrategy::default(),
            max_reconnect_delay_ms: default_max_reconnect_delay_ms(),
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            command_timeout_secs: default_command_timeout_secs(),
            handshake_timeout_secs: default_handshake_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    #[serde(default = "default_token_retry_limit")]
    pub retry_limit: u32,
    #[serde(default = "default_token_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_token_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            retry_limit: default_token_retry_limit(),
            retry_delay_ms: default_token_retry_delay_ms(),
            read_timeout_ms: default_token_read_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplaySection {
    #[serde(default = "default_card_timeout_secs")]
    pub card_timeout_secs: u64,
    #[serde(default = "default_navigation_timeout_secs")]
    pub navigation_timeout_secs: u64,
}

impl Default for DisplaySection {
    fn default() -> Self {
        Self {
            card_timeout_secs: default_card_timeout_secs(),
            navigation_timeout_secs: default_navigation_timeout_secs(),
        }
    }
}

/// Where the headless surface finds the exported credential and how it
/// opens pages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SurfaceConfig {
    pub credential_file: Option<String>,
    pub browser_command: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub device: DeviceConfig,

    #[serde(default)]
    pub connection: ConnectionConfig,

    #[serde(default)]
    pub token: TokenConfig,

    #[serde(default)]
    pub display: DisplaySection,

    #[serde(default)]
    pub surface: SurfaceConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            server: ServerConfig::default(),
            device: DeviceConfig::default(),
            connection: ConnectionConfig::default(),
            token: TokenConfig::default(),
            display: DisplaySection::default(),
            surface: SurfaceConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

// ============================================
// DEFAULT FUNCTIONS
// ============================================

fn default_version() -> u32 {
    CONFIG_VERSION
}
fn default_reconnect_delay_ms() -> u64 {
    5_000
}
fn default_max_reconnect_delay_ms() -> u64 {
    60_000
}
fn default_heartbeat_interval_secs() -> Option<u64> {
    Some(30)
}
fn default_command_timeout_secs() -> u64 {
    10
}
fn default_handshake_timeout_secs() -> u64 {
    10
}
fn default_token_retry_limit() -> u32 {
    10
}
fn default_token_retry_delay_ms() -> u64 {
    1_000
}
fn default_token_read_timeout_ms() -> u64 {
    5_000
}
fn default_card_timeout_secs() -> u64 {
    30
}
fn default_navigation_timeout_secs() -> u64 {
    10
}
fn default_log_level() -> String {
    "info".to_string()
}

// ============================================
// IMPLEMENTATION
// ============================================

impl DisplayConfig {
    /// `RAD_CONFIG_DIR`, else `<config dir>/remote-assist-display`.
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        if let Some(dir) = env::var(env::CONFIG_DIR) {
            return Ok(PathBuf::from(dir));
        }

        dirs::config_dir()
            .map(|dir| dir.join(CONFIG_DIR_NAME))
            .ok_or_else(|| ConfigError::DirectoryNotFound {
                location: ErrorLocation::from(Location::caller()),
                reason: format!("No platform config directory; set {}", env::CONFIG_DIR),
            })
    }

    /// Load config from {config_dir}/config.json.
    ///
    /// # Returns
    ///
    /// Returns defaults if the file is missing.
    /// Returns `Err(ConfigError)` if the file exists but is corrupted/invalid.
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            info!(
                "Config file not found at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path).map_err(|e| {
            warn!("Failed to read config file: {}", e);
            ConfigError::ReadError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                source: e,
            }
        })?;

        let config: DisplayConfig = serde_json::from_str(&contents).map_err(|e| {
            warn!("Failed to parse config JSON: {}", e);
            ConfigError::ParseError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                reason: e.to_string(),
            }
        })?;

        config.validate()?;

        info!("Config loaded from {}", config_path.display());
        Ok(config)
    }

    /// Load, apply environment overrides, and fill in the device identity.
    ///
    /// A freshly generated identity is saved so the display keeps its id
    /// across restarts.
    pub fn load_effective(config_dir: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(config_dir)?;
        config.apply_env_overrides()?;

        if config.ensure_identity() {
            if let Err(e) = config.save(config_dir) {
                warn!("Could not persist generated display id: {}", e);
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Save config to {config_dir}/config.json using atomic write.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if:
    /// - Validation fails
    /// - Directory creation fails
    /// - Serialization fails
    /// - Write or rename fails
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        std::fs::create_dir_all(config_dir).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: config_dir.to_path_buf(),
            source: e,
        })?;

        let config_path = config_dir.join(CONFIG_FILE_NAME);
        let temp_path = config_dir.join(format!("{}.tmp", CONFIG_FILE_NAME));

        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::SerializeError {
            location: ErrorLocation::from(Location::caller()),
            reason: e.to_string(),
        })?;

        std::fs::write(&temp_path, json).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: temp_path.clone(),
            source: e,
        })?;

        // Atomic rename (POSIX guarantees atomicity)
        std::fs::rename(&temp_path, &config_path).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: config_path.clone(),
            source: e,
        })?;

        info!("Config saved to {}", config_path.display());
        Ok(())
    }

    /// Apply `RAD_*` variables from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(env::var)
    }

    /// Apply overrides from any lookup, so tests need not touch the process
    /// environment.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(env::URL) {
            self.server.url = Some(url);
        }
        if let Some(id) = lookup(env::UNIQUE_ID) {
            self.device.unique_id = Some(id);
        }
        if let Some(hostname) = lookup(env::HOSTNAME) {
            self.device.hostname = Some(hostname);
        }
        if let Some(level) = lookup(env::LOG_LEVEL) {
            self.logging.level = level;
        }
        if let Some(value) = lookup(env::TOKEN_RETRY_LIMIT) {
            self.token.retry_limit = env::parse(env::TOKEN_RETRY_LIMIT, &value)?;
        }
        if let Some(value) = lookup(env::DEFAULT_DASHBOARD_TIMEOUT) {
            self.display.card_timeout_secs = env::parse(env::DEFAULT_DASHBOARD_TIMEOUT, &value)?;
        }
        if let Some(value) = lookup(env::RECONNECT_DELAY_MS) {
            self.connection.reconnect_delay_ms = env::parse(env::RECONNECT_DELAY_MS, &value)?;
        }
        if let Some(path) = lookup(env::CREDENTIAL_FILE) {
            self.surface.credential_file = Some(path);
        }
        if let Some(command) = lookup(env::BROWSER_COMMAND) {
            self.surface.browser_command = Some(command);
        }
        Ok(())
    }

    /// Fill in hostname and display id when unset.
    ///
    /// Returns `true` if anything was generated.
    pub fn ensure_identity(&mut self) -> bool {
        let mut changed = false;

        if self.device.hostname.as_deref().is_none_or(str::is_empty) {
            let hostname = System::host_name().unwrap_or_else(|| FALLBACK_HOSTNAME.to_string());
            info!("Using hostname {}", hostname);
            self.device.hostname = Some(hostname);
            changed = true;
        }

        if self.device.unique_id.as_deref().is_none_or(str::is_empty) {
            let hostname = self.hostname();
            let id = format!("{}-{}-{}", UNIQUE_ID_PREFIX, Uuid::new_v4(), hostname);
            info!("Generated display id {}", id);
            self.device.unique_id = Some(id);
            changed = true;
        }

        changed
    }

    /// Validate config values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version == 0 || self.version > CONFIG_VERSION {
            return Err(validation(format!(
                "Invalid version: {} (expected 1-{})",
                self.version, CONFIG_VERSION
            )));
        }

        if let Some(ref url) = self.server.url {
            if url.is_empty() {
                return Err(validation("server.url cannot be empty string".to_string()));
            }

            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(validation(format!("Invalid URL format: {}", url)));
            }
        }

        if self.device.unique_id.as_deref() == Some("") {
            return Err(validation("device.unique_id cannot be empty string".to_string()));
        }

        if self.connection.reconnect_delay_ms == 0 {
            return Err(validation("connection.reconnect_delay_ms must be positive".to_string()));
        }

        if self.connection.reconnect_strategy == ReconnectStrategy::Exponential
            && self.connection.max_reconnect_delay_ms < self.connection.reconnect_delay_ms
        {
            return Err(validation(format!(
                "connection.max_reconnect_delay_ms ({}) is below reconnect_delay_ms ({})",
                self.connection.max_reconnect_delay_ms, self.connection.reconnect_delay_ms
            )));
        }

        if self.connection.heartbeat_interval_secs == Some(0) {
            return Err(validation("connection.heartbeat_interval_secs must be positive".to_string()));
        }

        if self.connection.command_timeout_secs == 0 || self.connection.handshake_timeout_secs == 0 {
            return Err(validation("connection timeouts must be positive".to_string()));
        }

        if self.token.retry_limit == 0 {
            return Err(validation("token.retry_limit must be at least 1".to_string()));
        }

        if self.display.navigation_timeout_secs == 0 {
            return Err(validation("display.navigation_timeout_secs must be positive".to_string()));
        }

        if self.logging.level.parse::<LevelFilter>().is_err() {
            return Err(validation(format!("Invalid log level: {}", self.logging.level)));
        }

        Ok(())
    }

    pub fn log_level(&self) -> LevelFilter {
        self.logging.level.parse().unwrap_or(LevelFilter::Info)
    }

    pub fn hostname(&self) -> String {
        self.device
            .hostname
            .clone()
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| FALLBACK_HOSTNAME.to_string())
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] without `server.url`.
    pub fn base_url(&self) -> Result<String, ConfigError> {
        self.server
            .url
            .as_deref()
            .map(|url| url.trim_end_matches('/').to_string())
            .ok_or_else(|| validation(format!("server.url is required (or set {})", env::URL)))
    }

    pub fn display_id(&self) -> Result<String, ConfigError> {
        self.device
            .unique_id
            .clone()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| validation(format!("device.unique_id is required (or set {})", env::UNIQUE_ID)))
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        let initial = Duration::from_millis(self.connection.reconnect_delay_ms);
        match self.connection.reconnect_strategy {
            ReconnectStrategy::Flat => ReconnectPolicy::Flat(initial),
            ReconnectStrategy::Exponential => ReconnectPolicy::Exponential {
                initial,
                max: Duration::from_millis(self.connection.max_reconnect_delay_ms),
            },
        }
    }

    pub fn supervisor_options(&self) -> Result<SupervisorOptions, ConfigError> {
        Ok(SupervisorOptions {
            base_url: self.base_url()?,
            display_id: self.display_id()?,
            hostname: self.hostname(),
            reconnect: self.reconnect_policy(),
            heartbeat_interval: self.connection.heartbeat_interval_secs.map(Duration::from_secs),
            command_timeout: Duration::from_secs(self.connection.command_timeout_secs),
            handshake_timeout: Duration::from_secs(self.connection.handshake_timeout_secs),
        })
    }

    pub fn token_options(&self) -> TokenOptions {
        TokenOptions {
            retry_limit: self.token.retry_limit,
            retry_delay: Duration::from_millis(self.token.retry_delay_ms),
            read_timeout: Duration::from_millis(self.token.read_timeout_ms),
            ..TokenOptions::default()
        }
    }

    pub fn display_options(&self) -> Result<DisplayOptions, ConfigError> {
        let mut options = DisplayOptions::new(self.base_url()?, self.display_id()?);
        options.card_timeout = Duration::from_secs(self.display.card_timeout_secs);
        options.navigation_timeout = Duration::from_secs(self.display.navigation_timeout_secs);
        Ok(options)
    }
}

#[track_caller]
fn validation(reason: String) -> ConfigError {
    ConfigError::ValidationError {
        location: ErrorLocation::from(Location::caller()),
        reason,
    }
}
