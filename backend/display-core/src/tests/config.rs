use crate::config::env;
use crate::config::{DisplayConfig, ReconnectStrategy};
use crate::error::config::ConfigError;
use crate::supervisor::ReconnectPolicy;

use std::collections::HashMap;
use std::time::Duration;

use log::LevelFilter;
use serial_test::serial;
use tempfile::TempDir;

fn lookup(pairs: &[(&'static str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |name: &str| map.get(name).cloned()
}

/// **VALUE**: A fresh install starts from defaults instead of failing.
///
/// **BUG THIS CATCHES**: Would catch a missing file being reported as a read error.
#[test]
fn given_missing_file_when_load_then_defaults() {
    // GIVEN
    let dir = TempDir::new().expect("temp dir");

    // WHEN
    let config = DisplayConfig::load(dir.path()).expect("defaults");

    // THEN
    assert_eq!(config.version, 1);
    assert_eq!(config.connection.reconnect_delay_ms, 5_000);
    assert_eq!(config.connection.reconnect_strategy, ReconnectStrategy::Flat);
    assert_eq!(config.token.retry_limit, 10);
    assert_eq!(config.display.card_timeout_secs, 30);
    assert_eq!(config.log_level(), LevelFilter::Info);
}

/// **VALUE**: What was saved is what comes back, and no temp file is left.
///
/// **BUG THIS CATCHES**: Would catch the atomic rename being skipped or the
/// wrong file name being written.
#[test]
fn given_saved_config_when_load_then_values_survive() {
    // GIVEN
    let dir = TempDir::new().expect("temp dir");
    let mut config = DisplayConfig::default();
    config.server.url = Some("http://ha.local:8123".to_string());
    config.device.unique_id = Some("kitchen".to_string());
    config.connection.reconnect_strategy = ReconnectStrategy::Exponential;
    config.connection.heartbeat_interval_secs = None;

    // WHEN
    config.save(dir.path()).expect("saves");
    let loaded = DisplayConfig::load(dir.path()).expect("loads");

    // THEN
    assert_eq!(loaded.server.url.as_deref(), Some("http://ha.local:8123"));
    assert_eq!(loaded.device.unique_id.as_deref(), Some("kitchen"));
    assert_eq!(loaded.connection.reconnect_strategy, ReconnectStrategy::Exponential);
    assert_eq!(loaded.connection.heartbeat_interval_secs, None);
    assert!(!dir.path().join("config.json.tmp").exists());
}

#[test]
fn given_partial_file_when_load_then_missing_sections_default() {
    // GIVEN
    let dir = TempDir::new().expect("temp dir");
    std::fs::write(
        dir.path().join("config.json"),
        r#"{ "server": { "url": "https://ha.example.com" }, "token": { "retry_limit": 3 } }"#,
    )
    .expect("write");

    // WHEN
    let config = DisplayConfig::load(dir.path()).expect("loads");

    // THEN
    assert_eq!(config.token.retry_limit, 3);
    assert_eq!(config.token.retry_delay_ms, 1_000);
    assert_eq!(config.connection.heartbeat_interval_secs, Some(30));
}

#[test]
fn given_corrupt_file_when_load_then_parse_error() {
    // GIVEN
    let dir = TempDir::new().expect("temp dir");
    std::fs::write(dir.path().join("config.json"), "{ not json").expect("write");

    // WHEN
    let result = DisplayConfig::load(dir.path());

    // THEN
    assert!(matches!(result, Err(ConfigError::ParseError { .. })));
}

/// **VALUE**: Bad values are refused before they are written.
///
/// **BUG THIS CATCHES**: Would catch `save` persisting a config that the next
/// `load` rejects, leaving the display unable to start.
#[test]
fn given_invalid_values_when_validate_then_validation_error() {
    let mut bad_url = DisplayConfig::default();
    bad_url.server.url = Some("ha.local:8123".to_string());
    assert!(matches!(bad_url.validate(), Err(ConfigError::ValidationError { .. })));

    let mut bad_level = DisplayConfig::default();
    bad_level.logging.level = "loud".to_string();
    assert!(bad_level.validate().is_err());

    let mut bad_cap = DisplayConfig::default();
    bad_cap.connection.reconnect_strategy = ReconnectStrategy::Exponential;
    bad_cap.connection.max_reconnect_delay_ms = 10;
    assert!(bad_cap.validate().is_err());

    let dir = TempDir::new().expect("temp dir");
    assert!(bad_url.save(dir.path()).is_err());
    assert!(!dir.path().join("config.json").exists());
}

/// **VALUE**: Environment variables win over the file.
///
/// **BUG THIS CATCHES**: Would catch a variable being read but assigned to the
/// wrong field.
#[test]
fn given_overrides_when_apply_overrides_then_fields_replaced() {
    // GIVEN
    let mut config = DisplayConfig::default();
    config.server.url = Some("http://old:8123".to_string());

    // WHEN
    config
        .apply_overrides(lookup(&[
            (env::URL, "http://new:8123"),
            (env::UNIQUE_ID, "hallway"),
            (env::LOG_LEVEL, "debug"),
            (env::TOKEN_RETRY_LIMIT, "4"),
            (env::DEFAULT_DASHBOARD_TIMEOUT, "90"),
            (env::RECONNECT_DELAY_MS, "2500"),
        ]))
        .expect("applies");

    // THEN
    assert_eq!(config.server.url.as_deref(), Some("http://new:8123"));
    assert_eq!(config.device.unique_id.as_deref(), Some("hallway"));
    assert_eq!(config.log_level(), LevelFilter::Debug);
    assert_eq!(config.token.retry_limit, 4);
    assert_eq!(config.display.card_timeout_secs, 90);
    assert_eq!(config.connection.reconnect_delay_ms, 2_500);
}

#[test]
fn given_non_numeric_override_when_apply_overrides_then_env_override_error() {
    // GIVEN
    let mut config = DisplayConfig::default();

    // WHEN
    let result = config.apply_overrides(lookup(&[(env::TOKEN_RETRY_LIMIT, "lots")]));

    // THEN
    match result {
        Err(ConfigError::EnvOverride { variable, value, .. }) => {
            assert_eq!(variable, env::TOKEN_RETRY_LIMIT);
            assert_eq!(value, "lots");
        }
        other => panic!("expected EnvOverride, got {other:?}"),
    }
}

/// **VALUE**: A display gets a stable, recognisable id on first run.
///
/// **BUG THIS CATCHES**: Would catch an existing id being regenerated, which
/// registers the kiosk as a new display on every boot.
#[test]
fn given_missing_identity_when_ensure_identity_then_generated_once() {
    // GIVEN
    let mut config = DisplayConfig::default();
    config.device.hostname = Some("kiosk-7".to_string());

    // WHEN
    let first = config.ensure_identity();
    let id = config.device.unique_id.clone().expect("generated");
    let second = config.ensure_identity();

    // THEN
    assert!(first);
    assert!(!second);
    assert!(id.starts_with("remote-assist-display-"));
    assert!(id.ends_with("-kiosk-7"));
    assert_eq!(config.device.unique_id.as_deref(), Some(id.as_str()));
}

#[test]
fn given_complete_config_when_converting_then_options_carry_values() {
    // GIVEN
    let mut config = DisplayConfig::default();
    config.server.url = Some("https://ha.example.com/".to_string());
    config.device.unique_id = Some("kitchen".to_string());
    config.device.hostname = Some("kiosk".to_string());
    config.connection.reconnect_strategy = ReconnectStrategy::Exponential;
    config.display.card_timeout_secs = 45;

    // WHEN
    let supervisor = config.supervisor_options().expect("complete");
    let display = config.display_options().expect("complete");
    let token = config.token_options();

    // THEN
    assert_eq!(supervisor.base_url, "https://ha.example.com");
    assert_eq!(supervisor.display_id, "kitchen");
    assert_eq!(supervisor.hostname, "kiosk");
    assert_eq!(
        supervisor.reconnect,
        ReconnectPolicy::Exponential {
            initial: Duration::from_secs(5),
            max: Duration::from_secs(60),
        }
    );
    assert_eq!(supervisor.heartbeat_interval, Some(Duration::from_secs(30)));
    assert_eq!(display.card_timeout, Duration::from_secs(45));
    assert_eq!(display.base_url, "https://ha.example.com");
    assert_eq!(token.retry_limit, 10);
    assert_eq!(token.storage_key, "hassTokens");
}

#[test]
fn given_no_server_url_when_supervisor_options_then_validation_error() {
    let mut config = DisplayConfig::default();
    config.device.unique_id = Some("kitchen".to_string());

    assert!(matches!(
        config.supervisor_options(),
        Err(ConfigError::ValidationError { .. })
    ));
}

/// **VALUE**: `RAD_CONFIG_DIR` relocates the config, e.g. for read-only images.
///
/// **BUG THIS CATCHES**: Would catch the variable being ignored in favour of
/// the platform directory.
#[test]
#[serial]
fn given_config_dir_variable_when_config_dir_then_uses_it() {
    // GIVEN
    let dir = TempDir::new().expect("temp dir");
    // SAFETY: serialized with other environment-mutating tests.
    unsafe { std::env::set_var(env::CONFIG_DIR, dir.path()) };

    // WHEN
    let resolved = DisplayConfig::config_dir();
    unsafe { std::env::remove_var(env::CONFIG_DIR) };

    // THEN
    assert_eq!(resolved.expect("resolves"), dir.path());
}

/// **VALUE**: The effective config persists a generated id for the next boot.
#[test]
#[serial]
fn given_fresh_dir_when_load_effective_then_identity_saved() {
    // GIVEN
    let dir = TempDir::new().expect("temp dir");
    unsafe {
        std::env::set_var(env::URL, "http://ha.local:8123");
        std::env::set_var(env::HOSTNAME, "kiosk-9");
    }

    // WHEN
    let config = DisplayConfig::load_effective(dir.path());
    unsafe {
        std::env::remove_var(env::URL);
        std::env::remove_var(env::HOSTNAME);
    }

    // THEN
    let config = config.expect("loads");
    let reloaded = DisplayConfig::load(dir.path()).expect("reloads");
    assert_eq!(reloaded.device.unique_id, config.device.unique_id);
    assert_eq!(reloaded.device.hostname.as_deref(), Some("kiosk-9"));
}
