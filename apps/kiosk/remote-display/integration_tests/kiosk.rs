use remote_display::app::Kiosk;
use remote_display::error::RemoteDisplayError;
use remote_display::surface::HeadlessSurface;

use display_core::config::DisplayConfig;
use display_core::{HASS_TOKENS_KEY, TokenOptions, TokenProvider};

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tempfile::TempDir;

// ============================================================================
// Integration tests for the headless surface + display-core
// ============================================================================

/// **VALUE**: The token provider reads a credential exported by the browser.
///
/// **WHY THIS MATTERS**: This is the only way the headless kiosk obtains a
/// token; the file format and the token parser have to agree.
///
/// **BUG THIS CATCHES**: Would catch the surface and parser disagreeing on
/// how the stored string is encoded.
#[tokio::test]
async fn given_exported_storage_when_token_requested_then_provider_returns_token() {
    // GIVEN: An export where hassTokens is a JSON string, as the frontend stores it
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("storage.json");
    let stored = json!({ "access_token": "kiosk-token", "expires_in": 1800 }).to_string();
    std::fs::write(&path, json!({ HASS_TOKENS_KEY: stored }).to_string()).expect("write");

    let surface = Arc::new(HeadlessSurface::new(Some(path), None));
    let provider = TokenProvider::new(surface, TokenOptions::default());

    // WHEN
    let token = provider.get_token(false).await.expect("token");

    // THEN
    assert_eq!(token.expose(), "kiosk-token");
    assert!(!format!("{token:?}").contains("kiosk-token"));
}

/// **VALUE**: Start-up fails cleanly when the browser never exported a credential.
#[tokio::test]
async fn given_no_credential_when_kiosk_started_then_core_error() {
    // GIVEN
    let dir = TempDir::new().expect("temp dir");
    let mut config = DisplayConfig::default();
    config.server.url = Some("http://127.0.0.1:9".to_string());
    config.device.unique_id = Some("kitchen".to_string());
    config.token.retry_limit = 2;
    config.token.retry_delay_ms = 10;
    config.surface.credential_file = Some(dir.path().join("absent.json").display().to_string());
    let kiosk = Kiosk::from_config(&config).expect("builds");

    // WHEN
    let result = tokio::time::timeout(Duration::from_secs(5), kiosk.start())
        .await
        .expect("gives up in time");

    // THEN
    match result {
        Err(RemoteDisplayError::Core { message, .. }) => {
            assert!(message.contains("No access token"), "{message}");
        }
        other => panic!("expected Core error, got {other:?}"),
    }
    kiosk.shutdown().await;
}

#[test]
fn given_config_surface_section_when_building_surface_then_paths_used() {
    // GIVEN
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("storage.json");
    std::fs::write(&path, r#"{"remote_assist_display_id":"kitchen"}"#).expect("write");
    let mut config = DisplayConfig::default();
    config.surface.credential_file = Some(path.display().to_string());

    // WHEN
    let surface = HeadlessSurface::from_config(&config.surface);

    // THEN
    use display_core::DisplaySurface;
    assert_eq!(
        surface
            .read_local_storage(display_core::DISPLAY_ID_KEY)
            .expect("readable"),
        Some(Value::String("kitchen".to_string()))
    );
}
