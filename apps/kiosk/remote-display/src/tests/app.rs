use crate::app::Kiosk;
use crate::error::RemoteDisplayError;

use display_core::config::DisplayConfig;
use display_core::supervisor::SupervisorState;

/// **VALUE**: A kiosk without a server address refuses to build.
///
/// **BUG THIS CATCHES**: Would catch the app starting a supervisor that can
/// never connect and retries forever.
#[test]
fn given_config_without_url_when_from_config_then_config_error() {
    // GIVEN
    let mut config = DisplayConfig::default();
    config.device.unique_id = Some("kitchen".to_string());

    // WHEN
    let result = Kiosk::from_config(&config);

    // THEN
    assert!(matches!(result, Err(RemoteDisplayError::Config { .. })));
}

#[test]
fn given_complete_config_when_from_config_then_idle_kiosk() {
    // GIVEN
    let mut config = DisplayConfig::default();
    config.server.url = Some("http://ha.local:8123".to_string());
    config.device.unique_id = Some("kitchen".to_string());

    // WHEN
    let kiosk = Kiosk::from_config(&config).expect("builds");

    // THEN
    assert_eq!(kiosk.display_id(), "kitchen");
    assert_eq!(kiosk.state(), SupervisorState::Idle);
}
