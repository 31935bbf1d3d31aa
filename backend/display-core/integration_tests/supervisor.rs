use crate::helpers::{Behavior, FakeServer, RecordingSurface, TEST_TOKEN, WAIT, eventually};

use display_core::error::SupervisorError;
use display_core::supervisor::SupervisorState;
use display_core::{
    ConnectionSlot, DisplayOptions, DisplaySink, ReconnectPolicy, Supervisor, SupervisorOptions,
    TokenOptions, TokenProvider,
};

use models::protocol::{CONNECT_COMMAND, REGISTER_COMMAND, SETTINGS_COMMAND, UPDATE_COMMAND};

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};

const DISPLAY_ID: &str = "kitchen";

struct Harness {
    server: FakeServer,
    surface: Arc<RecordingSurface>,
    supervisor: Supervisor,
}

fn kiosk_behavior(token: &str) -> Behavior {
    Behavior::accepting(token).with_result(
        SETTINGS_COMMAND,
        json!({ "settings": { "default_dashboard": "lovelace/kiosk", "hide_header": true } }),
    )
}

async fn harness(behavior: Behavior, stored_token: &str, heartbeat: Option<Duration>) -> Harness {
    let server = FakeServer::start(behavior).await;
    let surface = RecordingSurface::with_token(stored_token);
    let slot = ConnectionSlot::new();

    let tokens = Arc::new(TokenProvider::new(
        surface.clone(),
        TokenOptions {
            retry_limit: 3,
            retry_delay: Duration::from_millis(10),
            ..TokenOptions::default()
        },
    ));
    let display = Arc::new(DisplaySink::new(
        surface.clone(),
        DisplayOptions::new(server.base_url.clone(), DISPLAY_ID),
        slot.clone(),
    ));

    let mut options = SupervisorOptions::new(server.base_url.clone(), DISPLAY_ID, "kiosk-host");
    options.reconnect = ReconnectPolicy::Flat(Duration::from_millis(100));
    options.heartbeat_interval = heartbeat;
    options.command_timeout = Duration::from_millis(500);

    let supervisor = Supervisor::new(options, tokens, display, slot);

    Harness {
        server,
        surface,
        supervisor,
    }
}

async fn wait_for_state(supervisor: &Supervisor, wanted: SupervisorState) {
    let mut states = supervisor.watch_state();
    tokio::time::timeout(WAIT, states.wait_for(|state| *state == wanted))
        .await
        .unwrap_or_else(|_| panic!("Timed out waiting for {wanted:?}"))
        .expect("state sender alive");
}

/// **VALUE**: The whole connection sequence, end to end.
///
/// **WHY THIS MATTERS**: The server only sends events to displays that
/// registered, fetched settings and subscribed; any step out of order leaves
/// the kiosk dark.
///
/// **BUG THIS CATCHES**: Would catch a missing step, a wrong display id, or
/// the default dashboard not being loaded.
#[tokio::test]
async fn given_server_when_initialized_then_registers_navigates_and_subscribes() {
    // GIVEN
    let h = harness(kiosk_behavior(TEST_TOKEN), TEST_TOKEN, None).await;

    // WHEN
    h.supervisor.initialize().await.expect("initializes");
    wait_for_state(&h.supervisor, SupervisorState::Running).await;

    // THEN
    let register = h.server.wait_for_command(REGISTER_COMMAND).await;
    assert_eq!(register.get("display_id"), Some(&json!(DISPLAY_ID)));
    assert_eq!(register.get("hostname"), Some(&json!("kiosk-host")));

    let kinds: Vec<String> = h
        .server
        .received()
        .iter()
        .filter_map(|frame| frame.get("type").and_then(Value::as_str).map(str::to_string))
        .collect();
    assert_eq!(
        kinds,
        vec![REGISTER_COMMAND, SETTINGS_COMMAND, UPDATE_COMMAND, CONNECT_COMMAND]
    );

    let dashboard = format!("{}/lovelace/kiosk", h.server.base_url);
    assert_eq!(h.surface.loads(), vec![h.server.base_url.clone(), dashboard.clone()]);
    let update = h.server.wait_for_command(UPDATE_COMMAND).await;
    assert_eq!(
        update.pointer("/data/display/current_url"),
        Some(&json!(dashboard))
    );
    assert_eq!(h.supervisor.settings().hide_header, Some(true));
    assert!(h.supervisor.client().await.is_some());
    assert_eq!(h.supervisor.attempts(), 0);

    h.supervisor.stop().await;
}

/// **VALUE**: A navigate event shows the card, reports it, and reverts.
///
/// **BUG THIS CATCHES**: Would catch events not being routed to the display
/// or the expire time being ignored.
#[tokio::test]
async fn given_running_display_when_navigate_event_then_card_shown_then_reverted() {
    // GIVEN
    let h = harness(kiosk_behavior(TEST_TOKEN), TEST_TOKEN, None).await;
    h.supervisor.initialize().await.expect("initializes");
    wait_for_state(&h.supervisor, SupervisorState::Running).await;
    let subscription = h.server.wait_for_command(CONNECT_COMMAND).await;
    let subscription_id = subscription
        .get("id")
        .and_then(Value::as_u64)
        .expect("subscribe id");

    // WHEN
    h.server.push_event(
        subscription_id,
        json!({
            "command": "remote_assist_display/navigate",
            "path": "/lovelace/cameras",
            "expire_time": 0.2,
        }),
    );

    // THEN
    eventually("card pushed in-page", || {
        h.surface
            .scripts()
            .iter()
            .any(|script| script.contains(r#""/lovelace/cameras""#))
    })
    .await;
    let card = format!("{}/lovelace/cameras", h.server.base_url);
    eventually("card reported", || {
        h.server
            .commands_of(UPDATE_COMMAND)
            .iter()
            .any(|frame| frame.pointer("/data/display/current_url") == Some(&json!(card)))
    })
    .await;
    eventually("return to default dashboard", || h.surface.loads().len() == 3).await;
    assert_eq!(
        h.surface.loads().last(),
        Some(&format!("{}/lovelace/kiosk", h.server.base_url))
    );

    h.supervisor.stop().await;
}

#[tokio::test]
async fn given_running_display_when_navigate_url_event_then_url_loaded() {
    // GIVEN
    let h = harness(kiosk_behavior(TEST_TOKEN), TEST_TOKEN, None).await;
    h.supervisor.initialize().await.expect("initializes");
    wait_for_state(&h.supervisor, SupervisorState::Running).await;
    let subscription_id = h
        .server
        .wait_for_command(CONNECT_COMMAND)
        .await
        .get("id")
        .and_then(Value::as_u64)
        .expect("subscribe id");

    // WHEN
    h.server.push_event(
        subscription_id,
        json!({ "command": "remote_assist_display/navigate_url", "url": "https://example.com/cam" }),
    );

    // THEN
    eventually("external page loaded", || {
        h.surface.loads().last().map(String::as_str) == Some("https://example.com/cam")
    })
    .await;

    h.supervisor.stop().await;
}

/// **VALUE**: A dropped connection is re-established with the full sequence.
///
/// **BUG THIS CATCHES**: Would catch the supervisor stopping after the first
/// connection ends, or reconnecting without re-registering.
#[tokio::test]
async fn given_running_display_when_server_drops_connection_then_reconnects_and_reregisters() {
    // GIVEN
    let h = harness(kiosk_behavior(TEST_TOKEN), TEST_TOKEN, None).await;
    h.supervisor.initialize().await.expect("initializes");
    wait_for_state(&h.supervisor, SupervisorState::Running).await;
    let first = h.supervisor.client().await.expect("published");

    // WHEN
    h.server.kill_connections();

    // THEN
    eventually("second connection", || h.server.connections() == 2).await;
    eventually("second registration", || {
        h.server.commands_of(CONNECT_COMMAND).len() == 2
    })
    .await;
    wait_for_state(&h.supervisor, SupervisorState::Running).await;
    assert_eq!(h.server.commands_of(REGISTER_COMMAND).len(), 2);
    let second = h.supervisor.client().await.expect("published");
    assert!(!Arc::ptr_eq(&first, &second));
    assert!(!first.is_open());
    assert_eq!(h.server.tokens(), vec![TEST_TOKEN.to_string(); 2]);

    h.supervisor.stop().await;
}

/// **VALUE**: A rejected token is re-read from the surface before retrying.
///
/// **WHY THIS MATTERS**: The frontend refreshes its token on its own; reusing
/// the cached, expired one would fail forever.
#[tokio::test]
async fn given_expired_token_when_auth_invalid_then_refreshes_token_and_connects() {
    // GIVEN
    let h = harness(kiosk_behavior("fresh-token"), "expired-token", None).await;
    h.supervisor.initialize().await.expect("initializes");
    eventually("rejected attempt", || !h.server.tokens().is_empty()).await;

    // WHEN
    h.surface.set_token("fresh-token");

    // THEN
    wait_for_state(&h.supervisor, SupervisorState::Running).await;
    let tokens = h.server.tokens();
    assert_eq!(tokens.first().map(String::as_str), Some("expired-token"));
    assert_eq!(tokens.last().map(String::as_str), Some("fresh-token"));

    h.supervisor.stop().await;
}

/// **VALUE**: A server that stops answering pings is dropped and replaced.
///
/// **BUG THIS CATCHES**: Would catch a half-open socket keeping the display
/// "connected" to nothing.
#[tokio::test]
async fn given_heartbeat_when_pong_missing_then_reconnects() {
    // GIVEN
    let h = harness(
        kiosk_behavior(TEST_TOKEN),
        TEST_TOKEN,
        Some(Duration::from_millis(100)),
    )
    .await;
    h.supervisor.initialize().await.expect("initializes");
    wait_for_state(&h.supervisor, SupervisorState::Running).await;
    eventually("first pong", || !h.server.commands_of("ping").is_empty()).await;

    // WHEN
    h.server.update(|behavior| {
        behavior.silent.insert("ping".to_string());
    });

    // THEN
    eventually("reconnect after missed pong", || h.server.connections() >= 2).await;

    h.supervisor.stop().await;
}

/// **VALUE**: `stop` ends the loop and closes the live connection; calling
/// it again is harmless.
#[tokio::test]
async fn given_running_display_when_stopped_then_no_further_connections() {
    // GIVEN
    let h = harness(kiosk_behavior(TEST_TOKEN), TEST_TOKEN, None).await;
    h.supervisor.initialize().await.expect("initializes");
    wait_for_state(&h.supervisor, SupervisorState::Running).await;
    let client = h.supervisor.client().await.expect("published");

    // WHEN
    h.supervisor.stop().await;
    h.supervisor.stop().await;

    // THEN
    assert_eq!(h.supervisor.state(), SupervisorState::Stopped);
    assert!(h.supervisor.client().await.is_none());
    assert!(!client.is_open());
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(h.server.connections(), 1);
}

/// **VALUE**: Stopping while the connection is still being set up closes it
/// with a close frame.
///
/// **BUG THIS CATCHES**: Would catch a half-set-up client being dropped
/// mid-cycle, which cuts the socket without telling the server.
#[tokio::test]
async fn given_connection_in_setup_when_stopped_then_closed_with_close_frame() {
    // GIVEN: A server that never answers the settings request
    let h = harness(
        kiosk_behavior(TEST_TOKEN).with_silent(SETTINGS_COMMAND),
        TEST_TOKEN,
        None,
    )
    .await;
    h.supervisor.initialize().await.expect("initializes");
    h.server.wait_for_command(SETTINGS_COMMAND).await;

    // WHEN: Stopping before setup finishes
    h.supervisor.stop().await;

    // THEN: The server saw the client close the socket properly
    eventually("close frame", || h.server.close_frames() == 1).await;
    assert_eq!(h.supervisor.state(), SupervisorState::Stopped);
    assert!(h.server.commands_of(CONNECT_COMMAND).is_empty());
}

#[tokio::test]
async fn given_non_http_base_url_when_initialize_then_invalid_target() {
    // GIVEN
    let surface = RecordingSurface::with_token(TEST_TOKEN);
    let slot = ConnectionSlot::new();
    let supervisor = Supervisor::new(
        SupervisorOptions::new("ftp://ha.local", DISPLAY_ID, "kiosk-host"),
        Arc::new(TokenProvider::new(surface.clone(), TokenOptions::default())),
        Arc::new(DisplaySink::new(
            surface.clone(),
            DisplayOptions::new("ftp://ha.local", DISPLAY_ID),
            slot.clone(),
        )),
        slot,
    );

    // WHEN
    let result = supervisor.initialize().await;

    // THEN
    assert!(matches!(result, Err(SupervisorError::InvalidTarget { .. })));
    assert_eq!(supervisor.state(), SupervisorState::Idle);
    assert!(surface.loads().is_empty());
}

/// **VALUE**: Without a stored credential initialization fails instead of
/// spinning in the background.
#[tokio::test]
async fn given_no_stored_token_when_initialize_then_token_error() {
    // GIVEN
    let h = harness(kiosk_behavior(TEST_TOKEN), TEST_TOKEN, None).await;
    h.surface.log().storage.clear();

    // WHEN
    let result = h.supervisor.initialize().await;

    // THEN
    assert!(matches!(result, Err(SupervisorError::Token { .. })));
    assert_eq!(h.server.connections(), 0);
}

#[tokio::test]
async fn given_running_display_when_settings_event_changes_dashboard_then_navigates() {
    // GIVEN
    let h = harness(kiosk_behavior(TEST_TOKEN), TEST_TOKEN, None).await;
    h.supervisor.initialize().await.expect("initializes");
    wait_for_state(&h.supervisor, SupervisorState::Running).await;
    let subscription_id = h
        .server
        .wait_for_command(CONNECT_COMMAND)
        .await
        .get("id")
        .and_then(Value::as_u64)
        .expect("subscribe id");

    // WHEN
    h.server.push_event(
        subscription_id,
        json!({ "result": { "displays": { DISPLAY_ID: { "settings": { "default_dashboard": "lovelace/new" } } } } }),
    );

    // THEN
    let target = format!("{}/lovelace/new", h.server.base_url);
    eventually("new dashboard loaded", || h.surface.loads().last() == Some(&target)).await;
    assert_eq!(
        h.supervisor.settings().default_dashboard.as_deref(),
        Some("lovelace/new")
    );

    h.supervisor.stop().await;
}
