use crate::commands;

use models::OutboundFrame;

use serde_json::{Value, json};

/// **VALUE**: The URL report nests the URL the way the integration expects.
///
/// **BUG THIS CATCHES**: Would catch the URL being sent as a flat parameter,
/// which the server silently ignores.
#[test]
fn given_url_when_update_current_url_then_nested_under_data_display() {
    // WHEN
    let command = commands::update_current_url("kitchen", "http://ha:8123/lovelace/0")
        .expect("valid command");

    // THEN
    assert_eq!(command.kind(), "remote_assist_display/update");
    assert_eq!(command.param("display_id"), Some(&json!("kitchen")));
    assert_eq!(
        command.param("data"),
        Some(&json!({ "display": { "current_url": "http://ha:8123/lovelace/0" } }))
    );
}

#[test]
fn given_register_when_framed_then_id_type_and_params_are_top_level() {
    // GIVEN
    let command = commands::register("kitchen", "kiosk-1").expect("valid command");

    // WHEN
    let text = OutboundFrame::new(7, &command).to_json().expect("serializes");
    let frame: Value = serde_json::from_str(&text).expect("json");

    // THEN
    assert_eq!(
        frame,
        json!({
            "id": 7,
            "type": "remote_assist_display/register",
            "display_id": "kitchen",
            "hostname": "kiosk-1",
        })
    );
}

#[test]
fn given_ping_when_built_then_has_no_params() {
    let command = commands::ping().expect("valid command");
    assert_eq!(command.kind(), "ping");
    assert!(command.params().is_empty());
}
