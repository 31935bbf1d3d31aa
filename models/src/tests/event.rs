use crate::{DisplayEvent, ModelError};

use std::time::Duration;

use serde_json::json;

#[test]
fn given_navigate_url_event_when_parsing_then_returns_url() {
    let event = json!({"command": "remote_assist_display/navigate_url", "url": "http://x/y"});

    let parsed = DisplayEvent::parse(&event, "kitchen").unwrap();

    assert_eq!(
        parsed,
        DisplayEvent::NavigateUrl {
            url: String::from("http://x/y")
        }
    );
}

/// **VALUE**: Verifies card navigation keeps the path and the optional expiry.
///
/// **WHY THIS MATTERS**: The expiry decides when the display returns to its
/// dashboard. Dropping it falls back to the configured timeout silently.
#[test]
fn given_navigate_event_with_expire_time_when_parsing_then_duration_is_set() {
    // GIVEN: A navigate event with fractional expiry
    let event = json!({
        "command": "remote_assist_display/navigate",
        "path": "/lovelace/cameras",
        "expire_time": 2.5
    });

    // WHEN: Parsing
    let parsed = DisplayEvent::parse(&event, "kitchen").unwrap();

    // THEN: Path and expiry survive untouched
    assert_eq!(
        parsed,
        DisplayEvent::NavigateCard {
            path: String::from("/lovelace/cameras"),
            expire_time: Some(Duration::from_millis(2500)),
        }
    );
}

#[test]
fn given_navigate_event_without_expire_time_when_parsing_then_expiry_is_none() {
    let event = json!({"command": "remote_assist_display/navigate", "path": "lovelace"});

    match DisplayEvent::parse(&event, "kitchen").unwrap() {
        DisplayEvent::NavigateCard { expire_time, .. } => assert_eq!(expire_time, None),
        other => panic!("expected card navigation, got {other:?}"),
    }
}

/// **VALUE**: Verifies that malformed navigation commands are errors, not no-ops.
///
/// **BUG THIS CATCHES**: Would catch a parser that navigates to an empty path
/// (the bare server root) when `path` or `url` is missing.
#[test]
fn given_navigate_without_target_when_parsing_then_returns_validation_error() {
    let missing_path = json!({"command": "remote_assist_display/navigate"});
    let missing_url = json!({"command": "remote_assist_display/navigate_url", "url": ""});
    let bad_expiry = json!({
        "command": "remote_assist_display/navigate",
        "path": "x",
        "expire_time": -1
    });

    for event in [missing_path, missing_url, bad_expiry] {
        assert!(
            matches!(
                DisplayEvent::parse(&event, "kitchen"),
                Err(ModelError::Validation { .. })
            ),
            "expected validation error for {event}"
        );
    }
}

/// **VALUE**: Verifies settings pushed per display reach only that display.
///
/// **WHY THIS MATTERS**: The server broadcasts the whole displays map; applying
/// another display's dashboard would hijack this screen.
#[test]
fn given_settings_for_displays_map_when_parsing_then_picks_own_entry() {
    // GIVEN: Settings for two displays
    let event = json!({"result": {"displays": {
        "kitchen": {"settings": {"default_dashboard": "lovelace/kitchen"}},
        "hall": {"settings": {"default_dashboard": "lovelace/hall"}}
    }}});

    // WHEN: Parsing as "hall"
    let parsed = DisplayEvent::parse(&event, "hall").unwrap();

    // THEN: Only hall's settings are returned
    match parsed {
        DisplayEvent::SettingsChanged(settings) => {
            assert_eq!(settings.default_dashboard.as_deref(), Some("lovelace/hall"));
        }
        other => panic!("expected settings, got {other:?}"),
    }

    // AND: An unknown display is ignored
    assert!(matches!(
        DisplayEvent::parse(&event, "garage").unwrap(),
        DisplayEvent::Ignored { .. }
    ));
}

#[test]
fn given_flat_settings_result_when_parsing_then_returns_settings() {
    let event = json!({"result": {"settings": {"hide_sidebar": true}}});

    match DisplayEvent::parse(&event, "kitchen").unwrap() {
        DisplayEvent::SettingsChanged(settings) => assert_eq!(settings.hide_sidebar, Some(true)),
        other => panic!("expected settings, got {other:?}"),
    }
}

#[test]
fn given_unrelated_payload_when_parsing_then_ignored() {
    let unknown_command = json!({"command": "remote_assist_display/reboot"});
    let empty = json!({});

    assert!(matches!(
        DisplayEvent::parse(&unknown_command, "kitchen").unwrap(),
        DisplayEvent::Ignored { .. }
    ));
    assert!(matches!(
        DisplayEvent::parse(&empty, "kitchen").unwrap(),
        DisplayEvent::Ignored { .. }
    ));
}

/// **VALUE**: Verifies an expiry too large for a `Duration` is rejected.
///
/// **BUG THIS CATCHES**: Would catch `Duration::from_secs_f64` panicking on a
/// finite but out-of-range value sent by the server.
#[test]
fn given_huge_expire_time_when_parsing_then_validation_error() {
    // GIVEN: A navigate event whose expiry overflows a Duration
    let event = json!({
        "command": "remote_assist_display/navigate",
        "path": "x",
        "expire_time": 1e20
    });

    // WHEN: Parsing
    let result = DisplayEvent::parse(&event, "kitchen");

    // THEN: A validation error, not a panic
    assert!(
        matches!(result, Err(ModelError::Validation { .. })),
        "expected validation error, got {result:?}"
    );
}
