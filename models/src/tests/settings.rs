use crate::DisplaySettings;
use crate::settings::join_url;

use serde_json::json;

/// **VALUE**: Verifies both settings response shapes decode.
///
/// **WHY THIS MATTERS**: The settings command wraps its payload in `settings`
/// while pushed updates send the bare object. Supporting only one would leave
/// the default dashboard unset after half the updates.
#[test]
fn given_wrapped_and_flat_settings_when_decoding_then_both_succeed() {
    // GIVEN: The same settings in both shapes
    let wrapped = json!({"settings": {"default_dashboard": "lovelace/0", "hide_header": true}});
    let flat = json!({"default_dashboard": "lovelace/0", "hide_header": true});

    // WHEN: Decoding
    let a = DisplaySettings::from_settings_response(&wrapped).unwrap();
    let b = DisplaySettings::from_settings_response(&flat).unwrap();

    // THEN: They agree
    assert_eq!(a, b);
    assert_eq!(a.default_dashboard.as_deref(), Some("lovelace/0"));
    assert_eq!(a.hide_header, Some(true));
    assert_eq!(a.hide_sidebar, None);
}

#[test]
fn given_null_response_when_decoding_then_returns_empty_settings() {
    let settings = DisplaySettings::from_settings_response(&json!(null)).unwrap();

    assert_eq!(settings, DisplaySettings::default());
}

#[test]
fn given_non_object_response_when_decoding_then_returns_error() {
    assert!(DisplaySettings::from_settings_response(&json!([1, 2])).is_err());
    assert!(DisplaySettings::from_settings_response(&json!({"settings": "nope"})).is_err());
}

/// **VALUE**: Verifies a partial update keeps fields it does not mention.
///
/// **BUG THIS CATCHES**: Would catch a merge that replaces the whole struct,
/// which would wipe the default dashboard whenever only `hide_header` changes.
#[test]
fn given_partial_update_when_merging_then_untouched_fields_survive() {
    // GIVEN: Existing settings
    let mut settings = DisplaySettings {
        default_dashboard: Some(String::from("lovelace")),
        hide_sidebar: Some(true),
        ..Default::default()
    };

    // WHEN: Merging an update that only sets hide_header
    settings.merge(DisplaySettings {
        hide_header: Some(false),
        ..Default::default()
    });

    // THEN: Old fields are kept and the new one applied
    assert_eq!(settings.default_dashboard.as_deref(), Some("lovelace"));
    assert_eq!(settings.hide_sidebar, Some(true));
    assert_eq!(settings.hide_header, Some(false));
}

#[test]
fn given_dashboard_when_building_url_then_joins_with_single_slash() {
    let settings = DisplaySettings {
        default_dashboard: Some(String::from("/lovelace/kitchen")),
        ..Default::default()
    };

    assert_eq!(
        settings.dashboard_url("http://ha.local:8123/"),
        "http://ha.local:8123/lovelace/kitchen"
    );
}

#[test]
fn given_no_dashboard_when_building_url_then_returns_base_url() {
    let settings = DisplaySettings::default();

    assert_eq!(settings.dashboard_url("http://ha.local:8123/"), "http://ha.local:8123");
}

#[test]
fn given_absolute_path_when_joining_then_path_wins() {
    assert_eq!(join_url("http://ha", "https://other/x"), "https://other/x");
}
