use crate::display::scripts::{local_storage, push_state};
use crate::{BROWSER_MOD_ID_KEY, DISPLAY_ID_KEY, DISPLAY_SETTINGS_KEY};

use models::DisplaySettings;

#[test]
fn given_path_when_push_state_then_script_pushes_and_notifies_router() {
    // WHEN
    let script = push_state("lovelace/cameras");

    // THEN
    assert!(script.contains(r#""/lovelace/cameras""#));
    assert!(script.contains("history.pushState"));
    assert!(script.contains("location-changed"));
}

/// **VALUE**: Values end up as JSON string literals, never spliced raw.
///
/// **BUG THIS CATCHES**: Would catch a path or id containing a quote breaking
/// out of the literal and running as code.
#[test]
fn given_quote_in_input_when_building_scripts_then_it_is_escaped() {
    // WHEN
    let card = push_state(r#"x");alert("1"#);
    let storage = local_storage(r#"id"with"quotes"#, &DisplaySettings::default());

    // THEN
    assert!(card.contains(r#""/x\");alert(\"1""#));
    assert!(storage.contains(r#""id\"with\"quotes""#));
}

#[test]
fn given_settings_when_local_storage_then_writes_identity_and_view_flags() {
    // GIVEN
    let settings = DisplaySettings {
        hide_header: Some(true),
        ..DisplaySettings::default()
    };

    // WHEN
    let script = local_storage("kitchen", &settings);

    // THEN
    assert!(script.contains(&format!(r#"localStorage.setItem("{BROWSER_MOD_ID_KEY}", "kitchen")"#)));
    assert!(script.contains(&format!(r#"localStorage.setItem("{DISPLAY_ID_KEY}", "kitchen")"#)));
    assert!(script.contains(DISPLAY_SETTINGS_KEY));
    assert!(script.contains(r#"\"hideHeader\":true"#));
    assert!(script.contains(r#"\"hideSidebar\":false"#));
}
