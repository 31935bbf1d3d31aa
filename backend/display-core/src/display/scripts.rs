use crate::{BROWSER_MOD_ID_KEY, DISPLAY_ID_KEY, DISPLAY_SETTINGS_KEY};

use models::DisplaySettings;

use serde_json::{Value, json};

/// JS string literal for `text`.
fn quoted(text: &str) -> String {
    Value::String(text.to_string()).to_string()
}

/// In-page navigation for the Home Assistant frontend router.
pub(crate) fn push_state(path: &str) -> String {
    format!(
        r#"(function (path) {{
    if (!path) return;
    history.pushState(null, "", path);
    window.dispatchEvent(new CustomEvent("location-changed"));
}})({});"#,
        quoted(&format!("/{path}"))
    )
}

pub(crate) fn local_storage(display_id: &str, settings: &DisplaySettings) -> String {
    let view = json!({
        "hideHeader": settings.hide_header.unwrap_or(false),
        "hideSidebar": settings.hide_sidebar.unwrap_or(false),
    })
    .to_string();

    let id = quoted(display_id);
    format!(
        "localStorage.setItem({}, {id});\nlocalStorage.setItem({}, {id});\nlocalStorage.setItem({}, {});",
        quoted(BROWSER_MOD_ID_KEY),
        quoted(DISPLAY_ID_KEY),
        quoted(DISPLAY_SETTINGS_KEY),
        quoted(&view),
    )
}
