use crate::{CommandBuilder, ModelError};

use serde_json::json;

/// **VALUE**: Verifies that builder validation rejects an empty command type.
///
/// **WHY THIS MATTERS**: The server dispatches on `type`. A frame with an empty
/// type is answered with `unknown_command` and the caller waits for nothing useful.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - The empty-type check is removed during refactoring
/// - Whitespace-only types slip through
#[test]
fn given_blank_kind_when_building_command_then_returns_validation_error() {
    // GIVEN: Builder with a whitespace-only type
    let builder = CommandBuilder::new("   ");

    // WHEN: Attempting to build
    let result = builder.build();

    // THEN: Should return validation error
    match result {
        Err(ModelError::Validation { message, .. }) => {
            assert_eq!(message, "Command type cannot be empty");
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

/// **VALUE**: Verifies that a builder without a type cannot produce a command.
///
/// **BUG THIS CATCHES**: Would catch if the default builder yields a command
/// with an empty type instead of failing.
#[test]
fn given_default_builder_when_building_then_returns_validation_error() {
    // GIVEN: Default builder
    let builder = CommandBuilder::default().with_param("display_id", "kitchen");

    // WHEN: Attempting to build
    let result = builder.build();

    // THEN: Should report the missing type
    match result {
        Err(ModelError::Validation { message, .. }) => {
            assert_eq!(message, "Command type is required");
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

/// **VALUE**: Verifies that parameters cannot shadow the frame envelope.
///
/// **WHY THIS MATTERS**: The transport stamps `id` on every frame. A parameter
/// named `id` would be flattened over it and break response correlation.
///
/// **BUG THIS CATCHES**: Would catch if:
/// - Reserved key validation is removed
/// - Only one of `id` / `type` is checked
#[test]
fn given_reserved_param_when_building_then_returns_validation_error() {
    for key in ["id", "type"] {
        // GIVEN: Builder with a reserved parameter
        let builder = CommandBuilder::new("ping").with_param(key, 7);

        // WHEN: Attempting to build
        let result = builder.build();

        // THEN: Should name the offending key
        match result {
            Err(ModelError::Validation { message, .. }) => {
                assert_eq!(message, format!("Reserved parameter name: {key}"));
            }
            other => panic!("expected validation error for {key}, got {other:?}"),
        }
    }
}

/// **VALUE**: Verifies the happy path keeps type and every parameter.
///
/// **BUG THIS CATCHES**: Would catch if parameters are dropped or the type is
/// overwritten while building.
#[test]
fn given_valid_fields_when_building_then_returns_command() {
    // GIVEN: Builder with type and parameters
    let builder = CommandBuilder::new("remote_assist_display/update")
        .with_param("display_id", "kitchen")
        .with_param("data", json!({"display": {"current_url": "http://ha/x"}}));

    // WHEN: Building
    let command = builder.build().expect("valid command");

    // THEN: Fields are preserved
    assert_eq!(command.kind(), "remote_assist_display/update");
    assert_eq!(command.param("display_id"), Some(&json!("kitchen")));
    assert_eq!(
        command.param("data"),
        Some(&json!({"display": {"current_url": "http://ha/x"}}))
    );
}

/// **VALUE**: Verifies optional parameters are only present when set.
///
/// **WHY THIS MATTERS**: Sending `"hostname": null` differs from omitting it
/// on the server side.
#[test]
fn given_optional_none_when_building_then_param_is_omitted() {
    // GIVEN: One optional set, one not
    let command = CommandBuilder::new("remote_assist_display/register")
        .with_optional_param("hostname", Some("kiosk-1"))
        .with_optional_param("note", None::<String>)
        .build()
        .expect("valid command");

    // THEN: Only the present value is kept
    assert_eq!(command.param("hostname"), Some(&json!("kiosk-1")));
    assert!(command.param("note").is_none());
    assert_eq!(command.params().len(), 1);
}
