use crate::RedactedToken;

/// **VALUE**: Verifies that Debug and Display never print the token value.
///
/// **WHY THIS MATTERS**: Tokens flow through the supervisor and transport, both of which
/// log generously. A derived Debug would put a long-lived Home Assistant credential into
/// the log file on the kiosk.
///
/// **BUG THIS CATCHES**: Would catch if someone replaces the manual impls with
/// `#[derive(Debug)]` or formats the inner string.
#[test]
fn given_token_when_formatted_then_value_is_hidden() {
    // GIVEN: A token with a recognizable value
    let token = RedactedToken::new("eyJhbGciOiJIUzI1NiJ9.secret.value");

    // WHEN: Formatting with Debug and Display
    let debug = format!("{:?}", token);
    let display = format!("{}", token);

    // THEN: Neither output contains the secret
    assert!(!debug.contains("secret"), "Debug must not leak the token");
    assert!(!display.contains("secret"), "Display must not leak the token");
    assert!(debug.contains("REDACTED"));
    assert!(display.contains("REDACTED"));
}

/// **VALUE**: Verifies that serde serialization is refused.
///
/// **WHY THIS MATTERS**: The auth frame is built explicitly from `expose()`. Accidentally
/// embedding a token in a serialized struct (config, state dump) must fail loudly.
///
/// **BUG THIS CATCHES**: Would catch if the Serialize impl starts emitting the value.
#[test]
fn given_token_when_serialized_then_returns_error() {
    // GIVEN: A token
    let token = RedactedToken::new("abc123");

    // WHEN: Serializing to JSON
    let result = serde_json::to_string(&token);

    // THEN: Serialization fails and the error does not contain the value
    assert!(result.is_err(), "Serialization should be refused");
    assert!(!result.unwrap_err().to_string().contains("abc123"));
}

/// **VALUE**: Verifies that `expose()` returns the raw value for the wire.
///
/// **WHY THIS MATTERS**: The auth handshake must send the exact token; a wrapper that
/// mangles it would produce auth_invalid on every connection.
///
/// **BUG THIS CATCHES**: Would catch if the wrapper trims or transforms the value.
#[test]
fn given_token_when_exposed_then_returns_exact_value() {
    // GIVEN: A token
    let token = RedactedToken::new(" spaced-token ");

    // WHEN/THEN: The exposed value and length match the input
    assert_eq!(token.expose(), " spaced-token ");
    assert_eq!(token.len(), 14);
    assert!(!token.is_empty());
}
