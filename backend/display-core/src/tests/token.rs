use crate::HASS_TOKENS_KEY;
use crate::error::token::TokenError;
use crate::tests::support::RecordingSurface;
use crate::token::{TokenOptions, TokenProvider};

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};

fn fast_options(retry_limit: u32) -> TokenOptions {
    TokenOptions {
        retry_limit,
        retry_delay: Duration::from_millis(1),
        read_timeout: Duration::from_secs(1),
        ..TokenOptions::default()
    }
}

/// **VALUE**: A cached token is handed out without touching the surface.
///
/// **BUG THIS CATCHES**: Would catch every connection attempt re-reading local
/// storage.
#[tokio::test]
async fn given_cached_token_when_get_token_then_surface_not_read_again() {
    // GIVEN
    let surface = Arc::new(RecordingSurface::with_storage(
        HASS_TOKENS_KEY,
        json!({ "access_token": "first" }),
    ));
    let provider = TokenProvider::new(surface.clone(), fast_options(3));
    provider.get_token(false).await.expect("token");

    // WHEN
    let token = provider.get_token(false).await.expect("token");

    // THEN
    assert_eq!(token.expose(), "first");
    assert_eq!(surface.log().reads, 1);
    assert!(provider.has_cached().await);
}

/// **VALUE**: `force` bypasses the cache and picks up a rotated token.
///
/// **WHY THIS MATTERS**: After `auth_invalid` the supervisor forces a refresh;
/// reusing the cached token would loop on the same rejection forever.
///
/// **BUG THIS CATCHES**: Would catch `force` being ignored.
#[tokio::test]
async fn given_rotated_token_when_get_token_forced_then_returns_new_token() {
    // GIVEN
    let surface = Arc::new(RecordingSurface::with_storage(
        HASS_TOKENS_KEY,
        json!({ "access_token": "old" }),
    ));
    let provider = TokenProvider::new(surface.clone(), fast_options(3));
    provider.get_token(false).await.expect("token");
    surface.log().storage.insert(
        HASS_TOKENS_KEY.to_string(),
        Value::String(r#"{"access_token":"new"}"#.to_string()),
    );

    // WHEN
    let token = provider.get_token(true).await.expect("token");

    // THEN
    assert_eq!(token.expose(), "new");
    assert_eq!(surface.log().reads, 2);
}

/// **VALUE**: Gives up with a typed error after exactly `retry_limit` reads.
///
/// **BUG THIS CATCHES**: Would catch an off-by-one in the attempt loop or an
/// unbounded retry.
#[tokio::test]
async fn given_no_stored_credential_when_get_token_then_unavailable_after_retry_limit() {
    // GIVEN
    let surface = Arc::new(RecordingSurface::default());
    let provider = TokenProvider::new(surface.clone(), fast_options(3));

    // WHEN
    let result = provider.get_token(false).await;

    // THEN
    assert!(matches!(result, Err(TokenError::Unavailable { .. })));
    assert_eq!(surface.log().reads, 3);
    assert!(!provider.has_cached().await);
}

#[tokio::test]
async fn given_failing_reads_when_get_token_then_retries_then_unavailable() {
    // GIVEN
    let surface = Arc::new(RecordingSurface::default());
    surface.log().fail_reads = true;
    let provider = TokenProvider::new(surface.clone(), fast_options(2));

    // WHEN
    let result = provider.get_token(false).await;

    // THEN
    assert!(result.is_err());
    assert_eq!(surface.log().reads, 2);
}

/// **VALUE**: A credential that appears mid-retry is picked up.
///
/// **WHY THIS MATTERS**: On boot the frontend writes `hassTokens` a moment
/// after the page loads.
#[tokio::test]
async fn given_credential_appears_later_when_get_token_then_succeeds_on_retry() {
    // GIVEN
    let surface = Arc::new(RecordingSurface::default());
    let provider = Arc::new(TokenProvider::new(
        surface.clone(),
        TokenOptions {
            retry_delay: Duration::from_millis(50),
            ..fast_options(20)
        },
    ));

    // WHEN
    let task = {
        let provider = Arc::clone(&provider);
        tokio::spawn(async move { provider.get_token(false).await })
    };
    tokio::time::sleep(Duration::from_millis(120)).await;
    surface.log().storage.insert(
        HASS_TOKENS_KEY.to_string(),
        json!({ "access_token": "late" }),
    );
    let token = task.await.expect("join").expect("token");

    // THEN
    assert_eq!(token.expose(), "late");
    assert!(surface.log().reads >= 2);
}

#[tokio::test]
async fn given_cached_token_when_clear_then_next_call_reads_again() {
    // GIVEN
    let surface = Arc::new(RecordingSurface::with_storage(
        HASS_TOKENS_KEY,
        json!({ "access_token": "t" }),
    ));
    let provider = TokenProvider::new(surface.clone(), fast_options(1));
    provider.get_token(false).await.expect("token");

    // WHEN
    provider.clear().await;
    provider.get_token(false).await.expect("token");

    // THEN
    assert_eq!(surface.log().reads, 2);
}
