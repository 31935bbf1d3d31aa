use crate::helpers::{Behavior, FakeServer, TEST_TOKEN, WAIT, eventually};

use display_core::error::{EventError, TransportError};
use display_core::transport::ConnectionState;
use display_core::{TransportClient, TransportOptions};

use common::RedactedToken;
use models::CommandBuilder;

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde_json::{Value, json};

// ============================================================================
// Public API tests for TransportClient against a scripted server
// ============================================================================

async fn connected(server: &FakeServer) -> Arc<TransportClient> {
    let client = Arc::new(TransportClient::new(
        &server.ws_url,
        RedactedToken::new(TEST_TOKEN),
        TransportOptions::default(),
    ));
    client.connect().await.expect("Failed to connect to fake server");
    client
}

fn echo(value: u64, delay_ms: u64) -> models::Command {
    CommandBuilder::new("test/echo")
        .with_param("value", value)
        .with_param("delay_ms", delay_ms)
        .build()
        .expect("valid command")
}

fn hang() -> models::Command {
    CommandBuilder::new("test/hang").build().expect("valid command")
}

/// **VALUE**: Concurrent commands each get their own result.
///
/// **WHY THIS MATTERS**: The server may answer in any order; results are
/// correlated by id only.
///
/// **BUG THIS CATCHES**: Would catch results being handed to whichever caller
/// waited first.
#[tokio::test]
async fn given_concurrent_commands_when_replies_arrive_out_of_order_then_each_caller_gets_its_own() {
    // GIVEN
    let server = FakeServer::start(Behavior::accepting(TEST_TOKEN)).await;
    let client = connected(&server).await;

    // WHEN
    let calls = (0..5u64).map(|i| {
        let client = Arc::clone(&client);
        tokio::spawn(async move { (i, client.send_command(echo(i, (5 - i) * 30)).await) })
    });
    let results = futures_util::future::join_all(calls).await;

    // THEN
    for joined in results {
        let (i, result) = joined.expect("join");
        let result = result.expect("command succeeds");
        assert_eq!(result.get("value"), Some(&json!(i)));
    }
    let ids: Vec<u64> = server
        .commands_of("test/echo")
        .iter()
        .filter_map(|frame| frame.get("id").and_then(Value::as_u64))
        .collect();
    let mut unique = ids.clone();
    unique.sort_unstable();
    unique.dedup();
    assert_eq!(unique.len(), ids.len());
}

/// **VALUE**: Every waiter learns the connection died.
///
/// **BUG THIS CATCHES**: Would catch pending commands hanging forever after
/// the socket drops.
#[tokio::test]
async fn given_pending_commands_when_connection_drops_then_all_fail_with_connection_closed() {
    // GIVEN
    let server = FakeServer::start(Behavior::accepting(TEST_TOKEN).with_silent("test/hang")).await;
    let client = connected(&server).await;
    let calls: Vec<_> = (0..3)
        .map(|_| {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.send_command(hang()).await })
        })
        .collect();
    eventually("three pending commands", || client.pending_commands() == 3).await;

    // WHEN
    server.kill_connections();

    // THEN
    for call in calls {
        let result = tokio::time::timeout(WAIT, call)
            .await
            .expect("resolved in time")
            .expect("join");
        assert!(result.err().expect("must fail").is_connection_closed());
    }
    tokio::time::timeout(WAIT, client.closed()).await.expect("closed");
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(client.pending_commands(), 0);
}

/// **VALUE**: Events reach the handler in arrival order.
///
/// **BUG THIS CATCHES**: Would catch events being routed to the wrong id or
/// reordered.
#[tokio::test]
async fn given_subscription_when_events_pushed_then_handler_sees_them_in_order() {
    // GIVEN
    let server = FakeServer::start(Behavior::accepting(TEST_TOKEN)).await;
    let client = connected(&server).await;
    let seen = Arc::new(Mutex::new(Vec::new()));
    let handler = {
        let seen = Arc::clone(&seen);
        move |event: Value| -> Result<(), EventError> {
            seen.lock().unwrap_or_else(PoisonError::into_inner).push(event);
            Ok(())
        }
    };
    let handle = client
        .subscribe(handler, CommandBuilder::new("test/subscribe").build().expect("valid"))
        .await
        .expect("subscribed");

    // WHEN
    server.push_event(handle.id(), json!({ "n": 1 }));
    server.push_event(handle.id(), json!({ "n": 2 }));

    // THEN
    eventually("two events", || seen.lock().map(|s| s.len() == 2).unwrap_or(false)).await;
    let seen = seen.lock().unwrap_or_else(PoisonError::into_inner).clone();
    assert_eq!(seen, vec![json!({ "n": 1 }), json!({ "n": 2 })]);
    assert_eq!(client.subscriptions().len(), 1);
}

/// **VALUE**: A rejected token is reported as an authentication failure.
///
/// **WHY THIS MATTERS**: The supervisor only refreshes the token on this
/// error kind.
#[tokio::test]
async fn given_wrong_token_when_connect_then_authentication_failed() {
    // GIVEN
    let server = FakeServer::start(Behavior::accepting("the-right-one")).await;
    let client = TransportClient::new(
        &server.ws_url,
        RedactedToken::new("the-wrong-one"),
        TransportOptions::default(),
    );

    // WHEN
    let result = client.connect().await;

    // THEN
    let error = result.err().expect("must fail");
    assert!(error.is_auth_failure(), "unexpected error: {error}");
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(server.tokens(), vec!["the-wrong-one".to_string()]);
}

/// **VALUE**: An unreachable server is a transport problem, not an auth one.
///
/// **BUG THIS CATCHES**: Would catch a refused TCP connect forcing a token
/// refresh on every retry.
#[tokio::test]
async fn given_nothing_listening_when_connect_then_transport_error() {
    // GIVEN
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();
    drop(listener);
    let client = TransportClient::new(
        format!("ws://127.0.0.1:{port}/api/websocket"),
        RedactedToken::new(TEST_TOKEN),
        TransportOptions {
            handshake_timeout: Duration::from_secs(2),
        },
    );

    // WHEN
    let result = client.connect().await;

    // THEN
    assert!(matches!(result, Err(TransportError::Transport { .. })));
}

#[tokio::test]
async fn given_open_client_when_connect_again_then_invalid_state() {
    let server = FakeServer::start(Behavior::accepting(TEST_TOKEN)).await;
    let client = connected(&server).await;

    let result = client.connect().await;

    assert!(matches!(result, Err(TransportError::InvalidState { .. })));
    assert!(client.is_open());
}

/// **VALUE**: Disconnecting twice is harmless and later commands fail fast.
#[tokio::test]
async fn given_open_client_when_disconnect_twice_then_disconnected_and_commands_fail() {
    // GIVEN
    let server = FakeServer::start(Behavior::accepting(TEST_TOKEN)).await;
    let client = connected(&server).await;

    // WHEN
    client.disconnect().await;
    client.disconnect().await;

    // THEN
    assert_eq!(client.state(), ConnectionState::Disconnected);
    let result = client.send_command(echo(1, 0)).await;
    assert!(result.err().expect("must fail").is_connection_closed());
}

#[tokio::test]
async fn given_fresh_client_when_send_command_then_connection_closed() {
    let client = TransportClient::new(
        "ws://127.0.0.1:9/api/websocket",
        RedactedToken::new(TEST_TOKEN),
        TransportOptions::default(),
    );

    let result = client.send_command(echo(1, 0)).await;

    assert!(result.err().expect("must fail").is_connection_closed());
}

/// **VALUE**: A panicking handler does not take the connection down.
///
/// **BUG THIS CATCHES**: Would catch the receive loop dying with the handler,
/// which silently stops all further events and replies.
#[tokio::test]
async fn given_panicking_handler_when_event_arrives_then_connection_survives() {
    // GIVEN
    let server = FakeServer::start(Behavior::accepting(TEST_TOKEN)).await;
    let client = connected(&server).await;
    let seen = Arc::new(Mutex::new(Vec::new()));
    let handler = {
        let seen = Arc::clone(&seen);
        move |event: Value| -> Result<(), EventError> {
            if event.get("boom").is_some() {
                panic!("handler blew up");
            }
            seen.lock().unwrap_or_else(PoisonError::into_inner).push(event);
            Ok(())
        }
    };
    let handle = client
        .subscribe(handler, CommandBuilder::new("test/subscribe").build().expect("valid"))
        .await
        .expect("subscribed");

    // WHEN
    server.push_event(handle.id(), json!({ "boom": true }));
    server.push_event(handle.id(), json!({ "n": 2 }));

    // THEN
    eventually("event after the panic", || {
        seen.lock().map(|s| s.len() == 1).unwrap_or(false)
    })
    .await;
    assert!(client.is_open());
    let result = client.send_command(echo(7, 0)).await.expect("still usable");
    assert_eq!(result.get("value"), Some(&json!(7)));
}

/// **VALUE**: Frames for ids nobody waits on are dropped quietly.
#[tokio::test]
async fn given_frames_for_unknown_ids_when_received_then_discarded() {
    // GIVEN
    let server = FakeServer::start(Behavior::accepting(TEST_TOKEN)).await;
    let client = connected(&server).await;

    // WHEN
    server.push_frame(json!({ "id": 999, "type": "result", "success": true, "result": null }));
    server.push_event(998, json!({ "n": 1 }));
    server.push_frame(json!({ "type": "something_new" }));
    server.push_binary();

    // THEN
    let result = client.send_command(echo(3, 0)).await.expect("still usable");
    assert_eq!(result.get("value"), Some(&json!(3)));
    assert!(client.is_open());
}

/// **VALUE**: A caller that gives up frees its pending entry.
///
/// **BUG THIS CATCHES**: Would catch timed-out commands leaking in the table
/// for the life of the connection.
#[tokio::test]
async fn given_silent_command_when_caller_times_out_then_pending_entry_removed() {
    // GIVEN
    let server = FakeServer::start(Behavior::accepting(TEST_TOKEN).with_silent("test/hang")).await;
    let client = connected(&server).await;

    // WHEN
    let outcome = tokio::time::timeout(Duration::from_millis(100), client.send_command(hang())).await;

    // THEN
    assert!(outcome.is_err());
    assert_eq!(client.pending_commands(), 0);
}

#[tokio::test]
async fn given_failing_command_when_sent_then_command_error_carries_code_and_message() {
    // GIVEN
    let server = FakeServer::start(Behavior::accepting(TEST_TOKEN).with_failing("test/fail")).await;
    let client = connected(&server).await;

    // WHEN
    let result = client
        .send_command(CommandBuilder::new("test/fail").build().expect("valid"))
        .await;

    // THEN
    match result {
        Err(TransportError::Command { message, code, .. }) => {
            assert_eq!(message, "test/fail refused");
            assert_eq!(code.as_deref(), Some("test_failure"));
        }
        other => panic!("expected Command error, got {other:?}"),
    }
    assert!(client.is_open());
}

#[tokio::test]
async fn given_subscription_when_unsubscribe_then_server_told_and_events_ignored() {
    // GIVEN
    let server = FakeServer::start(Behavior::accepting(TEST_TOKEN)).await;
    let client = connected(&server).await;
    let handle = client
        .subscribe(
            |_event: Value| -> Result<(), EventError> { Err(EventError::rejected("should not be called")) },
            CommandBuilder::new("test/subscribe").build().expect("valid"),
        )
        .await
        .expect("subscribed");

    // WHEN
    client.unsubscribe(handle).await.expect("unsubscribed");

    // THEN
    let request = server.wait_for_command("unsubscribe_events").await;
    assert_eq!(request.get("subscription"), Some(&json!(handle.id())));
    assert!(client.subscriptions().is_empty());
}

#[tokio::test]
async fn given_heartbeat_when_ping_sent_then_pong_resolves() {
    let server = FakeServer::start(Behavior::accepting(TEST_TOKEN)).await;
    let client = connected(&server).await;

    let ping = CommandBuilder::new("ping").build().expect("valid");
    let result = client.send_command(ping).await.expect("pong");

    assert_eq!(result, Value::Null);
}
