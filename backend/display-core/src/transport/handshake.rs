//! Opening the socket and the `auth_required` / `auth` / `auth_ok` exchange.

use crate::error::transport::TransportError;
use crate::transport::{WsSink, WsSource};

use common::{ErrorLocation, RedactedToken};
use models::{AuthFrame, InboundMessage};

use std::panic::Location;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use log::{debug, info};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

/// Connect to `url` and authenticate with `token`.
///
/// Failing to reach the server at all is a transport error. Anything that
/// goes wrong once the server is talking to us is an authentication failure.
pub(crate) async fn open(
    url: &str,
    token: &RedactedToken,
    handshake_timeout: Duration,
) -> Result<(WsSink, WsSource), TransportError> {
    debug!("Opening WebSocket to {url}");

    let stream = match timeout(handshake_timeout, connect_async(url)).await {
        Ok(Ok((stream, _response))) => stream,
        Ok(Err(WsError::Http(response))) => {
            return Err(auth_failed(format!(
                "WebSocket upgrade rejected with HTTP {}",
                response.status()
            )));
        }
        Ok(Err(e)) => return Err(TransportError::from(e)),
        Err(_) => {
            return Err(TransportError::Transport {
                message: format!("Connecting to {url} timed out after {handshake_timeout:?}"),
                location: ErrorLocation::from(Location::caller()),
            });
        }
    };

    let (mut sink, mut source) = stream.split();

    match read_frame(&mut source, handshake_timeout).await? {
        InboundMessage::AuthRequired { ha_version } => {
            debug!(
                "Server requires auth (version {})",
                ha_version.as_deref().unwrap_or("unknown")
            );
        }
        other => {
            return Err(auth_failed(format!(
                "Expected auth_required, got {}",
                other.kind()
            )));
        }
    }

    let auth = serde_json::to_string(&AuthFrame::new(token.expose()))
        .map_err(|e| auth_failed(format!("Could not encode auth frame: {e}")))?;
    sink.send(Message::Text(auth.into()))
        .await
        .map_err(|e| auth_failed(format!("Sending auth failed: {e}")))?;

    match read_frame(&mut source, handshake_timeout).await? {
        InboundMessage::AuthOk { ha_version } => {
            info!(
                "Authenticated with Home Assistant {}",
                ha_version.as_deref().unwrap_or("(unknown version)")
            );
            Ok((sink, source))
        }
        rejected @ InboundMessage::AuthInvalid { .. } => Err(auth_failed(format!(
            "Rejected: {}",
            rejected.rejection_reason().unwrap_or_default()
        ))),
        other => Err(auth_failed(format!(
            "Expected auth_ok, got {}",
            other.kind()
        ))),
    }
}

/// Next text frame, decoded. Control frames are skipped.
async fn read_frame(
    source: &mut WsSource,
    limit: Duration,
) -> Result<InboundMessage, TransportError> {
    let next = async {
        loop {
            match source.next().await {
                Some(Ok(Message::Text(text))) => {
                    return InboundMessage::parse(text.as_str())
                        .map_err(|e| auth_failed(format!("Invalid handshake frame: {e}")));
                }
                Some(Ok(Message::Close(_))) | None => {
                    return Err(auth_failed(String::from(
                        "Connection closed during handshake",
                    )));
                }
                Some(Ok(Message::Binary(_))) => {
                    return Err(auth_failed(String::from(
                        "Unexpected binary frame during handshake",
                    )));
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    return Err(auth_failed(format!("Handshake read failed: {e}")));
                }
            }
        }
    };

    match timeout(limit, next).await {
        Ok(result) => result,
        Err(_) => Err(auth_failed(format!(
            "No handshake frame within {limit:?}"
        ))),
    }
}

#[track_caller]
fn auth_failed(message: String) -> TransportError {
    TransportError::AuthenticationFailed {
        message,
        location: ErrorLocation::from(Location::caller()),
    }
}
