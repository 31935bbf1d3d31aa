use crate::error::transport::TransportError;
use crate::transport::handler::{EventHandler, SubscriptionHandle};
use crate::transport::handshake;
use crate::transport::routing::{PendingGuard, RoutingTable, Subscription, lock};
use crate::transport::{WsSink, WsSource};

use common::{ErrorLocation, RedactedToken};
use models::protocol::UNSUBSCRIBE_COMMAND;
use models::{Command, CommandBuilder, InboundMessage, OutboundFrame};

use std::any::Any;
use std::panic::{AssertUnwindSafe, Location, catch_unwind};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use serde_json::Value;
use tokio::spawn as TokioSpawn;
use tokio::sync::{Mutex as AsyncMutex, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Authenticating,
    Open,
    Closing,
}

#[derive(Debug, Clone)]
pub struct TransportOptions {
    /// Bounds the TCP/TLS connect and each handshake read.
    pub handshake_timeout: Duration,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }
}

/// State shared with the receive loop.
struct Shared {
    writer: AsyncMutex<Option<WsSink>>,
    routes: Mutex<RoutingTable>,
    state: watch::Sender<ConnectionState>,
}

pub struct TransportClient {
    url: String,
    token: RedactedToken,
    options: TransportOptions,
    shared: Arc<Shared>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl TransportClient {
    pub fn new(url: impl Into<String>, token: RedactedToken, options: TransportOptions) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);

        Self {
            url: url.into(),
            token,
            options,
            shared: Arc::new(Shared {
                writer: AsyncMutex::new(None),
                routes: Mutex::new(RoutingTable::new()),
                state,
            }),
            reader: Mutex::new(None),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Open the socket and authenticate, then start the receive loop.
    ///
    /// # Errors
    ///
    /// - [`TransportError::InvalidState`] unless currently disconnected
    /// - [`TransportError::Transport`] if the server cannot be reached
    /// - [`TransportError::AuthenticationFailed`] for any handshake problem
    pub async fn connect(&self) -> Result<(), TransportError> {
        let claimed = self.shared.state.send_if_modified(|state| {
            if *state == ConnectionState::Disconnected {
                *state = ConnectionState::Authenticating;
                true
            } else {
                false
            }
        });

        if !claimed {
            return Err(TransportError::InvalidState {
                message: format!("connect() while {:?}", self.state()),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let (sink, source) =
            match handshake::open(&self.url, &self.token, self.options.handshake_timeout).await {
                Ok(halves) => halves,
                Err(e) => {
                    self.shared.state.send_replace(ConnectionState::Disconnected);
                    return Err(e);
                }
            };

        *self.shared.writer.lock().await = Some(sink);
        lock(&self.shared.routes).reopen();

        let opened = self.shared.state.send_if_modified(|state| {
            if *state == ConnectionState::Authenticating {
                *state = ConnectionState::Open;
                true
            } else {
                false
            }
        });

        if !opened {
            // disconnect() ran while we were authenticating.
            lock(&self.shared.routes).teardown();
            if let Some(mut sink) = self.shared.writer.lock().await.take() {
                let _ = sink.close().await;
            }
            return Err(TransportError::closed());
        }

        let handle = TokioSpawn(receive_loop(
            Arc::clone(&self.shared),
            source,
            self.url.clone(),
        ));
        *self
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handle);

        info!("Connected to {}", self.url);
        Ok(())
    }

    /// Send a command and wait for its result.
    ///
    /// Dropping the returned future frees the pending entry.
    ///
    /// # Errors
    ///
    /// - [`TransportError::Command`] when the server answers `success: false`
    /// - [`TransportError::ConnectionClosed`] when the connection ends first
    pub async fn send_command(&self, command: Command) -> Result<Value, TransportError> {
        let (id, response) = lock(&self.shared.routes).register(None)?;
        let _guard = PendingGuard {
            table: &self.shared.routes,
            id,
        };

        self.transmit(id, &command).await?;

        response.await.unwrap_or_else(|_| Err(TransportError::closed()))
    }

    /// Subscribe with `command`; later events for its id go to `handler`.
    ///
    /// The handler is registered before the command is written so events
    /// arriving ahead of the confirmation are not lost.
    pub async fn subscribe<H>(
        &self,
        handler: H,
        command: Command,
    ) -> Result<SubscriptionHandle, TransportError>
    where
        H: EventHandler + 'static,
    {
        let subscription = Subscription {
            handler: Arc::new(handler),
            request: command.clone(),
        };
        let (id, response) = lock(&self.shared.routes).register(Some(subscription))?;
        let _guard = PendingGuard {
            table: &self.shared.routes,
            id,
        };

        let outcome = match self.transmit(id, &command).await {
            Ok(()) => response
                .await
                .unwrap_or_else(|_| Err(TransportError::closed())),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(_) => {
                debug!("Subscribed {} as id {id}", command.kind());
                Ok(SubscriptionHandle::new(id))
            }
            Err(e) => {
                lock(&self.shared.routes).remove_subscription(id);
                Err(e)
            }
        }
    }

    /// Drop the local subscription and tell the server to stop sending.
    pub async fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<(), TransportError> {
        if lock(&self.shared.routes)
            .remove_subscription(handle.id())
            .is_none()
        {
            debug!("Subscription {} was not registered", handle.id());
        }

        let command = CommandBuilder::new(UNSUBSCRIBE_COMMAND)
            .with_param("subscription", handle.id())
            .build()?;
        self.send_command(command).await.map(|_| ())
    }

    /// Close the connection and fail everything still waiting. Idempotent.
    pub async fn disconnect(&self) {
        let proceed = self.shared.state.send_if_modified(|state| match *state {
            ConnectionState::Disconnected | ConnectionState::Closing => false,
            _ => {
                *state = ConnectionState::Closing;
                true
            }
        });

        if !proceed {
            debug!("disconnect() on {} ignored: already {:?}", self.url, self.state());
            return;
        }

        if let Some(handle) = self
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }

        lock(&self.shared.routes).teardown();

        if let Some(mut sink) = self.shared.writer.lock().await.take() {
            if let Err(e) = sink.close().await {
                debug!("Closing socket to {}: {e}", self.url);
            }
        }

        self.shared.state.send_replace(ConnectionState::Disconnected);
        info!("Disconnected from {}", self.url);
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Resolves once the connection is no longer usable.
    pub async fn closed(&self) {
        let mut state = self.shared.state.subscribe();
        let _ = state
            .wait_for(|state| *state == ConnectionState::Disconnected)
            .await;
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Original subscribe requests, oldest first.
    pub fn subscriptions(&self) -> Vec<Command> {
        lock(&self.shared.routes).requests()
    }

    pub fn pending_commands(&self) -> usize {
        lock(&self.shared.routes).pending_count()
    }

    async fn transmit(&self, id: u64, command: &Command) -> Result<(), TransportError> {
        let json = OutboundFrame::new(id, command).to_json()?;

        let mut writer = self.shared.writer.lock().await;
        let sink = writer.as_mut().ok_or_else(TransportError::closed)?;

        debug!("-> {} (id {id})", command.kind());
        sink.send(Message::Text(json.into())).await?;
        Ok(())
    }
}

impl Drop for TransportClient {
    fn drop(&mut self) {
        if let Some(handle) = self
            .reader
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}

async fn receive_loop(shared: Arc<Shared>, mut source: WsSource, url: String) {
    let outcome = loop {
        match source.next().await {
            Some(Ok(Message::Text(text))) => dispatch(&shared, text.as_str()),
            Some(Ok(Message::Binary(data))) => {
                debug!("Skipping {} byte binary frame", data.len());
            }
            Some(Ok(Message::Close(frame))) => {
                break Ok(frame.map(|f| format!("{} {}", f.code, f.reason.as_str())));
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => break Err(e),
            None => break Ok(None),
        }
    };

    match outcome {
        Ok(Some(reason)) => info!("Server closed connection to {url}: {reason}"),
        Ok(None) => info!("Connection to {url} ended"),
        Err(e) => error!("Connection to {url} failed: {e}"),
    }

    shared.state.send_if_modified(|state| {
        if *state == ConnectionState::Open {
            *state = ConnectionState::Closing;
            true
        } else {
            false
        }
    });
    lock(&shared.routes).teardown();
    shared.writer.lock().await.take();
    shared.state.send_replace(ConnectionState::Disconnected);
}

fn dispatch(shared: &Shared, text: &str) {
    let message = match InboundMessage::parse(text) {
        Ok(message) => message,
        Err(e) => {
            warn!("Skipping unparsable frame: {e}");
            return;
        }
    };

    match message {
        InboundMessage::Result {
            id,
            success,
            result,
            error,
        } => {
            let outcome = if success {
                Ok(result.unwrap_or(Value::Null))
            } else {
                let error = error.unwrap_or_default();
                Err(TransportError::Command {
                    message: if error.message.is_empty() {
                        String::from("Unknown error")
                    } else {
                        error.message
                    },
                    code: error.code.map(|code| match code {
                        Value::String(code) => code,
                        other => other.to_string(),
                    }),
                    location: ErrorLocation::from(Location::caller()),
                })
            };
            resolve(shared, id, outcome);
        }
        InboundMessage::Pong { id } => resolve(shared, id, Ok(Value::Null)),
        InboundMessage::Event { id, event } => {
            let handler = lock(&shared.routes).handler(id);
            match handler {
                Some(handler) => deliver(handler.as_ref(), id, event),
                None => debug!("Discarding event for unknown subscription {id}"),
            }
        }
        other => debug!("Ignoring {} frame", other.kind()),
    }
}

fn resolve(shared: &Shared, id: u64, outcome: Result<Value, TransportError>) {
    let responder = lock(&shared.routes).take_pending(id);
    match responder {
        Some(responder) => {
            if responder.send(outcome).is_err() {
                debug!("Caller for id {id} stopped waiting");
            }
        }
        None => debug!("Discarding response for unknown id {id}"),
    }
}

fn deliver(handler: &dyn EventHandler, id: u64, event: Value) {
    match catch_unwind(AssertUnwindSafe(|| handler.handle(event))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Handler for subscription {id} failed: {e}"),
        Err(panic) => error!(
            "Handler for subscription {id} panicked: {}",
            panic_message(panic.as_ref())
        ),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| String::from("non-string panic payload"))
}
