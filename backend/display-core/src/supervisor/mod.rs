//! Connection Supervisor.
//!
//! Keeps one registered and subscribed connection alive in a background task:
//! token, connect, register, settings, navigate, subscribe, then wait for the
//! connection to end and start over after the reconnect delay.

mod cycle;
mod slot;

pub use slot::ConnectionSlot;

use crate::WEBSOCKET_API_PATH;
use crate::display::DisplaySink;
use crate::error::supervisor::SupervisorError;
use crate::token::TokenProvider;
use crate::transport::TransportClient;

use common::ErrorLocation;
use models::DisplaySettings;

use std::panic::Location;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use backoff::ExponentialBackoff;
use backoff::backoff::{Backoff, Constant};
use log::{info, warn};
use tokio::spawn as TokioSpawn;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use url::Url;

const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconnectPolicy {
    /// Same delay after every failure.
    Flat(Duration),
    /// Grows from `initial` up to `max`, with jitter.
    Exponential { initial: Duration, max: Duration },
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        ReconnectPolicy::Flat(DEFAULT_RECONNECT_DELAY)
    }
}

impl ReconnectPolicy {
    pub(crate) fn backoff(&self) -> Box<dyn Backoff + Send> {
        match *self {
            ReconnectPolicy::Flat(delay) => Box::new(Constant::new(delay)),
            ReconnectPolicy::Exponential { initial, max } => Box::new(ExponentialBackoff {
                current_interval: initial,
                initial_interval: initial,
                max_interval: max.max(initial),
                max_elapsed_time: None,
                ..Default::default()
            }),
        }
    }

    /// Used if a backoff ever runs dry.
    pub(crate) fn ceiling(&self) -> Duration {
        match *self {
            ReconnectPolicy::Flat(delay) => delay,
            ReconnectPolicy::Exponential { max, .. } => max,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Idle,
    Connecting,
    Running,
    Backoff,
    Stopped,
}

#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    /// `http(s)://` address of Home Assistant.
    pub base_url: String,
    pub display_id: String,
    pub hostname: String,
    pub reconnect: ReconnectPolicy,
    /// Ping interval while connected; `None` disables the heartbeat.
    pub heartbeat_interval: Option<Duration>,
    /// Bound on each setup command and on each heartbeat pong.
    pub command_timeout: Duration,
    pub handshake_timeout: Duration,
}

impl SupervisorOptions {
    pub fn new(
        base_url: impl Into<String>,
        display_id: impl Into<String>,
        hostname: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            display_id: display_id.into(),
            hostname: hostname.into(),
            reconnect: ReconnectPolicy::default(),
            heartbeat_interval: None,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }
}

/// Everything the background loop needs, shared with the handle.
pub(crate) struct Inner {
    pub(crate) options: SupervisorOptions,
    pub(crate) tokens: Arc<TokenProvider>,
    pub(crate) display: Arc<DisplaySink>,
    pub(crate) slot: ConnectionSlot,
    pub(crate) state: watch::Sender<SupervisorState>,
    pub(crate) attempts: AtomicU32,
}

impl Inner {
    pub(crate) fn set_state(&self, state: SupervisorState) {
        self.state.send_replace(state);
    }
}

struct RunningLoop {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

pub struct Supervisor {
    inner: Arc<Inner>,
    running: Mutex<Option<RunningLoop>>,
}

impl Supervisor {
    pub fn new(
        options: SupervisorOptions,
        tokens: Arc<TokenProvider>,
        display: Arc<DisplaySink>,
        slot: ConnectionSlot,
    ) -> Self {
        let (state, _) = watch::channel(SupervisorState::Idle);

        Self {
            inner: Arc::new(Inner {
                options,
                tokens,
                display,
                slot,
                state,
                attempts: AtomicU32::new(0),
            }),
            running: Mutex::new(None),
        }
    }

    /// Validate the target, obtain a first token and start the loop.
    ///
    /// A loop that is already running is stopped first.
    ///
    /// # Errors
    ///
    /// - [`SupervisorError::InvalidTarget`] for a base URL that is not http(s)
    /// - [`SupervisorError::Display`] if the surface cannot be primed
    /// - [`SupervisorError::Token`] if no token could be read
    pub async fn initialize(&self) -> Result<(), SupervisorError> {
        let mut running = self.running.lock().await;

        if let Some(previous) = running.take() {
            info!("Supervisor already running; restarting");
            self.shut_down(previous).await;
        }

        let ws_url = websocket_url(&self.inner.options.base_url)?;

        if self.inner.display.prime().await? {
            info!("Loaded {} before reading the token", self.inner.options.base_url);
        }

        self.inner.tokens.get_token(false).await?;

        self.inner.attempts.store(0, Ordering::SeqCst);
        self.inner.set_state(SupervisorState::Connecting);

        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = TokioSpawn(cycle::run(Arc::clone(&self.inner), ws_url.clone(), shutdown_rx));
        *running = Some(RunningLoop { shutdown, task });

        info!("Supervisor started for {ws_url}");
        Ok(())
    }

    /// Stop the loop and close the live connection. Idempotent.
    pub async fn stop(&self) {
        let previous = self.running.lock().await.take();
        match previous {
            Some(previous) => self.shut_down(previous).await,
            None => {
                if let Some(client) = self.inner.slot.clear().await {
                    client.disconnect().await;
                }
                self.inner.display.cancel_pending_revert();
            }
        }
        self.inner.set_state(SupervisorState::Stopped);
    }

    async fn shut_down(&self, running: RunningLoop) {
        let RunningLoop { shutdown, task } = running;
        let _ = shutdown.send(true);

        if let Err(e) = task.await {
            if !e.is_cancelled() {
                warn!("Supervisor loop ended abnormally: {e}");
            }
        }

        if let Some(client) = self.inner.slot.clear().await {
            client.disconnect().await;
        }
        self.inner.display.cancel_pending_revert();
        info!("Supervisor stopped");
    }

    pub async fn client(&self) -> Option<Arc<TransportClient>> {
        self.inner.slot.current().await
    }

    pub fn settings(&self) -> DisplaySettings {
        self.inner.display.settings()
    }

    pub fn state(&self) -> SupervisorState {
        *self.inner.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<SupervisorState> {
        self.inner.state.subscribe()
    }

    /// Failed attempts since the last fully initialized connection.
    pub fn attempts(&self) -> u32 {
        self.inner.attempts.load(Ordering::SeqCst)
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        if let Some(running) = self.running.get_mut().take() {
            running.task.abort();
        }
    }
}

/// `http(s)://host[:port][/prefix]` to `ws(s)://host[:port][/prefix]/api/websocket`.
#[track_caller]
pub fn websocket_url(base_url: &str) -> Result<String, SupervisorError> {
    let mut url = Url::parse(base_url.trim())?;

    let scheme = match url.scheme() {
        "http" => "ws",
        "https" => "wss",
        other => {
            return Err(SupervisorError::InvalidTarget {
                message: format!("Unsupported scheme '{other}' in {base_url}"),
                location: ErrorLocation::from(Location::caller()),
            });
        }
    };

    if url.host_str().is_none_or(str::is_empty) {
        return Err(SupervisorError::InvalidTarget {
            message: format!("No host in {base_url}"),
            location: ErrorLocation::from(Location::caller()),
        });
    }

    if url.set_scheme(scheme).is_err() {
        return Err(SupervisorError::InvalidTarget {
            message: format!("Cannot use {scheme} for {base_url}"),
            location: ErrorLocation::from(Location::caller()),
        });
    }

    let prefix = url.path().trim_end_matches('/').to_string();
    url.set_path(&format!("{prefix}{WEBSOCKET_API_PATH}"));
    url.set_query(None);
    url.set_fragment(None);

    Ok(url.to_string())
}
