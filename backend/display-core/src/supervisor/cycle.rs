use crate::commands;
use crate::display::spawn_dispatcher;
use crate::error::CoreError;
use crate::error::transport::TransportError;
use crate::supervisor::{Inner, SupervisorState};
use crate::transport::{TransportClient, TransportOptions};

use common::ErrorLocation;
use models::DisplaySettings;

use std::panic::Location;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use log::{debug, error, info, warn};
use tokio::select;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval, sleep as TokioSleep, timeout};

/// Aborts the dispatcher when a cycle ends, however it ends.
struct DispatcherGuard(JoinHandle<()>);

impl Drop for DispatcherGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// How a cycle that did not fail came to an end.
enum CycleEnd {
    /// The connection was set up and later dropped.
    Ended,
    Stopped,
}

pub(crate) async fn run(inner: Arc<Inner>, ws_url: String, mut shutdown: watch::Receiver<bool>) {
    let mut backoff = inner.options.reconnect.backoff();
    let mut force_token = false;

    loop {
        if *shutdown.borrow() {
            break;
        }

        inner.set_state(SupervisorState::Connecting);

        let outcome = run_cycle(&inner, &ws_url, force_token, &mut shutdown).await;

        inner.slot.clear().await;

        match outcome {
            Ok(CycleEnd::Stopped) => break,
            Ok(CycleEnd::Ended) => {
                info!("Connection to {ws_url} ended; reconnecting");
                backoff.reset();
                force_token = false;
            }
            Err(e) => {
                force_token = needs_fresh_token(&e);
                let attempts = inner.attempts.fetch_add(1, Ordering::SeqCst) + 1;
                if force_token {
                    warn!("Authentication problem (attempt {attempts}), refreshing token: {e}");
                } else {
                    warn!("Connection attempt {attempts} failed: {e}");
                }
            }
        }

        let delay = backoff
            .next_backoff()
            .unwrap_or_else(|| inner.options.reconnect.ceiling());
        inner.set_state(SupervisorState::Backoff);
        info!("Reconnecting in {delay:?}");

        select! {
            _ = shutdown.wait_for(|stop| *stop) => break,
            _ = TokioSleep(delay) => {}
        }
    }

    debug!("Supervisor loop exited");
}

fn needs_fresh_token(error: &CoreError) -> bool {
    match error {
        CoreError::Token(_) => true,
        CoreError::Transport(e) => e.is_auth_failure(),
        _ => false,
    }
}

/// One connection from token to termination.
///
/// A stop request ends the cycle at any step. A connected client is always
/// closed with `disconnect()` before this returns.
async fn run_cycle(
    inner: &Arc<Inner>,
    ws_url: &str,
    force_token: bool,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<CycleEnd, CoreError> {
    let token = select! {
        _ = shutdown.wait_for(|stop| *stop) => return Ok(CycleEnd::Stopped),
        token = inner.tokens.get_token(force_token) => token?,
    };

    let client = Arc::new(TransportClient::new(
        ws_url,
        token,
        TransportOptions {
            handshake_timeout: inner.options.handshake_timeout,
        },
    ));

    select! {
        _ = async { drop(shutdown.wait_for(|stop| *stop).await) } => {
            client.disconnect().await;
            return Ok(CycleEnd::Stopped);
        }
        connected = client.connect() => connected?,
    }

    let outcome = select! {
        _ = shutdown.wait_for(|stop| *stop) => {
            debug!("Stop requested; closing {ws_url}");
            Ok(CycleEnd::Stopped)
        }
        outcome = set_up_and_hold(inner, &client) => outcome.map(|()| CycleEnd::Ended),
    };
    client.disconnect().await;
    outcome
}

async fn set_up_and_hold(inner: &Arc<Inner>, client: &Arc<TransportClient>) -> Result<(), CoreError> {
    let options = &inner.options;
    let display_id = options.display_id.as_str();

    let registered = bounded(
        inner,
        "register",
        client.send_command(commands::register(display_id, &options.hostname).map_err(TransportError::from)?),
    )
    .await?;
    debug!("Registered {display_id}: {registered}");

    let response = bounded(
        inner,
        "settings",
        client.send_command(commands::settings(display_id).map_err(TransportError::from)?),
    )
    .await?;
    let settings = DisplaySettings::from_settings_response(&response).map_err(TransportError::from)?;
    info!(
        "Settings for {display_id}: dashboard {}",
        settings.default_dashboard.as_deref().unwrap_or("(none)")
    );
    inner.display.replace_settings(settings);

    let dashboard = inner.display.default_dashboard_url();
    match inner.display.navigate(&dashboard).await {
        Ok(()) => inner.display.report_to(client, &dashboard).await,
        Err(e) => error!("Loading default dashboard {dashboard} failed: {e}"),
    }

    let (router, dispatcher) = spawn_dispatcher(Arc::clone(&inner.display));
    let _dispatcher = DispatcherGuard(dispatcher);
    let subscription = bounded(
        inner,
        "subscribe",
        client.subscribe(router, commands::connect(display_id).map_err(TransportError::from)?),
    )
    .await?;
    debug!("Listening for events on subscription {}", subscription.id());

    inner.slot.publish(Arc::clone(client)).await;
    inner.attempts.store(0, Ordering::SeqCst);
    inner.set_state(SupervisorState::Running);
    info!("Display {display_id} is connected");

    hold(inner, client).await;
    Ok(())
}

/// Wait until the connection ends, pinging it if a heartbeat is configured.
async fn hold(inner: &Inner, client: &TransportClient) {
    let Some(period) = inner.options.heartbeat_interval else {
        client.closed().await;
        return;
    };

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        select! {
            _ = client.closed() => return,
            _ = ticker.tick() => {
                let ping = match commands::ping() {
                    Ok(ping) => ping,
                    Err(e) => {
                        error!("Could not build ping: {e}");
                        continue;
                    }
                };

                match timeout(inner.options.command_timeout, client.send_command(ping)).await {
                    Ok(Ok(_)) => debug!("Heartbeat ok"),
                    Ok(Err(e)) => {
                        warn!("Heartbeat failed: {e}");
                        client.disconnect().await;
                        return;
                    }
                    Err(_) => {
                        warn!(
                            "No pong within {:?}; dropping connection",
                            inner.options.command_timeout
                        );
                        client.disconnect().await;
                        return;
                    }
                }
            }
        }
    }
}

async fn bounded<T>(
    inner: &Inner,
    step: &'static str,
    request: impl Future<Output = Result<T, TransportError>>,
) -> Result<T, TransportError> {
    let limit = inner.options.command_timeout;
    match timeout(limit, request).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Transport {
            message: format!("{step} got no response within {limit:?}"),
            location: ErrorLocation::from(Location::caller()),
        }),
    }
}
