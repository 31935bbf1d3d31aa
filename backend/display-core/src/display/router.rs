//! Subscription events into display actions.
//!
//! The handler runs on the receive loop and must not wait on the surface, so
//! it only decodes and queues. One dispatcher task per connection applies the
//! queue in order. The queue is unbounded: it lives only as long as its
//! connection, and dropping a navigation would leave the display wrong.

use crate::display::DisplaySink;
use crate::error::event::EventError;
use crate::transport::EventHandler;

use models::DisplayEvent;

use std::sync::Arc;

use log::{debug, info, warn};
use serde_json::Value;
use tokio::spawn as TokioSpawn;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub struct EventRouter {
    display_id: String,
    events: mpsc::UnboundedSender<DisplayEvent>,
}

impl EventHandler for EventRouter {
    fn handle(&self, event: Value) -> Result<(), EventError> {
        let parsed = DisplayEvent::parse(&event, &self.display_id)
            .map_err(|e| EventError::rejected(e.to_string()))?;

        if let DisplayEvent::Ignored { reason } = &parsed {
            debug!("Ignoring event ({reason}): {event}");
            return Ok(());
        }

        self.events
            .send(parsed)
            .map_err(|e| EventError::rejected(format!("Event dispatcher stopped: {e}")))
    }
}

/// Build a router for one connection and start the task that drains it.
///
/// The task ends when the router is dropped, which happens when the
/// connection tears down its subscriptions.
pub fn spawn_dispatcher(sink: Arc<DisplaySink>) -> (EventRouter, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let router = EventRouter {
        display_id: sink.display_id().to_string(),
        events: tx,
    };

    (router, TokioSpawn(dispatch_events(sink, rx)))
}

async fn dispatch_events(sink: Arc<DisplaySink>, mut events: mpsc::UnboundedReceiver<DisplayEvent>) {
    while let Some(event) = events.recv().await {
        apply(&sink, event).await;
    }
    debug!("Event dispatcher stopped");
}

async fn apply(sink: &Arc<DisplaySink>, event: DisplayEvent) {
    match event {
        DisplayEvent::NavigateUrl { url } => {
            info!("Server requested {url}");
            if let Err(e) = sink.navigate(&url).await {
                warn!("Navigating to {url} failed: {e}");
            }
        }
        DisplayEvent::NavigateCard { path, expire_time } => {
            let ttl = expire_time.unwrap_or_else(|| sink.card_timeout());
            info!("Server requested card {path} for {ttl:?}");
            if let Err(e) = sink.navigate_card(&path, Some(ttl)).await {
                warn!("Loading card {path} failed: {e}");
            }
        }
        DisplayEvent::SettingsChanged(settings) => {
            if sink.apply_settings(settings) {
                let url = sink.default_dashboard_url();
                if let Err(e) = sink.navigate(&url).await {
                    warn!("Navigating to new default dashboard {url} failed: {e}");
                }
            }
        }
        DisplayEvent::Ignored { .. } => {}
    }
}
