//! Display State Sink.
//!
//! Turns navigation requests into surface calls, keeps the last known
//! settings, and schedules the return to the default dashboard after a card
//! has been shown for its time-to-live.

pub mod router;
pub(crate) mod scripts;

pub use router::{EventRouter, spawn_dispatcher};

use crate::commands;
use crate::error::display::DisplayError;
use crate::supervisor::ConnectionSlot;
use crate::surface::{DisplaySurface, call_blocking};
use crate::transport::TransportClient;

use models::DisplaySettings;
use models::settings::join_url;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::spawn as TokioSpawn;
use tokio::task::JoinHandle;
use tokio::time::sleep as TokioSleep;

const DEFAULT_CARD_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_NAVIGATION_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct DisplayOptions {
    /// `http(s)://host:port` of Home Assistant, no trailing slash needed.
    pub base_url: String,
    pub display_id: String,
    /// Time-to-live for a card shown without an explicit expiry.
    pub card_timeout: Duration,
    pub navigation_timeout: Duration,
}

impl DisplayOptions {
    pub fn new(base_url: impl Into<String>, display_id: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            display_id: display_id.into(),
            card_timeout: DEFAULT_CARD_TIMEOUT,
            navigation_timeout: DEFAULT_NAVIGATION_TIMEOUT,
        }
    }
}

#[derive(Default)]
struct PendingRevert {
    /// Bumped on every navigation so a timer that already woke up can tell it
    /// has been superseded.
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

pub struct DisplaySink {
    surface: Arc<dyn DisplaySurface>,
    options: DisplayOptions,
    slot: ConnectionSlot,
    settings: RwLock<DisplaySettings>,
    revert: Mutex<PendingRevert>,
}

impl DisplaySink {
    pub fn new(surface: Arc<dyn DisplaySurface>, options: DisplayOptions, slot: ConnectionSlot) -> Self {
        Self {
            surface,
            options,
            slot,
            settings: RwLock::new(DisplaySettings::default()),
            revert: Mutex::new(PendingRevert::default()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.options.base_url
    }

    pub fn display_id(&self) -> &str {
        &self.options.display_id
    }

    pub fn card_timeout(&self) -> Duration {
        self.options.card_timeout
    }

    pub fn surface(&self) -> &Arc<dyn DisplaySurface> {
        &self.surface
    }

    /// Full page load of `url`, then local storage injection and a report.
    pub async fn navigate(self: &Arc<Self>, url: &str) -> Result<(), DisplayError> {
        self.cancel_pending_revert();
        self.load(url).await?;
        self.report_in_background(url.to_string()).await;
        Ok(())
    }

    /// Show a dashboard path, then return to the default dashboard after
    /// `ttl`. A `None` or zero `ttl` leaves the card up.
    pub async fn navigate_card(
        self: &Arc<Self>,
        path: &str,
        ttl: Option<Duration>,
    ) -> Result<(), DisplayError> {
        let path = path.strip_prefix('/').unwrap_or(path);
        if path.is_empty() {
            warn!("Ignoring card navigation with an empty path");
            return Ok(());
        }

        self.cancel_pending_revert();

        let target = join_url(&self.options.base_url, path);
        let current = self.current_url().await?;

        match current {
            Some(current)
                if self.surface.supports_scripts() && current.starts_with(&self.options.base_url) =>
            {
                debug!("Already on {current}; loading card {path} in page");
                let script = scripts::push_state(path);
                self.run_script(script, "card navigation").await?;
                self.inject_local_storage().await;
            }
            current => {
                debug!(
                    "Current URL {}; loading card {path} by URL",
                    current.as_deref().unwrap_or("(none)")
                );
                self.load(&target).await?;
            }
        }

        self.report_in_background(target).await;

        if let Some(ttl) = ttl.filter(|ttl| !ttl.is_zero()) {
            self.schedule_revert(ttl);
        }

        Ok(())
    }

    /// Load the base URL unless the surface already shows the server, so the
    /// frontend's stored credential becomes readable.
    ///
    /// Returns `true` when a page load was needed.
    pub async fn prime(&self) -> Result<bool, DisplayError> {
        let current = self.current_url().await?;
        if current
            .as_deref()
            .is_some_and(|url| url.starts_with(&self.options.base_url))
        {
            return Ok(false);
        }

        let base_url = self.options.base_url.clone();
        self.load(&base_url).await?;
        Ok(true)
    }

    /// Send `remote_assist_display/update` over the current connection.
    ///
    /// Failures are logged, never returned.
    pub async fn report_current_url(&self, url: &str) {
        match self.slot.current().await {
            Some(client) => self.report_to(&client, url).await,
            None => debug!("No live connection; not reporting {url}"),
        }
    }

    pub(crate) async fn report_to(&self, client: &TransportClient, url: &str) {
        let command = match commands::update_current_url(&self.options.display_id, url) {
            Ok(command) => command,
            Err(e) => {
                warn!("Could not build URL report: {e}");
                return;
            }
        };

        match client.send_command(command).await {
            Ok(_) => debug!("Reported current URL {url}"),
            Err(e) => warn!("Reporting current URL {url} failed: {e}"),
        }
    }

    /// Merge pushed settings into the cache.
    ///
    /// Returns `true` when the default dashboard changed.
    pub fn apply_settings(&self, update: DisplaySettings) -> bool {
        let mut settings = self.settings.write().unwrap_or_else(PoisonError::into_inner);
        let before = settings.default_dashboard.clone();
        settings.merge(update);
        let changed = settings.default_dashboard != before;
        if changed {
            info!(
                "Default dashboard is now {}",
                settings.default_dashboard.as_deref().unwrap_or("(none)")
            );
        }
        changed
    }

    /// Replace the cache with freshly fetched settings.
    pub fn replace_settings(&self, settings: DisplaySettings) {
        *self.settings.write().unwrap_or_else(PoisonError::into_inner) = settings;
    }

    pub fn settings(&self) -> DisplaySettings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn default_dashboard_url(&self) -> String {
        self.settings().dashboard_url(&self.options.base_url)
    }

    pub fn cancel_pending_revert(&self) {
        let mut revert = self.lock_revert();
        revert.generation += 1;
        if let Some(handle) = revert.handle.take() {
            handle.abort();
            debug!("Cancelled pending return to the default dashboard");
        }
    }

    pub fn has_pending_revert(&self) -> bool {
        self.lock_revert().handle.is_some()
    }

    fn schedule_revert(self: &Arc<Self>, ttl: Duration) {
        let mut revert = self.lock_revert();
        revert.generation += 1;
        let generation = revert.generation;
        if let Some(previous) = revert.handle.take() {
            previous.abort();
        }

        let sink = Arc::clone(self);
        revert.handle = Some(TokioSpawn(async move {
            TokioSleep(ttl).await;

            if !sink.claim_revert(generation) {
                return;
            }

            let url = sink.default_dashboard_url();
            info!("Card expired after {ttl:?}; returning to {url}");
            if let Err(e) = sink.navigate(&url).await {
                warn!("Returning to the default dashboard failed: {e}");
            }
        }));
        debug!("Returning to the default dashboard in {ttl:?}");
    }

    /// Detach the timer's own handle so the navigation it triggers does not
    /// abort it.
    fn claim_revert(&self, generation: u64) -> bool {
        let mut revert = self.lock_revert();
        if revert.generation != generation {
            return false;
        }
        revert.handle.take();
        true
    }

    fn lock_revert(&self) -> MutexGuard<'_, PendingRevert> {
        self.revert.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn load(&self, url: &str) -> Result<(), DisplayError> {
        info!("Loading {url}");
        let target = url.to_string();
        call_blocking(
            &self.surface,
            self.options.navigation_timeout,
            "page load",
            move |surface| surface.load_url(&target),
        )
        .await?;

        self.inject_local_storage().await;
        Ok(())
    }

    async fn current_url(&self) -> Result<Option<String>, DisplayError> {
        call_blocking(
            &self.surface,
            self.options.navigation_timeout,
            "current URL lookup",
            |surface| Ok(surface.current_url()),
        )
        .await
    }

    async fn run_script(&self, script: String, what: &'static str) -> Result<(), DisplayError> {
        call_blocking(
            &self.surface,
            self.options.navigation_timeout,
            what,
            move |surface| surface.evaluate_script(&script),
        )
        .await
        .map(|_| ())
    }

    /// Write device identity and view settings into local storage.
    async fn inject_local_storage(&self) {
        if !self.surface.supports_scripts() {
            return;
        }
        let script = scripts::local_storage(&self.options.display_id, &self.settings());
        if let Err(e) = self.run_script(script, "local storage injection").await {
            warn!("Setting local storage failed: {e}");
        }
    }

    async fn report_in_background(self: &Arc<Self>, url: String) {
        let Some(client) = self.slot.current().await else {
            debug!("No live connection; not reporting {url}");
            return;
        };

        let sink = Arc::clone(self);
        TokioSpawn(async move {
            sink.report_to(&client, &url).await;
        });
    }
}
