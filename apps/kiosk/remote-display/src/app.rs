//! Wires configuration, surface and core together.

use crate::error::RemoteDisplayError;
use crate::surface::HeadlessSurface;

use display_core::config::DisplayConfig;
use display_core::supervisor::SupervisorState;
use display_core::{ConnectionSlot, DisplaySink, DisplaySurface, Supervisor, TokenProvider};

use std::sync::Arc;

use log::info;

pub struct Kiosk {
    supervisor: Supervisor,
    display_id: String,
}

impl Kiosk {
    /// Build the kiosk around the headless surface described by `config`.
    pub fn from_config(config: &DisplayConfig) -> Result<Self, RemoteDisplayError> {
        let surface: Arc<dyn DisplaySurface> = Arc::new(HeadlessSurface::from_config(&config.surface));
        Self::with_surface(config, surface)
    }

    /// Build the kiosk around any surface.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteDisplayError::Config`] when the server URL or display
    /// id is missing.
    pub fn with_surface(
        config: &DisplayConfig,
        surface: Arc<dyn DisplaySurface>,
    ) -> Result<Self, RemoteDisplayError> {
        let options = config.supervisor_options()?;
        let display_id = options.display_id.clone();

        let slot = ConnectionSlot::new();
        let tokens = Arc::new(TokenProvider::new(Arc::clone(&surface), config.token_options()));
        let display = Arc::new(DisplaySink::new(surface, config.display_options()?, slot.clone()));

        Ok(Self {
            supervisor: Supervisor::new(options, tokens, display, slot),
            display_id,
        })
    }

    pub fn display_id(&self) -> &str {
        &self.display_id
    }

    pub fn state(&self) -> SupervisorState {
        self.supervisor.state()
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    pub async fn start(&self) -> Result<(), RemoteDisplayError> {
        info!("Starting display {}", self.display_id);
        self.supervisor.initialize().await?;
        Ok(())
    }

    pub async fn shutdown(&self) {
        info!("Shutting down display {}", self.display_id);
        self.supervisor.stop().await;
    }
}
