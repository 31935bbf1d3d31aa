//! Connection core for a Home Assistant remote display.
//!
//! - [`token`] - reads the access token out of the display surface
//! - [`transport`] - one authenticated WebSocket session with id-routed commands
//! - [`supervisor`] - keeps a registered, subscribed session alive
//! - [`display`] - applies navigation to the surface and reports it back
//! - [`config`] - persisted configuration and environment overrides

pub mod commands;
pub mod config;
pub mod display;
pub mod error;
pub mod supervisor;
pub mod surface;
pub mod token;
pub mod transport;

#[cfg(test)]
mod tests;

pub use display::{DisplayOptions, DisplaySink};
pub use supervisor::{ConnectionSlot, ReconnectPolicy, Supervisor, SupervisorOptions};
pub use surface::DisplaySurface;
pub use token::{TokenOptions, TokenProvider};
pub use transport::{EventHandler, SubscriptionHandle, TransportClient, TransportOptions};

pub const WEBSOCKET_API_PATH: &str = "/api/websocket";

/// Local storage key holding the frontend's auth tokens.
pub const HASS_TOKENS_KEY: &str = "hassTokens";
pub const BROWSER_MOD_ID_KEY: &str = "browser_mod-browser-id";
pub const DISPLAY_ID_KEY: &str = "remote_assist_display_id";
pub const DISPLAY_SETTINGS_KEY: &str = "remote_assist_display_settings";
