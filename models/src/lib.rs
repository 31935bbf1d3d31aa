//! Domain models for the remote display.
//!
//! Pure data structures shared by the transport, the supervisor and the display
//! sink. Models carry parsing and validation but no I/O.
//!
//! - [`protocol`] - Home Assistant WebSocket frames
//! - [`command`] - outbound commands and their builder
//! - [`settings`] - server-declared display settings
//! - [`event`] - decoded subscription events

pub mod command;
pub mod error;
pub mod event;
pub mod protocol;
pub mod settings;

pub use command::Command;
pub use command::builder::CommandBuilder;
pub use common::ErrorLocation;
pub use error::model_error::ModelError;
pub use event::DisplayEvent;
pub use protocol::{AuthFrame, InboundMessage, OutboundFrame, ServerError};
pub use settings::DisplaySettings;

#[cfg(test)]
mod tests;
