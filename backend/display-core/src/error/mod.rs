pub mod config;
pub mod display;
pub mod event;
pub mod supervisor;
pub mod surface;
pub mod token;
pub mod transport;

pub use display::DisplayError;
pub use event::EventError;
pub use supervisor::SupervisorError;
pub use surface::SurfaceError;
pub use token::TokenError;
pub use transport::TransportError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    #[error(transparent)]
    Display(#[from] DisplayError),

    #[error(transparent)]
    Config(#[from] config::ConfigError),
}
