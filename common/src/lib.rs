//! Shared primitives for the remote display workspace.
//!
//! Everything here is dependency-light and used by every other crate:
//!
//! - [`ErrorLocation`] - file/line/column captured at error construction
//! - [`RedactedToken`] - an access token that never leaks into logs
//!
//! ## Architecture
//!
//! - **common** (this crate): error plumbing and secret handling
//! - **models**: wire frames and display data
//! - **display-core**: transport, supervisor, token provider, display sink
//! - **remote-display**: the kiosk binary wiring everything together

pub mod error;
pub mod redacted_token;

pub use error::error_location::ErrorLocation;
pub use error::redact_error::RedactError;
pub use redacted_token::RedactedToken;

#[cfg(test)]
mod tests;
