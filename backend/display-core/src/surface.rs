//! Boundary to the web view that actually shows Home Assistant.
//!
//! Implementations are blocking (a browser bridge, a file, a test double).
//! The core never calls them on an async worker; every call goes through
//! [`call_blocking`], which runs it on the blocking pool under a timeout.

use crate::error::display::DisplayError;
use crate::error::surface::SurfaceError;

use common::ErrorLocation;

use std::panic::Location;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::task::spawn_blocking;
use tokio::time::timeout;

pub trait DisplaySurface: Send + Sync {
    /// Value stored under `key` in the view's local storage, if any.
    ///
    /// Strings are returned as `Value::String` exactly as stored.
    fn read_local_storage(&self, key: &str) -> Result<Option<Value>, SurfaceError>;

    /// Full page load.
    fn load_url(&self, url: &str) -> Result<(), SurfaceError>;

    /// Run a script in the current page and return its string result.
    fn evaluate_script(&self, script: &str) -> Result<Option<String>, SurfaceError>;

    fn current_url(&self) -> Option<String>;

    /// `false` for surfaces that cannot run scripts; cards are then shown by
    /// full page load and local storage is left alone.
    fn supports_scripts(&self) -> bool {
        true
    }
}

/// Run `f` against the surface on the blocking pool, bounded by `limit`.
#[track_caller]
pub(crate) fn call_blocking<T, F>(
    surface: &Arc<dyn DisplaySurface>,
    limit: Duration,
    what: &'static str,
    f: F,
) -> impl Future<Output = Result<T, DisplayError>> + Send + 'static
where
    T: Send + 'static,
    F: FnOnce(&dyn DisplaySurface) -> Result<T, SurfaceError> + Send + 'static,
{
    let location = ErrorLocation::from(Location::caller());
    let surface = Arc::clone(surface);

    async move {
        let task = spawn_blocking(move || f(surface.as_ref()));

        match timeout(limit, task).await {
            Ok(Ok(result)) => result.map_err(DisplayError::from),
            Ok(Err(join_error)) => Err(DisplayError::from(join_error)),
            Err(_) => Err(DisplayError::Timeout {
                message: format!("{what} did not finish within {limit:?}"),
                location,
            }),
        }
    }
}
