//! Display surface for a kiosk whose browser runs as a separate process.
//!
//! The browser exports its local storage to a JSON file
//! (`RAD_CREDENTIAL_FILE`); page loads are handed to an optional launch
//! command (`RAD_BROWSER_COMMAND`) with the URL appended. Only the newest
//! launched process is kept alive. Scripts cannot be run from here, so every
//! navigation is a full page load.

use common::ErrorLocation;

use display_core::config::SurfaceConfig;
use display_core::error::SurfaceError;
use display_core::{DisplaySurface, HASS_TOKENS_KEY};

use std::io::ErrorKind;
use std::panic::Location;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Mutex, PoisonError, RwLock};
use std::thread::sleep;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use serde_json::Value;
use tokio::process::Child as TokioChild;
use tokio::process::Command as TokioCommand;

/// How long a replaced browser gets to exit before it is left to the runtime.
const EXIT_GRACE: Duration = Duration::from_secs(2);

pub struct HeadlessSurface {
    current: RwLock<Option<String>>,
    credential_file: Option<PathBuf>,
    browser_command: Option<Vec<String>>,
    browser: Mutex<Option<TokioChild>>,
}

impl HeadlessSurface {
    pub fn new(credential_file: Option<PathBuf>, browser_command: Option<&str>) -> Self {
        let browser_command = browser_command
            .map(|command| {
                command
                    .split_whitespace()
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .filter(|parts| !parts.is_empty());

        Self {
            current: RwLock::new(None),
            credential_file,
            browser_command,
            browser: Mutex::new(None),
        }
    }

    pub fn from_config(config: &SurfaceConfig) -> Self {
        Self::new(
            config.credential_file.as_ref().map(PathBuf::from),
            config.browser_command.as_deref(),
        )
    }

    #[cfg(test)]
    pub(crate) fn browser_pid(&self) -> Option<u32> {
        self.browser
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(TokioChild::id)
    }

    /// Start the browser on `url`, replacing the previous one.
    ///
    /// Runs on the blocking pool, so it may wait for the old process to exit.
    #[track_caller]
    fn launch(&self, url: &str) -> Result<(), SurfaceError> {
        let Some((program, args)) = self
            .browser_command
            .as_ref()
            .and_then(|parts| parts.split_first())
        else {
            debug!("No browser command configured; {url} recorded only");
            return Ok(());
        };

        let mut browser = self.browser.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = browser.take() {
            stop_browser(previous);
        }

        let child = TokioCommand::new(program)
            .args(args)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SurfaceError::Io {
                message: format!("Failed to launch {program}: {e}"),
                location: ErrorLocation::from(Location::caller()),
            })?;

        info!("Launched {program} (pid {:?}) for {url}", child.id());
        *browser = Some(child);
        Ok(())
    }
}

/// Kill `child` and reap it once it exits.
fn stop_browser(mut child: TokioChild) {
    let pid = child.id();
    if let Err(e) = child.start_kill() {
        debug!("Browser (pid {pid:?}) already gone: {e}");
    }

    let deadline = Instant::now() + EXIT_GRACE;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                debug!("Browser (pid {pid:?}) exited: {status}");
                return;
            }
            Ok(None) if Instant::now() < deadline => sleep(Duration::from_millis(10)),
            Ok(None) => {
                warn!("Browser (pid {pid:?}) still running after kill");
                return;
            }
            Err(e) => {
                warn!("Could not reap browser (pid {pid:?}): {e}");
                return;
            }
        }
    }
}

impl Drop for HeadlessSurface {
    fn drop(&mut self) {
        if let Some(child) = self
            .browser
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            stop_browser(child);
        }
    }
}

impl DisplaySurface for HeadlessSurface {
    /// The export is either the whole storage (`{"hassTokens": "..."}`) or
    /// the credential object itself.
    fn read_local_storage(&self, key: &str) -> Result<Option<Value>, SurfaceError> {
        let Some(path) = self.credential_file.as_ref() else {
            return Err(SurfaceError::Unavailable {
                message: "No credential file configured".to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        };

        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SurfaceError::from(e)),
        };

        let exported = match serde_json::from_str::<Value>(&contents) {
            Ok(value) => value,
            // Raw value written as-is; let the token parser judge it.
            Err(_) if key == HASS_TOKENS_KEY => return Ok(Some(Value::String(contents))),
            Err(e) => {
                return Err(SurfaceError::Io {
                    message: format!("{} is not JSON: {e}", path.display()),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
        };

        if key == HASS_TOKENS_KEY && exported.get("access_token").is_some() {
            return Ok(Some(exported));
        }

        Ok(exported.get(key).cloned())
    }

    fn load_url(&self, url: &str) -> Result<(), SurfaceError> {
        self.launch(url)?;
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(url.to_string());
        Ok(())
    }

    fn evaluate_script(&self, _script: &str) -> Result<Option<String>, SurfaceError> {
        Err(SurfaceError::Script {
            message: "Headless surface cannot run scripts".to_string(),
            location: ErrorLocation::from(Location::caller()),
        })
    }

    fn current_url(&self) -> Option<String> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn supports_scripts(&self) -> bool {
        false
    }
}
