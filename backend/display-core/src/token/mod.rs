//! Access token acquisition.
//!
//! The display never logs in itself; it borrows the token the Home Assistant
//! frontend keeps in the view's local storage. The token is cached until a
//! caller forces a refresh, which the supervisor does after an
//! authentication failure.

pub(crate) mod parse;

use crate::HASS_TOKENS_KEY;
use crate::error::token::TokenError;
use crate::surface::{DisplaySurface, call_blocking};
use crate::token::parse::{ParseFailure, parse_stored_token};

use common::{ErrorLocation, RedactedToken};

use std::panic::Location;
use std::sync::Arc;
use std::time::Duration;

use backoff::backoff::{Backoff, Constant};
use log::{debug, info, warn};
use tokio::sync::Mutex;
use tokio::time::sleep as TokioSleep;

const DEFAULT_RETRY_LIMIT: u32 = 10;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct TokenOptions {
    /// Attempts before giving up. Zero is treated as one.
    pub retry_limit: u32,
    pub retry_delay: Duration,
    /// Bound on a single surface read.
    pub read_timeout: Duration,
    pub storage_key: String,
}

impl Default for TokenOptions {
    fn default() -> Self {
        Self {
            retry_limit: DEFAULT_RETRY_LIMIT,
            retry_delay: DEFAULT_RETRY_DELAY,
            read_timeout: DEFAULT_READ_TIMEOUT,
            storage_key: HASS_TOKENS_KEY.to_string(),
        }
    }
}

pub struct TokenProvider {
    surface: Arc<dyn DisplaySurface>,
    options: TokenOptions,
    cached: Mutex<Option<RedactedToken>>,
}

impl TokenProvider {
    pub fn new(surface: Arc<dyn DisplaySurface>, options: TokenOptions) -> Self {
        Self {
            surface,
            options,
            cached: Mutex::new(None),
        }
    }

    /// Return the cached token, or read it from the surface.
    ///
    /// `force` discards the cache first. Concurrent callers share one read.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Unavailable`] once `retry_limit` reads have
    /// failed.
    pub async fn get_token(&self, force: bool) -> Result<RedactedToken, TokenError> {
        let mut cached = self.cached.lock().await;

        if force {
            if cached.take().is_some() {
                info!("Discarding cached access token");
            }
        } else if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }

        let token = self.fetch().await?;
        *cached = Some(token.clone());
        Ok(token)
    }

    /// Forget the cached token without fetching.
    pub async fn clear(&self) {
        self.cached.lock().await.take();
    }

    pub async fn has_cached(&self) -> bool {
        self.cached.lock().await.is_some()
    }

    async fn fetch(&self) -> Result<RedactedToken, TokenError> {
        let attempts = self.options.retry_limit.max(1);
        let mut delay = Constant::new(self.options.retry_delay);

        for attempt in 1..=attempts {
            debug!("Reading access token (attempt {attempt}/{attempts})");

            let key = self.options.storage_key.clone();
            let read = call_blocking(
                &self.surface,
                self.options.read_timeout,
                "local storage read",
                move |surface| surface.read_local_storage(&key),
            )
            .await;

            match read {
                Ok(Some(raw)) => match parse_stored_token(&raw) {
                    Ok(token) => {
                        info!("Access token acquired on attempt {attempt}");
                        return Ok(RedactedToken::new(token));
                    }
                    Err(ParseFailure::MissingField) => {
                        warn!("Stored credential has no access_token (attempt {attempt}/{attempts})");
                    }
                    Err(ParseFailure::Malformed(reason)) => {
                        warn!("Stored credential is malformed (attempt {attempt}/{attempts}): {reason}");
                    }
                },
                Ok(None) => {
                    warn!("No stored credential yet (attempt {attempt}/{attempts})");
                }
                Err(e) => {
                    warn!("Credential read failed (attempt {attempt}/{attempts}): {e}");
                }
            }

            if attempt < attempts {
                if let Some(wait) = delay.next_backoff() {
                    TokioSleep(wait).await;
                }
            }
        }

        Err(TokenError::Unavailable {
            message: format!("No access token after {attempts} attempts"),
            location: ErrorLocation::from(Location::caller()),
        })
    }
}
