//! In-memory display surface for unit tests.

use crate::error::surface::SurfaceError;
use crate::surface::DisplaySurface;

use common::ErrorLocation;

use std::collections::HashMap;
use std::panic::Location;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;

#[derive(Default)]
pub(crate) struct SurfaceLog {
    pub(crate) current: Option<String>,
    pub(crate) loads: Vec<String>,
    pub(crate) scripts: Vec<String>,
    pub(crate) storage: HashMap<String, Value>,
    pub(crate) reads: usize,
    pub(crate) fail_reads: bool,
}

#[derive(Default)]
pub(crate) struct RecordingSurface {
    log: Mutex<SurfaceLog>,
}

impl RecordingSurface {
    pub(crate) fn showing(url: &str) -> Self {
        let surface = Self::default();
        surface.log().current = Some(url.to_string());
        surface
    }

    pub(crate) fn with_storage(key: &str, value: Value) -> Self {
        let surface = Self::default();
        surface.log().storage.insert(key.to_string(), value);
        surface
    }

    pub(crate) fn log(&self) -> MutexGuard<'_, SurfaceLog> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DisplaySurface for RecordingSurface {
    fn read_local_storage(&self, key: &str) -> Result<Option<Value>, SurfaceError> {
        let mut log = self.log();
        log.reads += 1;
        if log.fail_reads {
            return Err(SurfaceError::Unavailable {
                message: "view not ready".to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        Ok(log.storage.get(key).cloned())
    }

    fn load_url(&self, url: &str) -> Result<(), SurfaceError> {
        let mut log = self.log();
        log.loads.push(url.to_string());
        log.current = Some(url.to_string());
        Ok(())
    }

    fn evaluate_script(&self, script: &str) -> Result<Option<String>, SurfaceError> {
        self.log().scripts.push(script.to_string());
        Ok(None)
    }

    fn current_url(&self) -> Option<String> {
        self.log().current.clone()
    }
}
