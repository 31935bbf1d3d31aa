use crate::ErrorLocation;
use crate::command::Command;
use crate::error::model_error::ModelError;

use std::panic::Location;

use serde_json::{Map, Value};

/// Keys owned by the frame envelope; a parameter may not shadow them.
const RESERVED_KEYS: [&str; 2] = ["id", "type"];

/// Builder for validated [`Command`] instances.
#[derive(Debug, Default)]
pub struct CommandBuilder {
    kind: Option<String>,
    params: Map<String, Value>,
}

impl CommandBuilder {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: Some(kind.into()),
            params: Map::new(),
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Adds the parameter only when a value is present.
    pub fn with_optional_param(self, key: impl Into<String>, value: Option<impl Into<Value>>) -> Self {
        match value {
            Some(value) => self.with_param(key, value),
            None => self,
        }
    }

    #[track_caller]
    pub fn build(self) -> Result<Command, ModelError> {
        let kind = self.kind.ok_or_else(|| ModelError::Validation {
            message: String::from("Command type is required"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        if kind.trim().is_empty() {
            return Err(ModelError::Validation {
                message: String::from("Command type cannot be empty"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        if let Some(key) = RESERVED_KEYS
            .iter()
            .find(|key| self.params.contains_key(**key))
        {
            return Err(ModelError::Validation {
                message: format!("Reserved parameter name: {key}"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        Ok(Command {
            kind,
            params: self.params,
        })
    }
}
