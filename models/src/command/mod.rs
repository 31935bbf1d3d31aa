pub mod builder;

use serde::Serialize;
use serde_json::{Map, Value};

/// A WebSocket API command without its message id.
///
/// The transport assigns the id when the command is sent; `kind` becomes the
/// frame's `type` and every parameter is flattened next to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Command {
    #[serde(rename = "type")]
    pub(crate) kind: String,
    #[serde(flatten)]
    pub(crate) params: Map<String, Value>,
}

impl Command {
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }
}
