use crate::error::event::EventError;

use serde_json::Value;

/// Callback for subscription events.
///
/// Runs on the connection's receive loop, so it must not block. Panics and
/// returned errors are logged and the loop carries on.
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: Value) -> Result<(), EventError>;
}

impl<F> EventHandler for F
where
    F: Fn(Value) -> Result<(), EventError> + Send + Sync,
{
    fn handle(&self, event: Value) -> Result<(), EventError> {
        self(event)
    }
}

/// Returned by a successful subscribe; the id is the subscribe command's id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    id: u64,
}

impl SubscriptionHandle {
    pub(crate) fn new(id: u64) -> Self {
        Self { id }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}
