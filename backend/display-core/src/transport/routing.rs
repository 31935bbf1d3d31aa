//! Id allocation and the pending/subscription tables of one client.

use crate::error::transport::TransportError;
use crate::transport::handler::EventHandler;

use models::Command;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::debug;
use serde_json::Value;
use tokio::sync::oneshot;

pub(crate) type Responder = oneshot::Sender<Result<Value, TransportError>>;

pub(crate) struct Subscription {
    pub(crate) handler: Arc<dyn EventHandler>,
    pub(crate) request: Command,
}

pub(crate) struct RoutingTable {
    next_id: u64,
    pending: HashMap<u64, Responder>,
    subscriptions: HashMap<u64, Subscription>,
    /// Set by teardown; no new entries are accepted until the next connect.
    closed: bool,
}

impl RoutingTable {
    pub(crate) fn new() -> Self {
        Self {
            next_id: 1,
            pending: HashMap::new(),
            subscriptions: HashMap::new(),
            closed: true,
        }
    }

    pub(crate) fn reopen(&mut self) {
        self.closed = false;
    }

    /// Allocate an id and park a responder under it.
    pub(crate) fn register(
        &mut self,
        subscription: Option<Subscription>,
    ) -> Result<(u64, oneshot::Receiver<Result<Value, TransportError>>), TransportError> {
        if self.closed {
            return Err(TransportError::closed());
        }

        let id = self.next_id;
        self.next_id += 1;

        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);
        if let Some(subscription) = subscription {
            self.subscriptions.insert(id, subscription);
        }

        Ok((id, rx))
    }

    pub(crate) fn take_pending(&mut self, id: u64) -> Option<Responder> {
        self.pending.remove(&id)
    }

    pub(crate) fn remove_subscription(&mut self, id: u64) -> Option<Subscription> {
        self.subscriptions.remove(&id)
    }

    pub(crate) fn handler(&self, id: u64) -> Option<Arc<dyn EventHandler>> {
        self.subscriptions
            .get(&id)
            .map(|subscription| Arc::clone(&subscription.handler))
    }

    pub(crate) fn requests(&self) -> Vec<Command> {
        let mut ids: Vec<_> = self.subscriptions.keys().copied().collect();
        ids.sort_unstable();
        ids.iter()
            .filter_map(|id| self.subscriptions.get(id))
            .map(|subscription| subscription.request.clone())
            .collect()
    }

    pub(crate) fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Close the table and fail everything still waiting.
    pub(crate) fn teardown(&mut self) {
        self.closed = true;

        let pending = self.pending.len();
        for (_, responder) in self.pending.drain() {
            let _ = responder.send(Err(TransportError::closed()));
        }
        self.subscriptions.clear();

        if pending > 0 {
            debug!("Resolved {pending} pending command(s) with ConnectionClosed");
        }
    }
}

pub(crate) fn lock(table: &Mutex<RoutingTable>) -> MutexGuard<'_, RoutingTable> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Removes the pending entry when the waiting future goes away early.
pub(crate) struct PendingGuard<'a> {
    pub(crate) table: &'a Mutex<RoutingTable>,
    pub(crate) id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        lock(self.table).take_pending(self.id);
    }
}
