use crate::transport::TransportClient;

use std::sync::Arc;

use log::{debug, info};
use tokio::sync::RwLock;

/// The connection currently published by the supervisor.
///
/// Cloning shares the slot. Readers get the `Arc` and may keep using it after
/// the supervisor has swapped in a newer connection; a torn-down client just
/// answers `ConnectionClosed`.
#[derive(Clone, Default)]
pub struct ConnectionSlot {
    current: Arc<RwLock<Option<Arc<TransportClient>>>>,
}

impl ConnectionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn current(&self) -> Option<Arc<TransportClient>> {
        self.current.read().await.clone()
    }

    /// Make `client` current, returning the one it replaces.
    pub async fn publish(&self, client: Arc<TransportClient>) -> Option<Arc<TransportClient>> {
        let mut current = self.current.write().await;
        info!("Publishing connection to {}", client.url());
        current.replace(client)
    }

    pub async fn clear(&self) -> Option<Arc<TransportClient>> {
        let previous = self.current.write().await.take();
        if previous.is_some() {
            debug!("Cleared current connection");
        }
        previous
    }
}
