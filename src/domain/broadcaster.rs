//! Fan-out of raw payloads to every connection of a store.
//!
//! Delivery is independent per destination: a write failure on one
//! connection evicts that connection and never blocks delivery to the
//! rest. Eviction closes the connection and removes it from the
//! [`StoreRegistry`] in the same pass.

use std::sync::Arc;

use super::connection::{ConnectionHandle, Frame};
use super::registry::StoreRegistry;
use super::StoreId;

/// Delivers payloads to a store's live connections, evicting dead ones.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    registry: Arc<StoreRegistry>,
}

impl Broadcaster {
    /// Creates a broadcaster backed by the given registry.
    #[must_use]
    pub fn new(registry: Arc<StoreRegistry>) -> Self {
        Self { registry }
    }

    /// Attempts delivery of `frame` to every handle in `connections`.
    ///
    /// A failed write (full queue or terminated session) closes that
    /// connection and unregisters it under `store_id`. Returns the number
    /// of successful deliveries, for logging only.
    pub async fn broadcast(
        &self,
        store_id: &StoreId,
        connections: &[ConnectionHandle],
        frame: &Frame,
    ) -> usize {
        let mut delivered = 0;
        for conn in connections {
            match conn.send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(err) => {
                    tracing::warn!(
                        store_id = %store_id,
                        conn_id = %conn.id,
                        error = %err,
                        "write failed, evicting connection"
                    );
                    conn.close();
                    self.registry.unregister(store_id, conn.id).await;
                }
            }
        }
        delivered
    }

    /// Snapshots the store's current set and broadcasts to it.
    ///
    /// Returns the number of successful deliveries; zero when no
    /// connection is registered under the store.
    pub async fn broadcast_store(&self, store_id: &StoreId, frame: &Frame) -> usize {
        let connections = self.registry.snapshot(store_id).await;
        if connections.is_empty() {
            return 0;
        }
        self.broadcast(store_id, &connections, frame).await
    }
}
