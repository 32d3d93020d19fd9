//! Concurrent connection registry with per-store fine-grained locking.
//!
//! [`StoreRegistry`] maps each [`StoreId`] to the set of live connections
//! registered under it. The outer map is guarded by one [`RwLock`] and each
//! store's set by its own, so registration traffic on unrelated stores does
//! not serialize.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::connection::{ConnId, ConnectionHandle};
use super::StoreId;

type StoreSet = Arc<RwLock<HashMap<ConnId, ConnectionHandle>>>;

/// Central store for all live connections, keyed by store.
///
/// # Concurrency
///
/// - Registration, unregistration, and snapshots may run concurrently from
///   the accept path, session cleanup, and broadcaster eviction.
/// - Mutations on different stores are concurrent; mutations on the same
///   store are serialized by that store's lock.
/// - [`StoreRegistry::snapshot`] clones the set so callers never hold a
///   lock across network writes.
#[derive(Debug, Default)]
pub struct StoreRegistry {
    stores: RwLock<HashMap<StoreId, StoreSet>>,
}

impl StoreRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a connection under its store, creating the store's set if
    /// absent. Never fails; registering the same handle twice is a no-op
    /// overwrite keyed by [`ConnId`].
    pub async fn register(&self, handle: ConnectionHandle) {
        loop {
            let set = {
                let map = self.stores.read().await;
                map.get(&handle.store_id).cloned()
            };
            let set = match set {
                Some(set) => set,
                None => {
                    let mut map = self.stores.write().await;
                    Arc::clone(
                        map.entry(handle.store_id.clone())
                            .or_insert_with(|| Arc::new(RwLock::new(HashMap::new()))),
                    )
                }
            };
            set.write().await.insert(handle.id, handle.clone());

            // A last-member unregister may have pruned this set between the
            // lookup above and the insert, leaving the handle in a set the
            // outer map no longer holds. Verify the entry is still current;
            // the insert into an orphaned set is harmless, so just retry.
            let map = self.stores.read().await;
            if map
                .get(&handle.store_id)
                .is_some_and(|current| Arc::ptr_eq(current, &set))
            {
                return;
            }
        }
    }

    /// Removes a connection from its store's set if present.
    ///
    /// Idempotent: removing an absent connection or an unknown store is a
    /// no-op. The store's entry is pruned from the outer map once its set
    /// drains empty.
    pub async fn unregister(&self, store_id: &StoreId, conn_id: ConnId) {
        let set = {
            let map = self.stores.read().await;
            map.get(store_id).cloned()
        };
        let Some(set) = set else {
            return;
        };
        let now_empty = {
            let mut conns = set.write().await;
            conns.remove(&conn_id);
            conns.is_empty()
        };
        if now_empty {
            let mut map = self.stores.write().await;
            // Re-check under the outer write lock: a concurrent register may
            // have repopulated the set, or replaced the entry entirely.
            let should_prune = match map.get(store_id) {
                Some(current) => Arc::ptr_eq(current, &set) && current.read().await.is_empty(),
                None => false,
            };
            if should_prune {
                map.remove(store_id);
            }
        }
    }

    /// Returns a clone of the store's current connection set, suitable for
    /// iteration without holding any registry lock during I/O.
    ///
    /// Returns an empty vec for stores with no registered connections.
    pub async fn snapshot(&self, store_id: &StoreId) -> Vec<ConnectionHandle> {
        let set = {
            let map = self.stores.read().await;
            map.get(store_id).cloned()
        };
        match set {
            Some(set) => set.read().await.values().cloned().collect(),
            None => Vec::new(),
        }
    }

    /// Returns the number of connections registered under a store.
    pub async fn connection_count(&self, store_id: &StoreId) -> usize {
        self.snapshot(store_id).await.len()
    }

    /// Returns the number of stores with at least one connection.
    pub async fn store_count(&self) -> usize {
        self.stores.read().await.len()
    }

    /// Returns the total number of live connections across all stores.
    pub async fn total_connections(&self) -> usize {
        let map = self.stores.read().await;
        let mut total = 0;
        for set in map.values() {
            total += set.read().await.len();
        }
        total
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn store(id: &str) -> StoreId {
        let Some(id) = StoreId::new(id) else {
            panic!("valid store id");
        };
        id
    }

    fn handle(id: &str) -> ConnectionHandle {
        let (handle, rx) = ConnectionHandle::new(store(id), 8);
        // Keep the session side alive for the duration of the test.
        std::mem::forget(rx);
        handle
    }

    #[tokio::test]
    async fn register_and_snapshot() {
        let registry = StoreRegistry::new();
        let conn = handle("s1");
        let id = conn.id;
        registry.register(conn).await;

        let snap = registry.snapshot(&store("s1")).await;
        assert_eq!(snap.len(), 1);
        assert!(snap.iter().any(|h| h.id == id));
    }

    #[tokio::test]
    async fn snapshot_of_unknown_store_is_empty() {
        let registry = StoreRegistry::new();
        assert!(registry.snapshot(&store("nope")).await.is_empty());
    }

    #[tokio::test]
    async fn snapshot_is_scoped_to_store() {
        let registry = StoreRegistry::new();
        let a = handle("s1");
        let b = handle("s2");
        let a_id = a.id;
        registry.register(a).await;
        registry.register(b).await;

        let snap = registry.snapshot(&store("s1")).await;
        assert_eq!(snap.len(), 1);
        assert!(snap.iter().all(|h| h.id == a_id));
    }

    #[tokio::test]
    async fn unregister_removes_connection() {
        let registry = StoreRegistry::new();
        let conn = handle("s1");
        let id = conn.id;
        registry.register(conn).await;
        registry.unregister(&store("s1"), id).await;

        assert!(registry.snapshot(&store("s1")).await.is_empty());
    }

    #[tokio::test]
    async fn unregister_is_idempotent() {
        let registry = StoreRegistry::new();
        let conn = handle("s1");
        let id = conn.id;
        registry.register(conn).await;
        registry.unregister(&store("s1"), id).await;
        registry.unregister(&store("s1"), id).await;
        registry.unregister(&store("missing"), id).await;

        assert_eq!(registry.store_count().await, 0);
    }

    #[tokio::test]
    async fn empty_store_set_is_pruned() {
        let registry = StoreRegistry::new();
        let a = handle("s1");
        let b = handle("s1");
        let (a_id, b_id) = (a.id, b.id);
        registry.register(a).await;
        registry.register(b).await;
        assert_eq!(registry.store_count().await, 1);

        registry.unregister(&store("s1"), a_id).await;
        assert_eq!(registry.store_count().await, 1);
        registry.unregister(&store("s1"), b_id).await;
        assert_eq!(registry.store_count().await, 0);
    }

    #[tokio::test]
    async fn counts_track_registrations() {
        let registry = StoreRegistry::new();
        registry.register(handle("s1")).await;
        registry.register(handle("s1")).await;
        registry.register(handle("s2")).await;

        assert_eq!(registry.connection_count(&store("s1")).await, 2);
        assert_eq!(registry.connection_count(&store("s2")).await, 1);
        assert_eq!(registry.store_count().await, 2);
        assert_eq!(registry.total_connections().await, 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn register_survives_concurrent_prune_of_last_member() {
        let registry = Arc::new(StoreRegistry::new());

        // Race a fresh registration against the unregister that empties the
        // store's set and prunes it from the outer map. The new connection
        // must be visible in the snapshot no matter how the two interleave.
        for _ in 0..1000 {
            let old = handle("s1");
            let (old_store, old_id) = (old.store_id.clone(), old.id);
            registry.register(old).await;

            let fresh = handle("s1");
            let fresh_id = fresh.id;

            let reg = Arc::clone(&registry);
            let registering = tokio::spawn(async move { reg.register(fresh).await });
            let reg = Arc::clone(&registry);
            let pruning =
                tokio::spawn(async move { reg.unregister(&old_store, old_id).await });
            let _ = registering.await;
            let _ = pruning.await;

            let snap = registry.snapshot(&store("s1")).await;
            assert!(snap.iter().any(|h| h.id == fresh_id));

            registry.unregister(&store("s1"), fresh_id).await;
        }
    }

    #[tokio::test]
    async fn concurrent_register_unregister_loses_nothing() {
        let registry = Arc::new(StoreRegistry::new());
        let mut tasks = tokio::task::JoinSet::new();

        for i in 0..8 {
            let registry = Arc::clone(&registry);
            tasks.spawn(async move {
                let name = format!("store-{}", i % 2);
                for _ in 0..50 {
                    let conn = {
                        let Some(sid) = StoreId::new(&name) else {
                            panic!("valid store id");
                        };
                        let (h, rx) = ConnectionHandle::new(sid, 1);
                        std::mem::forget(rx);
                        h
                    };
                    let (sid, cid) = (conn.store_id.clone(), conn.id);
                    registry.register(conn).await;
                    registry.unregister(&sid, cid).await;
                }
            });
        }
        while tasks.join_next().await.is_some() {}

        // Every task unregistered what it registered.
        assert_eq!(registry.total_connections().await, 0);
        assert_eq!(registry.store_count().await, 0);
    }
}
