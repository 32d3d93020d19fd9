//! WebSocket layer: upgrade handling and per-connection sessions.
//!
//! The endpoint at `/ws?storeId=...` upgrades to a persistent connection
//! that receives every event published for its store and can relay
//! messages to the store's other clients.

pub mod handler;
pub mod session;
