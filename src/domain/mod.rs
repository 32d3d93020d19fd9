//! Domain layer: store identity, connection handles, the connection
//! registry, and the fan-out broadcaster.
//!
//! This is the core of the gateway: the concurrent-safe mapping from store
//! to live connections and the delivery machinery that routes stream
//! records and peer-relayed messages to them.

pub mod broadcaster;
pub mod connection;
pub mod registry;
pub mod store_id;

pub use broadcaster::Broadcaster;
pub use connection::{ConnId, ConnectionHandle, Frame, SendError};
pub use registry::StoreRegistry;
pub use store_id::StoreId;
