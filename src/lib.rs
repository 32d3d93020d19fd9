//! # storecast
//!
//! WebSocket fan-out gateway bridging a partitioned sales event stream to
//! live per-store clients.
//!
//! Every client connects with a `storeId` and receives, best-effort
//! at-most-once, every event published for that store on the Kafka topic.
//! Clients of the same store can also relay messages to each other. All
//! event semantics live with the producers — this service only extracts
//! the `store_id` routing key and pushes opaque payloads.
//!
//! ## Architecture
//!
//! ```text
//! Kafka topic ──► IngestLoop (ingest/)
//!                     │ store_id
//!                     ▼
//!               StoreRegistry (domain/) ◄── register/unregister ── Sessions (ws/)
//!                     │ snapshot
//!                     ▼
//!               Broadcaster (domain/) ──► N connection queues ──► clients
//! ```
//!
//! The registry is the only shared mutable state; sessions, the accept
//! path, and the broadcaster's eviction path mutate it concurrently.

pub mod api;
pub mod app_state;
pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod ingest;
pub mod ws;
