//! Gateway configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Kafka consumer tuning beyond broker,
//! topic, and group identity is deliberately left to librdkafka defaults.

use std::net::SocketAddr;

use crate::error::GatewayError;

/// Top-level gateway configuration.
///
/// Loaded once at startup via [`GatewayConfig::from_env`].
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:3000`).
    pub listen_addr: SocketAddr,

    /// Kafka bootstrap servers (comma-separated host:port pairs).
    pub kafka_brokers: String,

    /// Topic carrying the partitioned store events.
    pub kafka_topic: String,

    /// Consumer group identity for the ingestion loop.
    pub kafka_group_id: String,

    /// Whether the `/ws` endpoint requires a verified bearer credential.
    pub auth_required: bool,

    /// Base URL of the external identity verification service.
    pub auth_service_url: String,

    /// Timeout in seconds for a single identity verification call.
    pub auth_timeout_secs: u64,

    /// Capacity of each connection's bounded outbound queue.
    pub session_queue_capacity: usize,
}

impl GatewayConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to sensible defaults when a variable is not set.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] if `LISTEN_ADDR` is set but cannot
    /// be parsed as a [`SocketAddr`].
    pub fn from_env() -> Result<Self, GatewayError> {
        dotenvy::dotenv().ok();

        let listen_addr: SocketAddr = std::env::var("LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
            .parse()
            .map_err(|e| GatewayError::Config(format!("invalid LISTEN_ADDR: {e}")))?;

        let kafka_brokers =
            std::env::var("KAFKA_BROKERS").unwrap_or_else(|_| "localhost:9092".to_string());
        let kafka_topic = std::env::var("KAFKA_TOPIC").unwrap_or_else(|_| "sales".to_string());
        let kafka_group_id =
            std::env::var("KAFKA_GROUP_ID").unwrap_or_else(|_| "storecast-1".to_string());

        let auth_required = parse_env_bool("AUTH_REQUIRED", false);
        let auth_service_url = std::env::var("AUTH_SERVICE_URL")
            .unwrap_or_else(|_| "http://localhost:8081".to_string());
        let auth_timeout_secs = parse_env("AUTH_TIMEOUT_SECS", 5);

        let session_queue_capacity = parse_env("SESSION_QUEUE_CAPACITY", 64);

        Ok(Self {
            listen_addr,
            kafka_brokers,
            kafka_topic,
            kafka_group_id,
            auth_required,
            auth_service_url,
            auth_timeout_secs,
            session_queue_capacity,
        })
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Parses an environment variable as a boolean. Accepts `"true"`, `"1"`,
/// `"false"`, `"0"` (case-insensitive). Returns `default` otherwise.
fn parse_env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key).ok().as_deref() {
        Some("true") | Some("TRUE") | Some("1") => true,
        Some("false") | Some("FALSE") | Some("0") => false,
        _ => default,
    }
}
