//! Kafka consumption loop.
//!
//! One [`IngestLoop`] runs per process. It polls the configured topic,
//! extracts the `store_id` routing key from each record, and hands the raw
//! payload to the [`Broadcaster`] for the matching store. Per-record
//! failures (malformed JSON, missing key) and consumer-level errors are
//! logged and skipped; the loop only exits on process shutdown.
//!
//! Offsets: `auto.offset.reset = latest` with auto-commit, so delivery is
//! at-most-once and a restart skips events published while the process was
//! down. This is a live-broadcast system, not a durable log.

use bytes::Bytes;
use rdkafka::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use tokio_util::sync::CancellationToken;

use crate::config::GatewayConfig;
use crate::domain::{Broadcaster, Frame, StoreId};
use crate::error::GatewayError;

/// Why a record could not be routed.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    /// The record value is not valid JSON.
    #[error("malformed JSON payload: {0}")]
    Malformed(#[from] serde_json::Error),
    /// The record parsed but `store_id` is absent, not a string, or empty.
    #[error("store_id missing or not a non-empty string")]
    MissingKey,
}

/// Long-running consumer of the store event topic.
pub struct IngestLoop {
    consumer: StreamConsumer,
    broadcaster: Broadcaster,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for IngestLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestLoop").finish_non_exhaustive()
    }
}

impl IngestLoop {
    /// Creates the consumer and subscribes to the configured topic.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Kafka`] if the consumer cannot be created
    /// or the subscription fails. This is the one startup error the
    /// process treats as fatal.
    pub fn new(
        config: &GatewayConfig,
        broadcaster: Broadcaster,
        shutdown: CancellationToken,
    ) -> Result<Self, GatewayError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.kafka_brokers)
            .set("group.id", &config.kafka_group_id)
            .set("auto.offset.reset", "latest")
            .set("enable.auto.commit", "true")
            .create()?;
        consumer.subscribe(&[config.kafka_topic.as_str()])?;

        Ok(Self {
            consumer,
            broadcaster,
            shutdown,
        })
    }

    /// Runs the loop until the shutdown token is cancelled.
    pub async fn run(self) {
        tracing::info!("ingestion loop started");
        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => break,
                result = self.consumer.recv() => match result {
                    Ok(record) => {
                        let Some(payload) = record.payload() else {
                            tracing::warn!("record with empty payload, dropping");
                            continue;
                        };
                        if let Err(err) = dispatch(&self.broadcaster, payload).await {
                            tracing::warn!(error = %err, "dropping unroutable record");
                        }
                    }
                    // Broker-level errors are transient; keep polling.
                    Err(err) => tracing::warn!(error = %err, "stream consumer error"),
                }
            }
        }
        tracing::info!("ingestion loop stopped");
    }
}

/// Extracts the routing key and fans the raw payload out to the store's
/// connections. A store with no connections is a quiet no-op.
///
/// # Errors
///
/// Returns [`RouteError`] when the payload cannot be parsed or carries no
/// usable `store_id`. Callers log and continue; this is never fatal.
pub(crate) async fn dispatch(broadcaster: &Broadcaster, payload: &[u8]) -> Result<(), RouteError> {
    let store_id = extract_store_id(payload)?;
    let frame = Frame::classify(Bytes::copy_from_slice(payload));
    let delivered = broadcaster.broadcast_store(&store_id, &frame).await;
    if delivered > 0 {
        tracing::debug!(store_id = %store_id, delivered, "stream event delivered");
    }
    Ok(())
}

/// Checked extraction of the `store_id` routing key from a JSON record.
///
/// # Errors
///
/// Returns [`RouteError::Malformed`] for invalid JSON and
/// [`RouteError::MissingKey`] when the field is absent, not a string, or
/// empty.
fn extract_store_id(payload: &[u8]) -> Result<StoreId, RouteError> {
    let value: serde_json::Value = serde_json::from_slice(payload)?;
    value
        .get("store_id")
        .and_then(serde_json::Value::as_str)
        .and_then(StoreId::new)
        .ok_or(RouteError::MissingKey)
}
