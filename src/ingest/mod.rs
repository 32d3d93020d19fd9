//! Stream ingestion: the Kafka consumption loop and record routing.

pub mod consumer;

pub use consumer::IngestLoop;
