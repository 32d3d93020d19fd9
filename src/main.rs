//! storecast server entry point.
//!
//! Starts the Kafka ingestion loop and the Axum HTTP server with the
//! WebSocket endpoint, wired together through the shared registry.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::get;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use storecast::api;
use storecast::app_state::AppState;
use storecast::auth::{HttpIdentityVerifier, IdentityVerifier};
use storecast::config::GatewayConfig;
use storecast::domain::{Broadcaster, StoreRegistry};
use storecast::ingest::IngestLoop;
use storecast::ws::handler::ws_handler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = Arc::new(GatewayConfig::from_env()?);
    tracing::info!(addr = %config.listen_addr, topic = %config.kafka_topic, "starting storecast");

    // Build domain layer
    let registry = Arc::new(StoreRegistry::new());
    let broadcaster = Broadcaster::new(Arc::clone(&registry));
    let shutdown = CancellationToken::new();

    // Identity gate (optional)
    let verifier: Option<Arc<dyn IdentityVerifier>> = if config.auth_required {
        let http = HttpIdentityVerifier::new(
            &config.auth_service_url,
            Duration::from_secs(config.auth_timeout_secs),
        )?;
        Some(Arc::new(http))
    } else {
        None
    };

    // Stream subscription failure at startup is the one fatal error.
    let ingest = IngestLoop::new(&config, broadcaster.clone(), shutdown.clone())?;
    let ingest_task = tokio::spawn(ingest.run());

    // Build application state
    let app_state = AppState {
        registry,
        broadcaster,
        verifier,
        shutdown: shutdown.clone(),
        config: Arc::clone(&config),
    };

    // Build router
    let app = Router::new()
        .merge(api::build_router())
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    let shutdown_on_signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown signal received");
            }
            shutdown_on_signal.cancel();
        })
        .await?;

    shutdown.cancel();
    ingest_task.await?;
    tracing::info!("storecast stopped");

    Ok(())
}
