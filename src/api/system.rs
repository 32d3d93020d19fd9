//! System endpoints: health check.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::app_state::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
    stores: usize,
    connections: usize,
}

/// `GET /healthz` — Service health status with live fan-out counts.
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            stores: state.registry.store_count().await,
            connections: state.registry.total_connections().await,
        }),
    )
}

/// Builds the system router.
pub fn routes() -> Router<AppState> {
    Router::new().route("/healthz", get(health_handler))
}
