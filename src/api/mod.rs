//! HTTP API layer: system endpoints and router composition.

pub mod system;

use axum::Router;

use crate::app_state::AppState;

/// Builds the router for the non-WebSocket HTTP surface.
pub fn build_router() -> Router<AppState> {
    system::routes()
}
