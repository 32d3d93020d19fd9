//! Axum WebSocket upgrade handler.
//!
//! Validates the `storeId` query parameter and, when authentication is
//! enabled, gates the upgrade on the external identity service before any
//! session state is created.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::response::Response;
use serde::Deserialize;

use super::session::run_session;
use crate::app_state::AppState;
use crate::auth::strip_bearer;
use crate::domain::StoreId;
use crate::error::GatewayError;

/// Query parameters accepted by the `/ws` endpoint.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Store the client subscribes to. Required, non-empty.
    #[serde(rename = "storeId")]
    pub store_id: Option<String>,
}

/// `GET /ws?storeId=...` — Upgrade HTTP connection to WebSocket.
///
/// # Errors
///
/// Returns [`GatewayError::MissingStoreId`] when the query parameter is
/// absent or empty, and [`GatewayError::Unauthenticated`] or
/// [`GatewayError::AuthUnavailable`] when the identity gate fails.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Response, GatewayError> {
    let store_id = query
        .store_id
        .as_deref()
        .and_then(StoreId::new)
        .ok_or(GatewayError::MissingStoreId)?;

    if let Some(verifier) = &state.verifier {
        let token = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                GatewayError::Unauthenticated("Authorization header is required".to_string())
            })?;
        let identity = verifier.verify(strip_bearer(token)).await?;
        tracing::debug!(
            user_id = %identity.id,
            store_id = %store_id,
            "client authenticated"
        );
    }

    Ok(ws.on_upgrade(move |socket| run_session(socket, store_id, state)))
}
