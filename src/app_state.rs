//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::auth::IdentityVerifier;
use crate::config::GatewayConfig;
use crate::domain::{Broadcaster, StoreRegistry};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Connection registry shared with the ingestion loop.
    pub registry: Arc<StoreRegistry>,
    /// Fan-out engine for peer relay and stream delivery.
    pub broadcaster: Broadcaster,
    /// External identity gate; `None` when `AUTH_REQUIRED` is off.
    pub verifier: Option<Arc<dyn IdentityVerifier>>,
    /// Process-wide shutdown signal observed by every session.
    pub shutdown: CancellationToken,
    /// Immutable gateway configuration.
    pub config: Arc<GatewayConfig>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("registry", &self.registry)
            .field("auth_required", &self.verifier.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
