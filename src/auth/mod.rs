//! External identity verification.
//!
//! The accept path treats verification as an opaque gate: a bearer
//! credential goes in, a pass/fail comes out. The returned identity is
//! logged but never interpreted beyond that.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::GatewayError;

/// Identity returned by the verification service.
#[derive(Debug, Clone, Deserialize)]
pub struct Identity {
    /// Stable user identifier.
    pub id: String,
    /// User email address.
    pub email: String,
    /// Display name.
    pub name: String,
}

/// Verifies a bearer credential against an external identity service.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Verifies `token`, returning the identity it resolves to.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Unauthenticated`] when the service rejects
    /// the credential and [`GatewayError::AuthUnavailable`] when the
    /// service cannot be reached.
    async fn verify(&self, token: &str) -> Result<Identity, GatewayError>;
}

/// HTTP client for the identity verification service.
///
/// Sends `POST {base_url}/verify` with a JSON body `{"token": "..."}` and
/// expects an [`Identity`] JSON object on success.
#[derive(Debug, Clone)]
pub struct HttpIdentityVerifier {
    client: reqwest::Client,
    base_url: String,
}

impl HttpIdentityVerifier {
    /// Creates a verifier targeting the given base URL.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Config(format!("identity client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl IdentityVerifier for HttpIdentityVerifier {
    async fn verify(&self, token: &str) -> Result<Identity, GatewayError> {
        let response = self
            .client
            .post(format!("{}/verify", self.base_url))
            .json(&serde_json::json!({ "token": token }))
            .send()
            .await
            .map_err(|e| GatewayError::AuthUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(GatewayError::Unauthenticated(format!(
                "identity service returned {}",
                response.status()
            )));
        }

        response
            .json::<Identity>()
            .await
            .map_err(|e| GatewayError::AuthUnavailable(format!("malformed identity body: {e}")))
    }
}

/// Strips an optional `Bearer ` prefix from an `Authorization` header value.
#[must_use]
pub fn strip_bearer(header: &str) -> &str {
    header
        .strip_prefix("Bearer ")
        .unwrap_or(header)
        .trim()
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn strip_bearer_handles_both_forms() {
        assert_eq!(strip_bearer("Bearer abc.def"), "abc.def");
        assert_eq!(strip_bearer("abc.def"), "abc.def");
        assert_eq!(strip_bearer("Bearer  spaced "), "spaced");
    }

    #[test]
    fn verifier_builds_with_trailing_slash() {
        let verifier = HttpIdentityVerifier::new("http://auth.local/", Duration::from_secs(1));
        let Ok(verifier) = verifier else {
            panic!("client construction failed");
        };
        assert_eq!(verifier.base_url, "http://auth.local");
    }

    #[test]
    fn identity_deserializes() {
        let json = r#"{"id":"u1","email":"a@b.c","name":"Ada"}"#;
        let Ok(identity) = serde_json::from_str::<Identity>(json) else {
            panic!("deserialization failed");
        };
        assert_eq!(identity.id, "u1");
        assert_eq!(identity.name, "Ada");
    }
}
