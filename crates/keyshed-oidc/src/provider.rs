//! Identity-provider trait and the token-endpoint wire type.
//!
//! This module defines the abstraction over the four OIDC endpoint
//! operations the token lifecycle needs, so the lifecycle logic can be
//! driven by a real Keycloak session or a canned test double.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::Result;

// ─────────────────────────────────────────────────────────────────────────────
// Token Endpoint Wire Type
// ─────────────────────────────────────────────────────────────────────────────

/// Body of a successful token-endpoint response.
///
/// Every field is optional: the provider decides what it returns, and the
/// caller decides which absences are fatal. Unknown fields (token_type,
/// session_state, scope, ...) are ignored.
#[derive(Clone, Default, Deserialize)]
pub struct TokenResponse {
    /// Bearer token for resource requests.
    #[serde(default)]
    pub access_token: Option<String>,
    /// Token for the refresh grant.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Access-token lifespan in seconds.
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Refresh-token lifespan in seconds.
    #[serde(default)]
    pub refresh_expires_in: Option<i64>,
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_in", &self.expires_in)
            .field("refresh_expires_in", &self.refresh_expires_in)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Identity Provider Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for OIDC identity providers.
///
/// Implementations perform the raw endpoint calls and nothing else: no
/// token storage, no expiry bookkeeping. [`crate::OidcSession`] is the
/// Keycloak implementation; tests substitute canned doubles.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Exchange resource-owner credentials for a token pair.
    async fn password_grant(&self, username: &str, password: &str) -> Result<TokenResponse>;

    /// Trade a refresh token for a fresh token pair.
    async fn refresh_grant(&self, refresh_token: &str) -> Result<TokenResponse>;

    /// Exchange an access token for one scoped to another audience (RFC 8693).
    ///
    /// The result is returned as-is; exchange responses are passed through
    /// to the caller without entering the token lifecycle.
    async fn exchange_token(
        &self,
        subject_token: &str,
        audience: &str,
    ) -> Result<serde_json::Value>;

    /// Fetch the userinfo document for an access token.
    async fn userinfo(&self, access_token: &str) -> Result<serde_json::Value>;
}

/// A provider that can be shared across threads.
pub type SharedProvider = Arc<dyn IdentityProvider>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_response_deserialize_full() {
        let body = r#"{
            "access_token": "at-1",
            "refresh_token": "rt-1",
            "expires_in": 300,
            "refresh_expires_in": 1800
        }"#;

        let response: TokenResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.access_token.as_deref(), Some("at-1"));
        assert_eq!(response.refresh_token.as_deref(), Some("rt-1"));
        assert_eq!(response.expires_in, Some(300));
        assert_eq!(response.refresh_expires_in, Some(1800));
    }

    #[test]
    fn test_token_response_deserialize_empty() {
        let response: TokenResponse = serde_json::from_str("{}").unwrap();
        assert!(response.access_token.is_none());
        assert!(response.refresh_token.is_none());
        assert!(response.expires_in.is_none());
        assert!(response.refresh_expires_in.is_none());
    }

    #[test]
    fn test_token_response_ignores_unknown_fields() {
        let body = r#"{
            "access_token": "at-1",
            "token_type": "Bearer",
            "session_state": "f0c4a2b1",
            "scope": "openid profile",
            "not-before-policy": 0
        }"#;

        let response: TokenResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.access_token.as_deref(), Some("at-1"));
        assert!(response.expires_in.is_none());
    }

    #[test]
    fn test_token_response_debug_redacts_tokens() {
        let response = TokenResponse {
            access_token: Some("very-secret-access".to_string()),
            refresh_token: Some("very-secret-refresh".to_string()),
            expires_in: Some(300),
            refresh_expires_in: None,
        };

        let dump = format!("{response:?}");
        assert!(!dump.contains("very-secret-access"));
        assert!(!dump.contains("very-secret-refresh"));
        assert!(dump.contains("[REDACTED]"));
        assert!(dump.contains("300"));
    }
}
