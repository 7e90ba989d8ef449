//! Keycloak endpoint session.
//!
//! [`OidcSession`] derives the token and userinfo URLs for one realm and
//! implements [`IdentityProvider`] over them with a reusable HTTPS client.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{OidcError, Result};
use crate::provider::{IdentityProvider, TokenResponse};
use crate::tls::TlsVerify;

/// Request timeout applied to every endpoint call.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Grant type for the resource-owner password flow.
const GRANT_PASSWORD: &str = "password";
/// Grant type for the refresh flow.
const GRANT_REFRESH: &str = "refresh_token";
/// Grant type URN for RFC 8693 token exchange.
const GRANT_TOKEN_EXCHANGE: &str = "urn:ietf:params:oauth:grant-type:token-exchange";
/// Subject token type URN sent with token exchange.
const SUBJECT_TOKEN_TYPE_ACCESS: &str = "urn:ietf:params:oauth:token-type:access_token";

/// A session against one realm of a Keycloak-compatible OIDC provider.
///
/// The session is stateless with respect to tokens: it performs endpoint
/// calls and decodes responses, nothing more. Token storage and expiry
/// bookkeeping live in the `keyshed` crate.
pub struct OidcSession {
    client: reqwest::Client,
    token_url: String,
    userinfo_url: String,
    client_id: String,
    client_secret: String,
}

impl OidcSession {
    /// Create a session for `realm_name` on `server_url`.
    ///
    /// `server_url` is the provider base URL, with or without a trailing
    /// slash. The token and userinfo endpoints are derived from it using
    /// the standard Keycloak path layout.
    pub fn new(
        server_url: &str,
        realm_name: &str,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        verify: &TlsVerify,
    ) -> Result<Self> {
        let base = server_url.trim_end_matches('/');
        let token_url = format!("{base}/realms/{realm_name}/protocol/openid-connect/token");
        let userinfo_url = format!("{base}/realms/{realm_name}/protocol/openid-connect/userinfo");

        reqwest::Url::parse(&token_url)
            .map_err(|e| OidcError::InvalidUrl(format!("{server_url}: {e}")))?;

        let builder =
            reqwest::Client::builder().timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        let client = verify
            .apply(builder)?
            .build()
            .map_err(|e| OidcError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            token_url,
            userinfo_url,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        })
    }

    /// Token endpoint URL derived from the server URL and realm.
    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// Userinfo endpoint URL derived from the server URL and realm.
    pub fn userinfo_url(&self) -> &str {
        &self.userinfo_url
    }

    /// POST a grant to the token endpoint and return the raw body on success.
    ///
    /// Client credentials are always included; `extra` carries the
    /// grant-specific parameters.
    async fn grant_request(&self, grant_type: &str, extra: &[(&str, &str)]) -> Result<String> {
        let mut form = vec![
            ("grant_type", grant_type),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];
        form.extend_from_slice(extra);

        tracing::debug!(url = %self.token_url, grant_type, "requesting grant");
        let response = self.client.post(&self.token_url).form(&form).send().await?;
        Self::success_body(response).await
    }

    /// Read the body, mapping non-success statuses to [`OidcError::Endpoint`].
    async fn success_body(response: reqwest::Response) -> Result<String> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(OidcError::Endpoint {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    fn decode_tokens(body: &str) -> Result<TokenResponse> {
        serde_json::from_str(body).map_err(|e| OidcError::Decode(format!("token response: {e}")))
    }

    fn decode_document(kind: &str, body: &str) -> Result<serde_json::Value> {
        serde_json::from_str(body).map_err(|e| OidcError::Decode(format!("{kind} response: {e}")))
    }
}

impl fmt::Debug for OidcSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OidcSession")
            .field("token_url", &self.token_url)
            .field("userinfo_url", &self.userinfo_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl IdentityProvider for OidcSession {
    async fn password_grant(&self, username: &str, password: &str) -> Result<TokenResponse> {
        let body = self
            .grant_request(GRANT_PASSWORD, &[("username", username), ("password", password)])
            .await?;
        Self::decode_tokens(&body)
    }

    async fn refresh_grant(&self, refresh_token: &str) -> Result<TokenResponse> {
        let body = self
            .grant_request(GRANT_REFRESH, &[("refresh_token", refresh_token)])
            .await?;
        Self::decode_tokens(&body)
    }

    async fn exchange_token(
        &self,
        subject_token: &str,
        audience: &str,
    ) -> Result<serde_json::Value> {
        let body = self
            .grant_request(
                GRANT_TOKEN_EXCHANGE,
                &[
                    ("subject_token", subject_token),
                    ("subject_token_type", SUBJECT_TOKEN_TYPE_ACCESS),
                    ("audience", audience),
                ],
            )
            .await?;
        Self::decode_document("exchange", &body)
    }

    async fn userinfo(&self, access_token: &str) -> Result<serde_json::Value> {
        tracing::debug!(url = %self.userinfo_url, "requesting userinfo");
        let response = self
            .client
            .get(&self.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await?;
        let body = Self::success_body(response).await?;
        Self::decode_document("userinfo", &body)
    }
}

// ============================================================================
// Tests
// ============================================================================
