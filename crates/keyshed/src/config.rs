//! Client configuration.

use std::path::PathBuf;

use serde::Deserialize;

use keyshed_oidc::TlsVerify;

use crate::secret::Secret;

/// Configuration for a token client against one realm.
///
/// Deserializes from the flat JSON shape used in service config files:
///
/// ```json
/// {
///     "server_url": "https://sso.example.com",
///     "realm_name": "orders",
///     "client_id": "orders-cli",
///     "client_secret": "...",
///     "verify": "/etc/ssl/internal-ca.pem"
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the identity provider.
    pub server_url: String,
    /// Realm to authenticate against.
    pub realm_name: String,
    /// OAuth2 client id registered in the realm.
    pub client_id: String,
    /// OAuth2 client secret for that client id.
    pub client_secret: Secret,
    /// Cache-file path override for the shared client. Defaults to
    /// `./.keyshed/{realm_name}.tok` when unset.
    #[serde(default)]
    pub token_filename: Option<PathBuf>,
    /// Externally obtained access token to seed the client with.
    #[serde(default)]
    pub access_token: Option<String>,
    /// Externally obtained refresh token to seed the client with.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// TLS verification mode for provider connections.
    #[serde(default)]
    pub verify: TlsVerify,
}

impl ClientConfig {
    /// Create a configuration with the required fields.
    pub fn new(
        server_url: impl Into<String>,
        realm_name: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<Secret>,
    ) -> Self {
        Self {
            server_url: server_url.into(),
            realm_name: realm_name.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            token_filename: None,
            access_token: None,
            refresh_token: None,
            verify: TlsVerify::default(),
        }
    }

    /// Seed the client with an externally obtained token pair.
    pub fn with_tokens(
        mut self,
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        self.access_token = Some(access_token.into());
        self.refresh_token = Some(refresh_token.into());
        self
    }

    /// Override the cache-file path used by the shared client.
    pub fn with_token_filename(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_filename = Some(path.into());
        self
    }

    /// Set the TLS verification mode.
    pub fn with_verify(mut self, verify: TlsVerify) -> Self {
        self.verify = verify;
        self
    }

    /// The seed token pair, when both halves are configured.
    pub(crate) fn seed_tokens(&self) -> Option<(&str, &str)> {
        match (self.access_token.as_deref(), self.refresh_token.as_deref()) {
            (Some(access), Some(refresh)) => Some((access, refresh)),
            _ => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_fills_defaults() {
        let config = ClientConfig::new("https://sso.example.com", "orders", "orders-cli", "pw");
        assert_eq!(config.server_url, "https://sso.example.com");
        assert_eq!(config.realm_name, "orders");
        assert_eq!(config.client_id, "orders-cli");
        assert_eq!(config.client_secret.reveal(), "pw");
        assert!(config.token_filename.is_none());
        assert!(config.seed_tokens().is_none());
        assert_eq!(config.verify, TlsVerify::Enabled);
    }

    #[test]
    fn test_builders() {
        let config = ClientConfig::new("https://sso.example.com", "orders", "orders-cli", "pw")
            .with_tokens("at-0", "rt-0")
            .with_token_filename("/var/lib/app/orders.tok")
            .with_verify(TlsVerify::Disabled);

        assert_eq!(config.seed_tokens(), Some(("at-0", "rt-0")));
        assert_eq!(
            config.token_filename.as_deref(),
            Some(std::path::Path::new("/var/lib/app/orders.tok"))
        );
        assert_eq!(config.verify, TlsVerify::Disabled);
    }

    #[test]
    fn test_seed_tokens_requires_both_halves() {
        let mut config =
            ClientConfig::new("https://sso.example.com", "orders", "orders-cli", "pw");
        config.access_token = Some("at-0".to_string());
        assert!(config.seed_tokens().is_none());
    }

    #[test]
    fn test_deserialize_from_json() {
        let config: ClientConfig = serde_json::from_str(
            r#"{
                "server_url": "https://sso.example.com",
                "realm_name": "orders",
                "client_id": "orders-cli",
                "client_secret": "hunter2",
                "verify": false
            }"#,
        )
        .unwrap();

        assert_eq!(config.client_secret.reveal(), "hunter2");
        assert_eq!(config.verify, TlsVerify::Disabled);
        assert!(config.access_token.is_none());
        assert!(config.refresh_token.is_none());
    }

    #[test]
    fn test_deserialize_verify_ca_bundle() {
        let config: ClientConfig = serde_json::from_str(
            r#"{
                "server_url": "https://sso.example.com",
                "realm_name": "orders",
                "client_id": "orders-cli",
                "client_secret": "hunter2",
                "verify": "/etc/ssl/internal-ca.pem"
            }"#,
        )
        .unwrap();

        assert_eq!(
            config.verify,
            TlsVerify::CaBundle(PathBuf::from("/etc/ssl/internal-ca.pem"))
        );
    }

    #[test]
    fn test_debug_redacts_client_secret() {
        let config =
            ClientConfig::new("https://sso.example.com", "orders", "orders-cli", "hunter2");
        let dump = format!("{config:?}");
        assert!(!dump.contains("hunter2"));
        assert!(dump.contains("[REDACTED]"));
    }
}
