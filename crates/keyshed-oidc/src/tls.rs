//! TLS verification modes for the HTTPS client.

use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{OidcError, Result};

/// How server certificates are verified when talking to the provider.
///
/// Deserializes from either a boolean (`true`/`false`) or a string path
/// to a PEM-encoded CA certificate, so configuration files can say
/// `"verify": false` or `"verify": "/etc/ssl/internal-ca.pem"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TlsVerify {
    /// Standard certificate verification against the system trust store.
    Enabled,
    /// No certificate verification. Only suitable for local development.
    Disabled,
    /// Verification against a custom PEM-encoded CA certificate.
    CaBundle(PathBuf),
}

impl Default for TlsVerify {
    fn default() -> Self {
        TlsVerify::Enabled
    }
}

impl TlsVerify {
    /// Apply this verification mode to a client builder.
    pub(crate) fn apply(&self, builder: reqwest::ClientBuilder) -> Result<reqwest::ClientBuilder> {
        match self {
            TlsVerify::Enabled => Ok(builder),
            TlsVerify::Disabled => {
                tracing::warn!("TLS certificate verification is disabled");
                Ok(builder.danger_accept_invalid_certs(true))
            }
            TlsVerify::CaBundle(path) => {
                let pem = std::fs::read(path).map_err(|e| {
                    OidcError::HttpClient(format!("Failed to read CA bundle {}: {e}", path.display()))
                })?;
                let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| {
                    OidcError::HttpClient(format!("Invalid CA bundle {}: {e}", path.display()))
                })?;
                Ok(builder.add_root_certificate(cert))
            }
        }
    }
}

impl<'de> Deserialize<'de> for TlsVerify {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Flag(bool),
            Bundle(PathBuf),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Flag(true) => TlsVerify::Enabled,
            Raw::Flag(false) => TlsVerify::Disabled,
            Raw::Bundle(path) => TlsVerify::CaBundle(path),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_is_enabled() {
        assert_eq!(TlsVerify::default(), TlsVerify::Enabled);
    }

    #[test]
    fn test_deserialize_from_bool() {
        let enabled: TlsVerify = serde_json::from_str("true").unwrap();
        assert_eq!(enabled, TlsVerify::Enabled);

        let disabled: TlsVerify = serde_json::from_str("false").unwrap();
        assert_eq!(disabled, TlsVerify::Disabled);
    }

    #[test]
    fn test_deserialize_from_path() {
        let bundle: TlsVerify = serde_json::from_str(r#""/etc/ssl/internal-ca.pem""#).unwrap();
        assert_eq!(bundle, TlsVerify::CaBundle(PathBuf::from("/etc/ssl/internal-ca.pem")));
    }

    #[test]
    fn test_apply_disabled_builds_client() {
        let builder = TlsVerify::Disabled.apply(reqwest::Client::builder()).unwrap();
        assert!(builder.build().is_ok());
    }

    #[test]
    fn test_apply_missing_bundle_fails() {
        let verify = TlsVerify::CaBundle(PathBuf::from("/nonexistent/ca.pem"));
        let err = verify.apply(reqwest::Client::builder()).unwrap_err();
        assert!(matches!(err, OidcError::HttpClient(_)));
    }

    #[test]
    fn test_apply_invalid_bundle_fails() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"not a pem certificate").unwrap();

        let verify = TlsVerify::CaBundle(file.path().to_path_buf());
        let err = verify.apply(reqwest::Client::builder()).unwrap_err();
        assert!(matches!(err, OidcError::HttpClient(_)));
    }
}
