//! Error types for token lifecycle operations.

use std::path::PathBuf;

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, TokenError>;

/// Errors that can occur while managing the token lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// Required configuration or credentials are missing.
    #[error("Config error: {0}")]
    Config(String),

    /// The provider answered with success but the body is unusable.
    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    /// The stored credentials cannot mint a new access token; a fresh
    /// password grant is needed.
    #[error("Re-authentication required: {0}")]
    ReauthenticationRequired(String),

    /// No token record has been persisted yet.
    #[error("No token record found at {}", .0.display())]
    CacheMissing(PathBuf),

    /// Reading or writing the cache file failed.
    #[error("Token cache I/O error at {}: {}", .path.display(), .source)]
    CacheIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The cache file content could not be encoded or decoded.
    #[error("Token cache format error at {}: {}", .path.display(), .source)]
    CacheFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Acquiring or releasing the cross-process lock failed.
    #[error("Cache lock error at {}: {}", .path.display(), .source)]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The identity provider call failed.
    #[error(transparent)]
    Provider(#[from] keyshed_oidc::OidcError),
}
