//! Error types for the OIDC endpoint session.

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, OidcError>;

/// Errors that can occur while talking to the identity provider.
#[derive(Debug, thiserror::Error)]
pub enum OidcError {
    /// The configured server URL could not be parsed.
    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),

    /// The HTTPS client could not be constructed.
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    /// Network/transport failure before a complete response was received.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The endpoint answered with a non-success status.
    #[error("Endpoint returned HTTP {status}: {body}")]
    Endpoint {
        /// HTTP status code of the response.
        status: u16,
        /// Response body, verbatim.
        body: String,
    },

    /// The response body could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for OidcError {
    fn from(e: reqwest::Error) -> Self {
        OidcError::Transport(e.to_string())
    }
}
