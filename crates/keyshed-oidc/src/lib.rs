//! Keycloak OpenID Connect endpoint session.
//!
//! Talks to one realm of a Keycloak-compatible provider: password and
//! refresh grants, RFC 8693 token exchange, and the userinfo endpoint.
//! This crate does the wire work only; token lifecycle and caching live
//! in `keyshed`.
//!
//! # Components
//!
//! - [`provider`] — [`IdentityProvider`] trait and the token-endpoint wire type
//! - [`session`] — [`OidcSession`], the Keycloak implementation
//! - [`tls`] — certificate-verification modes for the HTTPS client
//! - [`error`] — endpoint error taxonomy

pub mod error;
pub mod provider;
pub mod session;
pub mod tls;

pub use error::{OidcError, Result};
pub use provider::{IdentityProvider, SharedProvider, TokenResponse};
pub use session::OidcSession;
pub use tls::TlsVerify;
