//! Token lifecycle management for Keycloak-style OIDC providers.
//!
//! Obtains token pairs with the password grant, tracks their expiry, and
//! refreshes them on demand. Two controllers cover the two deployment
//! shapes: [`TokenClient`] keeps its record in memory for a single
//! process, while [`SharedTokenClient`] persists every record to a
//! file-locked cache so cooperating processes reuse one token pair
//! instead of minting their own.
//!
//! # Components
//!
//! - [`record`] — token records and tri-state expiry classification
//! - [`client`] — in-memory token controller
//! - [`shared`] — shared-cache token controller
//! - [`cache`] — cache file, lock file, and load classification
//! - [`config`] — client configuration
//! - [`secret`] — redacting wrapper for credential values
//! - [`error`] — token lifecycle error taxonomy

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod record;
pub mod secret;
pub mod shared;

pub use cache::{CacheLock, LoadState, TokenCache, default_cache_path};
pub use client::TokenClient;
pub use config::ClientConfig;
pub use error::{Result, TokenError};
pub use record::{TokenRecord, TokenStatus, classify};
pub use secret::Secret;
pub use shared::SharedTokenClient;

pub use keyshed_oidc::{
    IdentityProvider, OidcError, OidcSession, SharedProvider, TlsVerify, TokenResponse,
};
