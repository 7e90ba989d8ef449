//! Token records and expiry classification.
//!
//! A [`TokenRecord`] is one issued token pair plus the bookkeeping needed
//! to decide, at any later instant, whether each token is still usable.
//! Lifespans the provider never reported are carried as `None` and stored
//! on disk as the sentinel `-1`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, TokenError};
use keyshed_oidc::TokenResponse;

/// Current Unix time in whole seconds.
pub(crate) fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

// ============================================================================
// Expiry Classification
// ============================================================================

/// Expiry status of a token at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    /// Inside its known lifespan.
    Valid,
    /// Provably past its known lifespan.
    Expired,
    /// No lifespan on record; expiry cannot be determined.
    Unknown,
}

/// Classify a token issued at `issued_at` with the given lifespan in seconds.
///
/// A token is `Expired` only when strictly past `issued_at + lifespan`; the
/// boundary second still counts as `Valid`. Without a lifespan the status is
/// `Unknown`, never a guess in either direction.
pub fn classify(now: i64, issued_at: i64, lifespan: Option<i64>) -> TokenStatus {
    match lifespan {
        None => TokenStatus::Unknown,
        Some(lifespan) => {
            if now > issued_at.saturating_add(lifespan) {
                TokenStatus::Expired
            } else {
                TokenStatus::Valid
            }
        }
    }
}

/// Serde codec for lifespan fields: `None` is written as `-1`, and any
/// negative value reads back as `None`.
mod lifespan {
    use serde::{Deserialize, Deserializer, Serializer};

    const UNKNOWN: i64 = -1;

    pub fn serialize<S>(value: &Option<i64>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(value.unwrap_or(UNKNOWN))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = i64::deserialize(deserializer)?;
        Ok(if raw < 0 { None } else { Some(raw) })
    }
}

// ============================================================================
// TokenRecord
// ============================================================================

/// One issued token pair and its expiry bookkeeping.
///
/// This is the persisted cache-file schema as well as the in-memory state
/// of a token controller. `token_timestamp` is the issue instant for both
/// tokens of the pair.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    /// Base URL of the provider that issued the tokens.
    pub server_url: String,
    /// Realm the tokens belong to.
    pub realm_name: String,
    /// Unix timestamp (seconds) at which the pair was obtained.
    pub token_timestamp: i64,
    /// Current bearer token.
    pub access_token: String,
    /// Access-token lifespan in seconds, if the provider reported one.
    #[serde(default, with = "lifespan")]
    pub access_token_lifespan: Option<i64>,
    /// Current refresh token, if the provider issued one.
    pub refresh_token: Option<String>,
    /// Refresh-token lifespan in seconds, if the provider reported one.
    #[serde(default, with = "lifespan")]
    pub refresh_token_lifespan: Option<i64>,
}

impl TokenRecord {
    /// Build a record from a token-endpoint response issued at `now`.
    ///
    /// The response must carry a non-empty access token; everything else
    /// is optional. A missing refresh token or lifespan is carried as
    /// `None`, not an error.
    pub fn from_response(
        server_url: &str,
        realm_name: &str,
        response: &TokenResponse,
        now: i64,
    ) -> Result<Self> {
        let access_token = match response.access_token.as_deref() {
            Some(token) if !token.is_empty() => token.to_string(),
            _ => {
                return Err(TokenError::MalformedResponse(
                    "response does not contain an access token".to_string(),
                ));
            }
        };

        Ok(Self {
            server_url: server_url.to_string(),
            realm_name: realm_name.to_string(),
            token_timestamp: now,
            access_token,
            access_token_lifespan: response.expires_in.filter(|s| *s >= 0),
            refresh_token: response.refresh_token.clone(),
            refresh_token_lifespan: response.refresh_expires_in.filter(|s| *s >= 0),
        })
    }

    /// Build a record from externally supplied tokens with unknown lifespans.
    ///
    /// Used when configuration seeds the controller with a token pair whose
    /// issue time and lifespans were never observed.
    pub fn from_seed(
        server_url: &str,
        realm_name: &str,
        access_token: &str,
        refresh_token: &str,
        now: i64,
    ) -> Self {
        Self {
            server_url: server_url.to_string(),
            realm_name: realm_name.to_string(),
            token_timestamp: now,
            access_token: access_token.to_string(),
            access_token_lifespan: None,
            refresh_token: Some(refresh_token.to_string()),
            refresh_token_lifespan: None,
        }
    }

    /// Expiry status of the access token at `now`.
    pub fn access_status(&self, now: i64) -> TokenStatus {
        classify(now, self.token_timestamp, self.access_token_lifespan)
    }

    /// Expiry status of the refresh-token lifespan at `now`.
    ///
    /// This is lifespan arithmetic only; whether a refresh token is present
    /// at all is tracked separately via the `refresh_token` field.
    pub fn refresh_status(&self, now: i64) -> TokenStatus {
        classify(now, self.token_timestamp, self.refresh_token_lifespan)
    }

    /// Unix timestamp at which the access token expires, if known.
    pub fn access_token_expiry_timestamp(&self) -> Option<i64> {
        self.access_token_lifespan
            .map(|s| self.token_timestamp.saturating_add(s))
    }

    /// Unix timestamp at which the refresh token expires, if known.
    pub fn refresh_token_expiry_timestamp(&self) -> Option<i64> {
        self.refresh_token_lifespan
            .map(|s| self.token_timestamp.saturating_add(s))
    }
}

impl fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRecord")
            .field("server_url", &self.server_url)
            .field("realm_name", &self.realm_name)
            .field("token_timestamp", &self.token_timestamp)
            .field("access_token", &"[REDACTED]")
            .field("access_token_lifespan", &self.access_token_lifespan)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("refresh_token_lifespan", &self.refresh_token_lifespan)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
