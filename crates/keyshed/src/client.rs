//! In-memory token controller.

use std::fmt;
use std::sync::Arc;

use keyshed_oidc::{OidcSession, SharedProvider};

use crate::config::ClientConfig;
use crate::error::{Result, TokenError};
use crate::record::{TokenRecord, TokenStatus, unix_now};
use crate::secret::Secret;

/// Token controller that keeps the current record in memory.
///
/// Every instance authenticates on construction and then serves tokens
/// from its own state: [`TokenClient::access_token`] refreshes through
/// the provider once the stored token has provably expired, and nothing
/// is ever persisted. For cross-process token reuse see
/// [`crate::SharedTokenClient`].
pub struct TokenClient {
    config: ClientConfig,
    session: SharedProvider,
    record: TokenRecord,
}

impl fmt::Debug for TokenClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenClient")
            .field("config", &self.config)
            .field("record", &self.record)
            .finish_non_exhaustive()
    }
}

impl TokenClient {
    /// Authenticate against the configured realm and build a controller.
    ///
    /// When the config seeds a token pair, it is eagerly refreshed so the
    /// record carries provider-verified lifespans. Otherwise a password
    /// grant is performed with `username` and `password`. With neither
    /// input this fails with [`TokenError::Config`].
    pub async fn initialize(
        config: ClientConfig,
        username: Option<&str>,
        password: Option<&Secret>,
    ) -> Result<Self> {
        let session: SharedProvider = Arc::new(OidcSession::new(
            &config.server_url,
            &config.realm_name,
            config.client_id.clone(),
            config.client_secret.reveal(),
            &config.verify,
        )?);
        Self::initialize_with_session(config, session, username, password).await
    }

    /// [`TokenClient::initialize`] with an injected provider.
    pub async fn initialize_with_session(
        config: ClientConfig,
        session: SharedProvider,
        username: Option<&str>,
        password: Option<&Secret>,
    ) -> Result<Self> {
        if let Some((access, refresh)) = config.seed_tokens() {
            let seed = TokenRecord::from_seed(
                &config.server_url,
                &config.realm_name,
                access,
                refresh,
                unix_now(),
            );
            let mut client = Self {
                config,
                session,
                record: seed,
            };
            client.refresh().await?;
            return Ok(client);
        }

        let (Some(username), Some(password)) = (username, password) else {
            return Err(TokenError::Config(
                "initial tokens in config or username and password arguments are required"
                    .to_string(),
            ));
        };

        let response = session.password_grant(username, password.reveal()).await?;
        let record = TokenRecord::from_response(
            &config.server_url,
            &config.realm_name,
            &response,
            unix_now(),
        )?;
        Ok(Self {
            config,
            session,
            record,
        })
    }

    /// Build a controller around an existing record without any provider call.
    pub fn from_record(config: ClientConfig, session: SharedProvider, record: TokenRecord) -> Self {
        Self {
            config,
            session,
            record,
        }
    }

    /// The current token record.
    pub fn record(&self) -> &TokenRecord {
        &self.record
    }

    /// Unix timestamp at which the current pair was obtained.
    pub fn token_timestamp(&self) -> i64 {
        self.record.token_timestamp
    }

    /// Unix timestamp at which the access token expires, if known.
    pub fn access_token_expiry_timestamp(&self) -> Option<i64> {
        self.record.access_token_expiry_timestamp()
    }

    /// Unix timestamp at which the refresh token expires, if known.
    pub fn refresh_token_expiry_timestamp(&self) -> Option<i64> {
        self.record.refresh_token_expiry_timestamp()
    }

    /// A usable access token, refreshing first if the stored one expired.
    ///
    /// A token of unknown lifespan is returned as-is with a warning; only
    /// provable expiry triggers a refresh.
    pub async fn access_token(&mut self) -> Result<String> {
        match self.record.access_status(unix_now()) {
            TokenStatus::Valid => Ok(self.record.access_token.clone()),
            TokenStatus::Unknown => {
                tracing::warn!(
                    realm = %self.config.realm_name,
                    "access token lifespan unknown; returning stored token"
                );
                Ok(self.record.access_token.clone())
            }
            TokenStatus::Expired => {
                tracing::debug!(realm = %self.config.realm_name, "access token expired, refreshing");
                let record = self.refresh().await?;
                Ok(record.access_token)
            }
        }
    }

    /// The stored refresh token, unless it has provably expired.
    ///
    /// Warns and returns `None` on provable expiry; warns but still returns
    /// the token when its lifespan is unknown.
    pub fn refresh_token(&self) -> Option<String> {
        let refresh_token = self.record.refresh_token.clone()?;
        match self.record.refresh_status(unix_now()) {
            TokenStatus::Valid => Some(refresh_token),
            TokenStatus::Unknown => {
                tracing::warn!(
                    realm = %self.config.realm_name,
                    "refresh token lifespan unknown; assuming still valid"
                );
                Some(refresh_token)
            }
            TokenStatus::Expired => {
                tracing::warn!(
                    realm = %self.config.realm_name,
                    "refresh token has expired, re-authenticate with password credentials"
                );
                None
            }
        }
    }

    /// Run the refresh grant and replace the stored record wholesale.
    ///
    /// Fails with [`TokenError::ReauthenticationRequired`] when no refresh
    /// token is held or it has provably expired; the provider is not
    /// called in either case. Any failure leaves the stored record
    /// untouched.
    pub async fn refresh(&mut self) -> Result<TokenRecord> {
        let Some(refresh_token) = self.record.refresh_token.clone() else {
            return Err(TokenError::ReauthenticationRequired(
                "no refresh token available".to_string(),
            ));
        };

        match self.record.refresh_status(unix_now()) {
            TokenStatus::Expired => {
                return Err(TokenError::ReauthenticationRequired(
                    "refresh token has expired".to_string(),
                ));
            }
            TokenStatus::Unknown => {
                tracing::warn!(
                    realm = %self.config.realm_name,
                    "refresh token lifespan unknown, attempting refresh anyway"
                );
            }
            TokenStatus::Valid => {}
        }

        let response = self.session.refresh_grant(&refresh_token).await?;
        let record = TokenRecord::from_response(
            &self.config.server_url,
            &self.config.realm_name,
            &response,
            unix_now(),
        )?;
        self.record = record.clone();
        tracing::info!(realm = %self.config.realm_name, "token record refreshed");
        Ok(record)
    }

    /// Run the password grant and replace the stored record wholesale.
    pub async fn password_credentials(
        &mut self,
        username: &str,
        password: &Secret,
    ) -> Result<TokenRecord> {
        let response = self
            .session
            .password_grant(username, password.reveal())
            .await?;
        let record = TokenRecord::from_response(
            &self.config.server_url,
            &self.config.realm_name,
            &response,
            unix_now(),
        )?;
        self.record = record.clone();
        tracing::info!(realm = %self.config.realm_name, "authenticated with password credentials");
        Ok(record)
    }

    /// Fetch the userinfo document with the stored access token.
    ///
    /// The stored token is sent as-is; an expired one surfaces as an
    /// endpoint error rather than triggering a refresh here.
    pub async fn user_info(&self) -> Result<serde_json::Value> {
        Ok(self.session.userinfo(&self.record.access_token).await?)
    }

    /// Exchange the current access token for one scoped to `audience`.
    ///
    /// Goes through [`TokenClient::access_token`] first, so an expired
    /// subject token is refreshed before the exchange.
    pub async fn token_exchange(&mut self, audience: &str) -> Result<serde_json::Value> {
        let subject_token = self.access_token().await?;
        Ok(self.session.exchange_token(&subject_token, audience).await?)
    }
}
