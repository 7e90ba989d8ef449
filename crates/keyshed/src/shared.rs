//! Shared-cache token controller.

use std::path::Path;
use std::sync::Arc;

use keyshed_oidc::{OidcSession, SharedProvider};

use crate::cache::{CacheLock, LoadState, TokenCache, default_cache_path};
use crate::config::ClientConfig;
use crate::error::{Result, TokenError};
use crate::record::{TokenRecord, TokenStatus, unix_now};
use crate::secret::Secret;

/// Token controller that persists every record to a file-locked cache.
///
/// Instances hold no token state between calls. Every operation takes the
/// cross-process lock, reads the cache file, acts, and writes back, so any
/// number of processes pointed at the same path share one token pair. The
/// lock is acquired exactly once per public operation and handed down to
/// internal helpers; it is never taken re-entrantly.
pub struct SharedTokenClient {
    config: ClientConfig,
    session: SharedProvider,
    cache: TokenCache,
}

impl SharedTokenClient {
    /// Build a shared client for the configured realm.
    ///
    /// The cache lives at `config.token_filename`, falling back to
    /// `./.keyshed/{realm_name}.tok`. Construction touches no tokens;
    /// call [`SharedTokenClient::initialize_tokens`] to populate the
    /// cache.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let session: SharedProvider = Arc::new(OidcSession::new(
            &config.server_url,
            &config.realm_name,
            config.client_id.clone(),
            config.client_secret.reveal(),
            &config.verify,
        )?);
        Self::with_session(config, session)
    }

    /// [`SharedTokenClient::new`] with an injected provider.
    pub fn with_session(config: ClientConfig, session: SharedProvider) -> Result<Self> {
        let path = config
            .token_filename
            .clone()
            .unwrap_or_else(|| default_cache_path(&config.realm_name));
        let cache = TokenCache::new(path)?;
        Ok(Self {
            config,
            session,
            cache,
        })
    }

    /// Populate the cache, reusing persisted token material when possible.
    ///
    /// Resolution order:
    /// 1. a persisted record whose access token is valid or of unknown
    ///    expiry is returned as-is;
    /// 2. a stale persisted record, or the seed pair from the config, is
    ///    refreshed and the result persisted;
    /// 3. otherwise `username` and `password` mint a fresh pair;
    /// 4. when steps 1–2 fail and credentials were supplied, they are used
    ///    as a fallback after a warning; without credentials the original
    ///    error propagates.
    pub async fn initialize_tokens(
        &self,
        username: Option<&str>,
        password: Option<&Secret>,
    ) -> Result<TokenRecord> {
        let lock = self.cache.lock().await?;

        match self.reuse_or_refresh_locked(&lock).await {
            Ok(Some(record)) => return Ok(record),
            Ok(None) => {}
            Err(err) => {
                if username.is_none() || password.is_none() {
                    return Err(err);
                }
                tracing::warn!(
                    realm = %self.config.realm_name,
                    error = %err,
                    "stored tokens unusable, falling back to password grant"
                );
            }
        }

        let (Some(username), Some(password)) = (username, password) else {
            return Err(TokenError::Config(
                "initial tokens in config or username and password arguments are required"
                    .to_string(),
            ));
        };
        self.password_credentials_locked(&lock, username, password)
            .await
    }

    /// A usable access token, refreshing first if the persisted one expired.
    pub async fn access_token(&self) -> Result<String> {
        let lock = self.cache.lock().await?;
        self.access_token_locked(&lock).await
    }

    /// The persisted refresh token, unless it has provably expired.
    ///
    /// Warns and returns `None` on provable expiry; warns but still returns
    /// the token when its lifespan is unknown.
    pub async fn refresh_token(&self) -> Result<Option<String>> {
        let lock = self.cache.lock().await?;
        let record = self.read_record_locked(&lock)?;

        let Some(refresh_token) = record.refresh_token.clone() else {
            return Ok(None);
        };
        match record.refresh_status(unix_now()) {
            TokenStatus::Valid => Ok(Some(refresh_token)),
            TokenStatus::Unknown => {
                tracing::warn!(
                    realm = %self.config.realm_name,
                    "refresh token lifespan unknown; assuming still valid"
                );
                Ok(Some(refresh_token))
            }
            TokenStatus::Expired => {
                tracing::warn!(
                    realm = %self.config.realm_name,
                    "refresh token has expired, re-authenticate with password credentials"
                );
                Ok(None)
            }
        }
    }

    /// Unix timestamp at which the persisted pair was obtained.
    pub async fn token_timestamp(&self) -> Result<i64> {
        let lock = self.cache.lock().await?;
        Ok(self.read_record_locked(&lock)?.token_timestamp)
    }

    /// Unix timestamp at which the persisted access token expires, if known.
    pub async fn access_token_expiry_timestamp(&self) -> Result<Option<i64>> {
        let lock = self.cache.lock().await?;
        Ok(self
            .read_record_locked(&lock)?
            .access_token_expiry_timestamp())
    }

    /// Unix timestamp at which the persisted refresh token expires, if known.
    pub async fn refresh_token_expiry_timestamp(&self) -> Result<Option<i64>> {
        let lock = self.cache.lock().await?;
        Ok(self
            .read_record_locked(&lock)?
            .refresh_token_expiry_timestamp())
    }

    /// Run the refresh grant against the persisted record and write back.
    pub async fn refresh(&self) -> Result<TokenRecord> {
        let lock = self.cache.lock().await?;
        self.refresh_locked(&lock).await
    }

    /// Run the password grant and persist the resulting record.
    pub async fn password_credentials(
        &self,
        username: &str,
        password: &Secret,
    ) -> Result<TokenRecord> {
        let lock = self.cache.lock().await?;
        self.password_credentials_locked(&lock, username, password)
            .await
    }

    /// Fetch the userinfo document, refreshing the access token if needed.
    pub async fn user_info(&self) -> Result<serde_json::Value> {
        let lock = self.cache.lock().await?;
        let access_token = self.access_token_locked(&lock).await?;
        Ok(self.session.userinfo(&access_token).await?)
    }

    /// Exchange the cached access token for one scoped to `audience`.
    ///
    /// The subject token goes through the usual expiry check and refresh
    /// before the exchange; the exchange result itself is passed through
    /// without entering the cache.
    pub async fn token_exchange(&self, audience: &str) -> Result<serde_json::Value> {
        let lock = self.cache.lock().await?;
        let subject_token = self.access_token_locked(&lock).await?;
        Ok(self.session.exchange_token(&subject_token, audience).await?)
    }

    /// Write `record` to the cache under the lock.
    pub async fn persist_record(&self, record: &TokenRecord) -> Result<()> {
        let lock = self.cache.lock().await?;
        self.persist_locked(&lock, record)
    }

    /// Remove the persisted record, forcing re-authentication next time.
    pub async fn clear_cache(&self) -> Result<()> {
        let _lock = self.cache.lock().await?;
        self.cache.clear()
    }

    /// Whether a record has been persisted at the cache path.
    pub fn has_cached_record(&self) -> bool {
        self.cache.exists()
    }

    /// Path of the cache file.
    pub fn cache_path(&self) -> &Path {
        self.cache.path()
    }

    // ========================================================================
    // Lock-holding internals
    // ========================================================================

    /// Reuse or refresh existing token material: the persisted record first,
    /// then the seed pair from the config. `Ok(None)` means there is nothing
    /// to work from and the caller must fall through to a password grant.
    async fn reuse_or_refresh_locked(&self, lock: &CacheLock) -> Result<Option<TokenRecord>> {
        let now = unix_now();
        match self.cache.load_state(now)? {
            LoadState::Loaded(record) => {
                if record.access_status(now) == TokenStatus::Unknown {
                    tracing::warn!(
                        realm = %self.config.realm_name,
                        "access token lifespan unknown; reusing persisted record"
                    );
                }
                Ok(Some(record))
            }
            LoadState::Stale(record) => {
                tracing::debug!(
                    realm = %self.config.realm_name,
                    "persisted access token expired, refreshing"
                );
                let refreshed = self.refresh_with_record_locked(lock, record).await?;
                Ok(Some(refreshed))
            }
            LoadState::Absent => match self.config.seed_tokens() {
                Some((access, refresh)) => {
                    let seed = TokenRecord::from_seed(
                        &self.config.server_url,
                        &self.config.realm_name,
                        access,
                        refresh,
                        now,
                    );
                    let refreshed = self.refresh_with_record_locked(lock, seed).await?;
                    Ok(Some(refreshed))
                }
                None => Ok(None),
            },
        }
    }

    async fn access_token_locked(&self, lock: &CacheLock) -> Result<String> {
        let record = self.read_record_locked(lock)?;
        match record.access_status(unix_now()) {
            TokenStatus::Valid => Ok(record.access_token),
            TokenStatus::Unknown => {
                tracing::warn!(
                    realm = %self.config.realm_name,
                    "access token lifespan unknown; returning persisted token"
                );
                Ok(record.access_token)
            }
            TokenStatus::Expired => {
                tracing::debug!(
                    realm = %self.config.realm_name,
                    "persisted access token expired, refreshing"
                );
                let refreshed = self.refresh_with_record_locked(lock, record).await?;
                Ok(refreshed.access_token)
            }
        }
    }

    async fn refresh_locked(&self, lock: &CacheLock) -> Result<TokenRecord> {
        let record = self.read_record_locked(lock)?;
        self.refresh_with_record_locked(lock, record).await
    }

    /// Refresh `record` and persist the replacement.
    ///
    /// Fails with [`TokenError::ReauthenticationRequired`] when no refresh
    /// token is held or it has provably expired; the provider is not called
    /// and the cache is left untouched in either case.
    async fn refresh_with_record_locked(
        &self,
        lock: &CacheLock,
        record: TokenRecord,
    ) -> Result<TokenRecord> {
        let Some(refresh_token) = record.refresh_token.as_deref() else {
            return Err(TokenError::ReauthenticationRequired(
                "no refresh token available".to_string(),
            ));
        };

        match record.refresh_status(unix_now()) {
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

        let response = self.session.refresh_grant(refresh_token).await?;
        let refreshed = TokenRecord::from_response(
            &self.config.server_url,
            &self.config.realm_name,
            &response,
            unix_now(),
        )?;
        self.persist_locked(lock, &refreshed)?;
        tracing::info!(realm = %self.config.realm_name, "token record refreshed");
        Ok(refreshed)
    }

    async fn password_credentials_locked(
        &self,
        lock: &CacheLock,
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
        self.persist_locked(lock, &record)?;
        tracing::info!(realm = %self.config.realm_name, "authenticated with password credentials");
        Ok(record)
    }

    /// Load the persisted record. The `_lock` parameter proves the caller
    /// holds the cache lock.
    fn read_record_locked(&self, _lock: &CacheLock) -> Result<TokenRecord> {
        self.cache
            .load()?
            .ok_or_else(|| TokenError::CacheMissing(self.cache.path().to_path_buf()))
    }

    fn persist_locked(&self, _lock: &CacheLock, record: &TokenRecord) -> Result<()> {
        self.cache.persist(record)
    }
}
