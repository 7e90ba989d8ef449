//! File-backed token cache with cross-process locking.
//!
//! The cache holds exactly one [`TokenRecord`] as JSON. A sibling lock
//! file (same path, `.lock` extension) carries the advisory lock that
//! cooperating processes take around every read-modify-write cycle, so
//! the record file itself can be truncated and rewritten freely while
//! the lock is held.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::{Result, TokenError};
use crate::record::{TokenRecord, TokenStatus};

/// Default directory for cache files, relative to the working directory.
pub const DEFAULT_CACHE_DIR: &str = "./.keyshed";

/// Extension of token cache files.
pub const CACHE_FILE_EXTENSION: &str = "tok";

/// Extension of the sibling lock file.
pub const LOCK_FILE_EXTENSION: &str = "lock";

/// Default cache path for a realm: `./.keyshed/{realm_name}.tok`.
pub fn default_cache_path(realm_name: &str) -> PathBuf {
    PathBuf::from(DEFAULT_CACHE_DIR).join(format!("{realm_name}.{CACHE_FILE_EXTENSION}"))
}

// ============================================================================
// LoadState
// ============================================================================

/// Result of loading the persisted record, classified at a given instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    /// A record whose access token is usable: valid or of unknown expiry.
    Loaded(TokenRecord),
    /// A record whose access token has provably expired.
    Stale(TokenRecord),
    /// No record has been persisted yet.
    Absent,
}

// ============================================================================
// CacheLock
// ============================================================================

/// Held exclusive lock on a token cache.
///
/// The lock is advisory and cross-process. It is released when the guard
/// drops; a release failure is logged rather than surfaced, since the OS
/// drops the lock with the file descriptor anyway.
#[derive(Debug)]
pub struct CacheLock {
    file: std::fs::File,
    path: PathBuf,
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        if let Err(e) = fs2::FileExt::unlock(&self.file) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to release cache lock");
        }
    }
}

// ============================================================================
// TokenCache
// ============================================================================

/// One token cache file and its sibling lock file.
///
/// All read and write operations assume the caller holds the [`CacheLock`];
/// the higher-level clients enforce that by taking the lock once per
/// public operation.
#[derive(Debug)]
pub struct TokenCache {
    path: PathBuf,
    lock_path: PathBuf,
}

impl TokenCache {
    /// Create a cache handle at `path`, creating parent directories.
    ///
    /// The lock file sits next to the cache file with its extension
    /// replaced by `.lock`.
    pub fn new(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| TokenError::CacheIo {
                    path: path.clone(),
                    source: e,
                })?;
            }
        }
        let lock_path = path.with_extension(LOCK_FILE_EXTENSION);
        Ok(Self { path, lock_path })
    }

    /// Path of the cache file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the lock file.
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// Whether a record has been persisted.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Acquire the exclusive cross-process lock, blocking until granted.
    ///
    /// Acquisition runs on the blocking thread pool so a contended lock
    /// never stalls the async runtime.
    pub async fn lock(&self) -> Result<CacheLock> {
        let path = self.lock_path.clone();
        tokio::task::spawn_blocking(move || {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(&path)
                .map_err(|e| TokenError::Lock {
                    path: path.clone(),
                    source: e,
                })?;
            file.lock_exclusive().map_err(|e| TokenError::Lock {
                path: path.clone(),
                source: e,
            })?;
            Ok(CacheLock { file, path })
        })
        .await
        .map_err(|e| TokenError::Lock {
            path: self.lock_path.clone(),
            source: std::io::Error::other(e),
        })?
    }

    /// Load the persisted record, if any.
    pub fn load(&self) -> Result<Option<TokenRecord>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(&self.path).map_err(|e| TokenError::CacheIo {
            path: self.path.clone(),
            source: e,
        })?;
        let record = serde_json::from_str(&raw).map_err(|e| TokenError::CacheFormat {
            path: self.path.clone(),
            source: e,
        })?;
        Ok(Some(record))
    }

    /// Load the persisted record and classify its access token at `now`.
    pub fn load_state(&self, now: i64) -> Result<LoadState> {
        match self.load()? {
            None => Ok(LoadState::Absent),
            Some(record) => match record.access_status(now) {
                TokenStatus::Expired => Ok(LoadState::Stale(record)),
                TokenStatus::Valid | TokenStatus::Unknown => Ok(LoadState::Loaded(record)),
            },
        }
    }

    /// Write `record` to the cache file, replacing any previous content.
    ///
    /// On Unix the file is created with owner-only permissions.
    pub fn persist(&self, record: &TokenRecord) -> Result<()> {
        let json = serde_json::to_string(record).map_err(|e| TokenError::CacheFormat {
            path: self.path.clone(),
            source: e,
        })?;

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let io_err = |e| TokenError::CacheIo {
            path: self.path.clone(),
            source: e,
        };
        let mut file = options.open(&self.path).map_err(io_err)?;
        file.write_all(json.as_bytes()).map_err(io_err)?;

        tracing::debug!(path = %self.path.display(), "token record persisted");
        Ok(())
    }

    /// Remove the cache file. Removing an absent file is not an error.
    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path).map_err(|e| TokenError::CacheIo {
                path: self.path.clone(),
                source: e,
            })?;
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
