//! Auth token value type and its on-disk store.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeDelta, Utc};
use sdxmltv_cache::{CacheIoError, write_atomic};
use serde::{Deserialize, Serialize};

/// Validity window of a freshly exchanged token.
pub const TOKEN_VALIDITY_HOURS: i64 = 24;

/// Provider session token with its absolute expiry.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken {
    /// Opaque token string.
    value: String,
    /// Expiry instant.
    expires_at: DateTime<Utc>,
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthToken")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl AuthToken {
    /// Creates a token expiring at `expires_at`.
    #[must_use]
    pub fn new(value: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            expires_at,
        }
    }

    /// Creates a token issued at `now`, valid for [`TOKEN_VALIDITY_HOURS`].
    #[must_use]
    #[allow(clippy::arithmetic_side_effects)]
    pub fn issued_at(value: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self::new(value, now + TimeDelta::hours(TOKEN_VALIDITY_HOURS))
    }

    /// Token string for the `token` header.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Expiry instant.
    #[must_use]
    pub const fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Whether the token is still usable at `now`.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// On-disk token format: `{"token": "...", "expires": <epoch millis>}`.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedToken {
    token: String,
    expires: i64,
}

/// Persists the auth token so a restart can reuse it.
///
/// A store without a path keeps the token in memory only.
#[derive(Debug, Clone, Default)]
#[allow(clippy::module_name_repetitions)]
pub struct TokenStore {
    /// Token file (`None` = not persisted).
    path: Option<PathBuf>,
}

impl TokenStore {
    /// Store backed by `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// Store that never touches disk.
    #[must_use]
    pub const fn in_memory() -> Self {
        Self { path: None }
    }

    /// Token file path, if persisted.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Loads the persisted token. A missing file is `Ok(None)`.
    ///
    /// Expiry is not checked here.
    ///
    /// # Errors
    ///
    /// Returns [`CacheIoError`] if the file exists but cannot be read or decoded.
    pub fn load(&self) -> Result<Option<AuthToken>, CacheIoError> {
        let Some(path) = self.path.as_ref() else {
            return Ok(None);
        };
        let raw = match std::fs::read(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(CacheIoError::Read {
                    path: path.clone(),
                    source,
                });
            }
        };
        let persisted: PersistedToken =
            serde_json::from_slice(&raw).map_err(|source| CacheIoError::Json {
                path: path.clone(),
                source,
            })?;
        Ok(DateTime::from_timestamp_millis(persisted.expires)
            .map(|expires_at| AuthToken::new(persisted.token, expires_at)))
    }

    /// Persists `token` atomically.
    ///
    /// Tokens already expired at `now` are not written.
    ///
    /// # Errors
    ///
    /// Returns [`CacheIoError`] if encoding or the write fails.
    pub fn save(&self, token: &AuthToken, now: DateTime<Utc>) -> Result<(), CacheIoError> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };
        if !token.is_valid_at(now) {
            tracing::warn!(expires_at = %token.expires_at, "Refusing to persist expired token");
            return Ok(());
        }
        let persisted = PersistedToken {
            token: token.value.clone(),
            expires: token.expires_at.timestamp_millis(),
        };
        let json = serde_json::to_vec(&persisted).map_err(|source| CacheIoError::Json {
            path: path.clone(),
            source,
        })?;
        write_atomic(path, &json)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_token_validity_window() {
        // Arrange
        let now = Utc::now();
        let token = AuthToken::issued_at("abc", now);

        // Act & Assert
        assert!(token.is_valid_at(now));
        assert!(token.is_valid_at(now + TimeDelta::hours(23)));
        assert!(!token.is_valid_at(now + TimeDelta::hours(24)));
    }

    #[test]
    fn test_debug_redacts_value() {
        // Arrange
        let token = AuthToken::issued_at("secret-token", Utc::now());

        // Act
        let debug = format!("{token:?}");

        // Assert
        assert!(!debug.contains("secret-token"));
    }

    #[test]
    fn test_save_and_load() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("sd_token.json"));
        let now = Utc::now();
        let token = AuthToken::issued_at("abc", now);

        // Act
        store.save(&token, now).unwrap();
        let loaded = store.load().unwrap().unwrap();

        // Assert
        assert_eq!(loaded.value(), "abc");
        assert_eq!(
            loaded.expires_at().timestamp_millis(),
            token.expires_at().timestamp_millis()
        );
    }

    #[test]
    fn test_load_missing_file_is_none() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("sd_token.json"));

        // Act & Assert
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_load_epoch_millis_expiry() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sd_token.json");
        std::fs::write(&path, r#"{"token":"f3fca79989cafe7dead71beefedc812b","expires":4102444800000}"#)
            .unwrap();
        let store = TokenStore::new(&path);

        // Act
        let token = store.load().unwrap().unwrap();

        // Assert
        assert_eq!(token.value(), "f3fca79989cafe7dead71beefedc812b");
        assert_eq!(token.expires_at().to_rfc3339(), "2100-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_load_corrupt_file_is_error() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sd_token.json");
        std::fs::write(&path, "not json").unwrap();
        let store = TokenStore::new(&path);

        // Act
        let result = store.load();

        // Assert
        assert!(matches!(result, Err(CacheIoError::Json { .. })));
    }

    #[test]
    fn test_expired_token_is_not_persisted() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sd_token.json");
        let store = TokenStore::new(&path);
        let now = Utc::now();
        let token = AuthToken::new("old", now - TimeDelta::hours(1));

        // Act
        store.save(&token, now).unwrap();

        // Assert
        assert!(!path.exists());
    }
}
