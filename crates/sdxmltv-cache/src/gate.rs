//! `CacheGate` - decides between serving the cached guide and rebuilding it.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::sync::Mutex;

use super::atomic::write_atomic;
use super::error::CacheIoError;

/// Content type of a served guide document.
pub const CONTENT_TYPE: &str = "application/xml; charset=UTF-8";

/// Where a served document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentOrigin {
    /// Read from a cache file younger than the freshness window.
    Cache,
    /// Built by a refresh during this call.
    Rebuilt,
}

/// A guide document ready to hand to the HTTP layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServedDocument {
    /// Rendered document bytes.
    pub body: Vec<u8>,
    /// Whether the bytes came from the cache or a fresh build.
    pub origin: DocumentOrigin,
    /// Freshness window, used for `Cache-Control`.
    pub max_age: Duration,
}

impl ServedDocument {
    /// `Content-Type` header value.
    #[must_use]
    pub const fn content_type(&self) -> &'static str {
        CONTENT_TYPE
    }

    /// `Cache-Control` header value (`max-age` equals the freshness window).
    #[must_use]
    pub fn cache_control(&self) -> String {
        format!("public, max-age={}", self.max_age.as_secs())
    }
}

/// Staleness gate around the cached guide document.
///
/// Holds a single-slot in-flight guard so at most one refresh runs at a time.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct CacheGate {
    /// Cache file path.
    path: PathBuf,
    /// Freshness window.
    max_age: Duration,
    /// Held for the duration of a refresh.
    in_flight: Mutex<()>,
}

impl CacheGate {
    /// Creates a gate for `path` with the given freshness window.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, max_age: Duration) -> Self {
        Self {
            path: path.into(),
            max_age,
            in_flight: Mutex::new(()),
        }
    }

    /// Creates a gate whose freshness window is given in hours.
    #[must_use]
    pub fn with_hours(path: impl Into<PathBuf>, hours: u64) -> Self {
        Self::new(path, Duration::from_secs(hours.saturating_mul(3600)))
    }

    /// Cache file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Freshness window.
    #[must_use]
    pub const fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Age of the cache file at `now`.
    ///
    /// Returns `None` when the file is missing or its metadata is unreadable.
    /// A modification time in the future counts as age zero.
    #[must_use]
    pub fn age_at(&self, now: SystemTime) -> Option<Duration> {
        let modified = std::fs::metadata(&self.path)
            .and_then(|m| m.modified())
            .ok()?;
        Some(now.duration_since(modified).unwrap_or(Duration::ZERO))
    }

    /// Age of the cache file right now.
    #[must_use]
    pub fn age(&self) -> Option<Duration> {
        self.age_at(SystemTime::now())
    }

    /// Whether the cache file exists and is younger than the window at `now`.
    #[must_use]
    pub fn is_fresh_at(&self, now: SystemTime) -> bool {
        self.age_at(now).is_some_and(|age| age < self.max_age)
    }

    /// Whether the cache file exists and is younger than the window.
    ///
    /// A missing or unreadable file is never fresh.
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(SystemTime::now())
    }

    /// Reads the cached document.
    ///
    /// # Errors
    ///
    /// Returns [`CacheIoError::Read`] if the file cannot be read.
    pub fn read(&self) -> Result<Vec<u8>, CacheIoError> {
        std::fs::read(&self.path).map_err(|source| CacheIoError::Read {
            path: self.path.clone(),
            source,
        })
    }

    /// Atomically replaces the cached document.
    ///
    /// # Errors
    ///
    /// Returns [`CacheIoError::Write`] if the write fails.
    pub fn persist(&self, body: &[u8]) -> Result<(), CacheIoError> {
        write_atomic(&self.path, body)
    }

    /// Returns the cached bytes when fresh and readable.
    fn read_fresh(&self) -> Option<Vec<u8>> {
        if !self.is_fresh() {
            return None;
        }
        match self.read() {
            Ok(body) => Some(body),
            Err(e) => {
                tracing::warn!(error = %e, "Cache unreadable, treating as stale");
                None
            }
        }
    }

    /// Runs `build` and persists its output. Caller must hold `in_flight`.
    async fn run_build<F, Fut, E>(&self, build: F) -> Result<Vec<u8>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<u8>, E>>,
    {
        let body = build().await?;
        if let Err(e) = self.persist(&body) {
            tracing::warn!(error = %e, "Failed to persist guide document, serving without caching");
        } else {
            tracing::info!(
                path = %self.path.display(),
                bytes = body.len(),
                "Guide document cached"
            );
        }
        Ok(body)
    }

    /// Serves the cached document when fresh, otherwise rebuilds it.
    ///
    /// A caller that finds a refresh already in flight waits for it and
    /// then re-checks freshness instead of starting a second build.
    ///
    /// # Errors
    ///
    /// Returns the error from `build`; the previous cache file stays intact.
    pub async fn get_or_refresh<F, Fut, E>(&self, build: F) -> Result<ServedDocument, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<u8>, E>>,
    {
        if let Some(body) = self.read_fresh() {
            tracing::debug!(path = %self.path.display(), "Serving cached guide document");
            return Ok(self.served(body, DocumentOrigin::Cache));
        }

        let _guard = self.in_flight.lock().await;
        if let Some(body) = self.read_fresh() {
            tracing::debug!("Guide document refreshed by a concurrent caller");
            return Ok(self.served(body, DocumentOrigin::Cache));
        }

        let body = self.run_build(build).await?;
        Ok(self.served(body, DocumentOrigin::Rebuilt))
    }

    /// Rebuilds the document unconditionally, waiting for any in-flight refresh.
    ///
    /// # Errors
    ///
    /// Returns the error from `build`; the previous cache file stays intact.
    pub async fn refresh<F, Fut, E>(&self, build: F) -> Result<Vec<u8>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<u8>, E>>,
    {
        let _guard = self.in_flight.lock().await;
        self.run_build(build).await
    }

    /// Rebuilds the document unless a refresh is already running.
    ///
    /// Returns `Ok(None)` when suppressed.
    ///
    /// # Errors
    ///
    /// Returns the error from `build`; the previous cache file stays intact.
    pub async fn try_refresh<F, Fut, E>(&self, build: F) -> Result<Option<Vec<u8>>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<u8>, E>>,
    {
        let Ok(_guard) = self.in_flight.try_lock() else {
            tracing::info!("Refresh already in flight, skipping");
            return Ok(None);
        };
        self.run_build(build).await.map(Some)
    }

    fn served(&self, body: Vec<u8>, origin: DocumentOrigin) -> ServedDocument {
        ServedDocument {
            body,
            origin,
            max_age: self.max_age,
        }
    }
}
