//! Diagnostic JSON snapshots of intermediate pipeline data.

use std::path::{Path, PathBuf};

use serde::Serialize;

use super::atomic::write_atomic;
use super::error::CacheIoError;

/// Writes pretty-printed JSON snapshots (`sd_lineups.json`, ...) into a directory.
///
/// Snapshots are for debugging only; a disabled writer ignores every call.
#[derive(Debug, Clone, Default)]
pub struct SnapshotWriter {
    /// Target directory (`None` = disabled).
    dir: Option<PathBuf>,
}

impl SnapshotWriter {
    /// Creates a writer storing snapshots in `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    /// Creates a writer that discards every snapshot.
    #[must_use]
    pub const fn disabled() -> Self {
        Self { dir: None }
    }

    /// Snapshot directory, if enabled.
    #[must_use]
    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Writes `value` as `{dir}/{name}`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheIoError`] if serialization or the write fails.
    pub fn write<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<(), CacheIoError> {
        let Some(dir) = self.dir.as_ref() else {
            return Ok(());
        };
        let path = dir.join(name);
        let json = serde_json::to_vec_pretty(value).map_err(|source| CacheIoError::Json {
            path: path.clone(),
            source,
        })?;
        write_atomic(&path, &json)
    }
}
