//! Cache I/O error type.

use std::path::PathBuf;

/// Filesystem failure while reading or writing a cache, token or snapshot file.
///
/// Never fatal for a refresh: callers log it and fall back to treating the
/// cache as stale or to skipping persistence.
#[derive(Debug, thiserror::Error)]
#[allow(clippy::module_name_repetitions)]
pub enum CacheIoError {
    /// Reading a file failed.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// File that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Writing or renaming a file failed.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        /// File (or directory) that could not be written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// A JSON file could not be encoded or decoded.
    #[error("invalid JSON in {}: {source}", path.display())]
    Json {
        /// File whose contents were being (de)serialized.
        path: PathBuf,
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },
}
