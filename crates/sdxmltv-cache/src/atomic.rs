//! Write-to-temp-then-rename file persistence.

use std::io::Write;
use std::path::Path;

use super::error::CacheIoError;

/// Atomically replaces `path` with `contents`.
///
/// The bytes are written to a temporary file in the same directory, synced,
/// and renamed over the target. Parent directories are created if needed.
/// On failure the previous file (if any) is left untouched.
///
/// # Errors
///
/// Returns [`CacheIoError::Write`] if the directory, temp file, write, sync
/// or rename fails.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), CacheIoError> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let write_err = |source| CacheIoError::Write {
        path: path.to_path_buf(),
        source,
    };

    std::fs::create_dir_all(dir).map_err(|source| CacheIoError::Write {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(contents).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;

    tracing::debug!(path = %path.display(), bytes = contents.len(), "File written");
    Ok(())
}
