//! Named shared-memory segments.
//!
//! A segment is a file in a memory-backed directory (`/dev/shm` by default)
//! named from the namespace and key, so every process on the host finds the
//! same segment without coordination. Segments are written by staging a
//! temporary file and renaming it into place, then mapped read-only by
//! readers; the mapping is released when the [`Handle`] is dropped.

use std::io::Write;
use std::path::{Path, PathBuf};

use regrid_common::CacheKey;
use tempfile::NamedTempFile;

use crate::loader::Handle;

/// Prefix of every segment name.
pub const SEGMENT_PREFIX: &str = "regrid";

/// Path of the segment for `key` in `namespace`.
pub fn segment_path(shm_dir: &Path, namespace: &str, key: &CacheKey) -> PathBuf {
    shm_dir.join(format!("{}-{}-{}", SEGMENT_PREFIX, namespace, key))
}

/// Attach to a segment, or `None` if it has not been populated.
pub fn attach(path: &Path) -> std::io::Result<Option<Handle>> {
    match Handle::map(path) {
        Ok(handle) => Ok(Some(handle)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Populate a segment with framed entry bytes, replacing any existing one.
pub fn publish(path: &Path, framed: &[u8]) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let mut staged = NamedTempFile::new_in(dir)?;
    staged.write_all(framed)?;
    staged.as_file().sync_all()?;
    staged.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Remove a segment. Returns whether one existed.
pub fn remove(path: &Path) -> std::io::Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
