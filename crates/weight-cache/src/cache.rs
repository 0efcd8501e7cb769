//! Content-addressed on-disk cache.
//!
//! Entries live at `<cache dir>/<namespace>/<key[0..2]>/<key>.bin`. Each is
//! written once under a temporary name and published with a no-clobber
//! rename, so readers only ever see complete entries and concurrent builders
//! of the same key cannot overwrite each other.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::NamedTempFile;
use tracing::{debug, instrument, warn};

use regrid_common::{CacheKey, RegridError, RegridResult};

use crate::entry;
use crate::loader::{Handle, LoaderKind};
use crate::shared_memory;
use crate::stats::CacheStats;

/// Namespace for interpolation weight matrices.
pub const WEIGHTS_NAMESPACE: &str = "weights";

/// Result of a [`Cache::put`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// The entry was committed.
    Stored,
    /// Another writer committed the key first; this write was discarded.
    LostRace,
    /// The loader is disabled; nothing was written.
    Skipped,
}

/// One namespace of the cache, read through one loader.
#[derive(Debug, Clone)]
pub struct Cache {
    root: PathBuf,
    namespace: String,
    loader: LoaderKind,
    shm_dir: PathBuf,
    stats: Arc<CacheStats>,
}

impl Cache {
    pub fn new(
        cache_dir: impl AsRef<Path>,
        namespace: &str,
        loader: LoaderKind,
        shm_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            root: cache_dir.as_ref().join(namespace),
            namespace: namespace.to_string(),
            loader,
            shm_dir: shm_dir.into(),
            stats: Arc::new(CacheStats::default()),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn loader(&self) -> LoaderKind {
        self.loader
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// File holding the entry for `key`.
    pub fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.root
            .join(key.shard())
            .join(format!("{}.bin", key.as_str()))
    }

    /// Shared-memory segment for `key`.
    pub fn segment_path(&self, key: &CacheKey) -> PathBuf {
        shared_memory::segment_path(&self.shm_dir, &self.namespace, key)
    }

    /// Look up an entry.
    ///
    /// A corrupt entry is removed and reported as `CacheCorruption`; the
    /// caller is expected to rebuild and `put` it again.
    #[instrument(skip(self), fields(namespace = %self.namespace, loader = %self.loader))]
    pub fn get(&self, key: &CacheKey) -> RegridResult<Option<Handle>> {
        let found = match self.loader {
            LoaderKind::Disabled => None,
            LoaderKind::Buffer => {
                let path = self.entry_path(key);
                open_entry(&path, Handle::read)?.map(|h| (h, path))
            }
            LoaderKind::MemoryMapped => {
                let path = self.entry_path(key);
                open_entry(&path, Handle::map)?.map(|h| (h, path))
            }
            LoaderKind::SharedMemory => {
                let segment = self.segment_path(key);
                match shared_memory::attach(&segment)? {
                    Some(handle) => Some((handle, segment)),
                    None => {
                        warn!(
                            segment = %segment.display(),
                            "Shared-memory segment not loaded, falling back to buffer loader"
                        );
                        let path = self.entry_path(key);
                        open_entry(&path, Handle::read)?.map(|h| (h, path))
                    }
                }
            }
        };

        let Some((handle, path)) = found else {
            self.stats.record_miss();
            debug!("Cache miss");
            return Ok(None);
        };

        if let Err(e) = handle.payload() {
            self.stats.record_corrupt();
            warn!(path = %path.display(), error = %e, "Removing corrupt cache entry");
            drop(handle);
            if let Err(remove_err) = std::fs::remove_file(&path) {
                warn!(path = %path.display(), error = %remove_err, "Failed to remove corrupt entry");
            }
            return Err(RegridError::corruption(key.as_str(), e.to_string()));
        }

        self.stats.record_hit(handle.len());
        debug!(bytes = handle.len(), "Cache hit");
        Ok(Some(handle))
    }

    /// Commit a payload under `key`.
    ///
    /// If the key is already present the new bytes are discarded: equal keys
    /// always describe equal bytes.
    #[instrument(skip(self, payload), fields(namespace = %self.namespace, bytes = payload.len()))]
    pub fn put(&self, key: &CacheKey, payload: &[u8]) -> RegridResult<PutOutcome> {
        if self.loader == LoaderKind::Disabled {
            return Ok(PutOutcome::Skipped);
        }

        let path = self.entry_path(key);
        let dir = path
            .parent()
            .ok_or_else(|| RegridError::cache(format!("no parent for {}", path.display())))?;
        std::fs::create_dir_all(dir)?;

        let framed = entry::encode(payload);
        let mut staged = NamedTempFile::new_in(dir)?;
        staged.write_all(&framed)?;
        staged.as_file().sync_all()?;

        match staged.persist_noclobber(&path) {
            Ok(_) => {
                self.stats.record_store(framed.len());
                debug!(path = %path.display(), "Stored cache entry");
                Ok(PutOutcome::Stored)
            }
            Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
                self.stats.record_lost_race();
                debug!(path = %path.display(), "Entry already committed, discarding write");
                Ok(PutOutcome::LostRace)
            }
            Err(e) => Err(e.error.into()),
        }
    }

    /// Delete the on-disk entry for `key`. Returns whether one existed.
    pub fn remove(&self, key: &CacheKey) -> RegridResult<bool> {
        Ok(shared_memory::remove(&self.entry_path(key))?)
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entry_path(key).is_file()
    }

    /// Copy the on-disk entry for `key` into its shared-memory segment.
    ///
    /// Returns `false` when there is no entry on disk to load.
    #[instrument(skip(self), fields(namespace = %self.namespace))]
    pub fn load_shared_memory(&self, key: &CacheKey) -> RegridResult<bool> {
        let path = self.entry_path(key);
        let Some(handle) = open_entry(&path, Handle::read)? else {
            return Ok(false);
        };
        handle
            .payload()
            .map_err(|e| RegridError::corruption(key.as_str(), e.to_string()))?;

        let segment = self.segment_path(key);
        shared_memory::publish(&segment, handle.raw())?;
        debug!(segment = %segment.display(), bytes = handle.len(), "Loaded shared-memory segment");
        Ok(true)
    }

    /// Remove the shared-memory segment for `key`. Returns whether one existed.
    #[instrument(skip(self), fields(namespace = %self.namespace))]
    pub fn unload_shared_memory(&self, key: &CacheKey) -> RegridResult<bool> {
        let removed = shared_memory::remove(&self.segment_path(key))?;
        debug!(removed, "Unloaded shared-memory segment");
        Ok(removed)
    }
}

/// Open an entry file, mapping "not found" to `None`.
fn open_entry(
    path: &Path,
    open: fn(&Path) -> std::io::Result<Handle>,
) -> RegridResult<Option<Handle>> {
    match open(path) {
        Ok(handle) => Ok(Some(handle)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
